//! API for builtin plugin registration and discovery
//!
//! Builtin plugins register themselves at link time with the `builtin!`
//! macro; [`builtin_factories`] hands them to the manager.

use crate::plugin::traits::{Plugin, PluginFactory};
use std::sync::Arc;

/// Entry for a builtin plugin in the dynamic registry
pub struct BuiltinPluginEntry {
    pub factory: fn() -> Box<dyn Plugin>,
}

// Collect all builtin plugin entries
inventory::collect!(BuiltinPluginEntry);

/// Macro for registering builtin plugins
#[macro_export]
macro_rules! builtin {
    ($factory_expr:expr) => {
        inventory::submit!($crate::plugin::builtin::api::BuiltinPluginEntry {
            factory: $factory_expr
        });
    };
}

/// Factories of all registered builtin plugins, sorted by plugin name
pub fn builtin_factories() -> Vec<PluginFactory> {
    let mut entries: Vec<(String, fn() -> Box<dyn Plugin>)> = inventory::iter::<BuiltinPluginEntry>()
        .map(|entry| ((entry.factory)().plugin_info().name, entry.factory))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .into_iter()
        .map(|(_, factory)| Arc::new(factory) as PluginFactory)
        .collect()
}
