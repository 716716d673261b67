//! Plugin Settings
//!
//! Opaque key-value configuration handed to a plugin at initialization. The
//! host fills it from the plugin's `[plugins.<name>]` table in the TOML
//! configuration; the plugin reads typed values and validates what it needs.

use crate::plugin::error::{PluginError, PluginResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginSettings {
    values: BTreeMap<String, toml::Value>,
}

impl PluginSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings from a TOML table
    pub fn from_toml(table: &toml::value::Table) -> Self {
        Self {
            values: table
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<toml::Value>) -> Option<toml::Value> {
        self.values.insert(key.to_string(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<toml::Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get a string configuration value with default
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(toml::Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    /// Get a boolean configuration value with default
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(toml::Value::Boolean(b)) => *b,
            _ => default,
        }
    }

    pub fn get_integer(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(toml::Value::Integer(i)) => *i,
            _ => default,
        }
    }

    /// Fail unless every key in `required` is present
    pub fn validate(&self, plugin_name: &str, required: &[&str]) -> PluginResult<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| !self.values.contains_key(*key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PluginError::Settings {
                plugin_name: plugin_name.to_string(),
                reason: format!("missing required setting(s): {}", missing.join(", ")),
            })
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
