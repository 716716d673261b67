//! The `greeter` plugin
//!
//! Contributes `greet`. Depends on `core` and reads its greeting and default
//! name from its settings:
//!
//! ```toml
//! [plugins.greeter]
//! greeting = "Howdy"
//! default-name = "partner"
//! ```

use crate::builtin;
use crate::command::api::{Command, CommandContext, CommandFailure, CommandSchema};
use crate::plugin::context::PluginContext;
use crate::plugin::error::PluginResult;
use crate::plugin::traits::Plugin;
use crate::plugin::types::{PluginDependency, PluginInfo};
use semver::Version;
use serde_json::{json, Value};
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "greeter";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Greeting {
    salutation: String,
    default_name: String,
}

impl Default for Greeting {
    fn default() -> Self {
        Self {
            salutation: "Hello".to_string(),
            default_name: "world".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct GreeterPlugin {
    greeting: Arc<Greeting>,
}

#[async_trait::async_trait]
impl Plugin for GreeterPlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::new(PLUGIN_NAME, Version::new(0, 1, 0))
            .with_description("Greets people")
            .with_author("plughost")
            .depends_on(PluginDependency::at_least(super::essentials::PLUGIN_NAME, 0, 1))
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![Arc::new(Greet {
            greeting: Arc::clone(&self.greeting),
        })]
    }

    async fn initialize(&mut self, context: &PluginContext) -> PluginResult<()> {
        let settings = context.settings();
        self.greeting = Arc::new(Greeting {
            salutation: settings.get_string("greeting", "Hello"),
            default_name: settings.get_string("default-name", "world"),
        });
        log::debug!("greeter: using '{}'", self.greeting.salutation);
        Ok(())
    }

    async fn cleanup(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

fn create_plugin() -> Box<dyn Plugin> {
    Box::new(GreeterPlugin::default())
}

builtin!(create_plugin);

struct Greet {
    greeting: Arc<Greeting>,
}

#[async_trait::async_trait]
impl Command for Greet {
    fn name(&self) -> &str {
        "greet"
    }

    fn description(&self) -> &str {
        "Greet someone"
    }

    fn schema(&self) -> CommandSchema {
        CommandSchema::new()
            .option("name", None, "Who to greet")
            .flag("shout", "Upper-case the greeting")
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure> {
        let name = context
            .option("name")
            .unwrap_or(&self.greeting.default_name)
            .to_string();
        let mut message = format!("{}, {}!", self.greeting.salutation, name);
        if context.has_flag("shout") {
            message = message.to_uppercase();
        }

        if let Err(error) = context.emit("greeter.greeted", json!({ "name": name })) {
            log::warn!("greeter: {}", error);
        }
        Ok(json!(message))
    }
}
