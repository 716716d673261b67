//! Merged command map of all active plugins
//!
//! Registration is all-or-nothing per plugin: if any of a plugin's commands or
//! aliases collides with an existing entry, none of them are registered and
//! the existing owner keeps its command.
//!
//! User aliases come from configuration rather than from commands. They map
//! a new name onto an existing command and never shadow a command name or a
//! declared alias.

use crate::command::error::{PipelineError, PipelineResult};
use crate::command::schema::CommandSchema;
use crate::command::traits::Command;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A registered command and the plugin it belongs to
#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    /// Owning plugin (back-reference by name)
    pub plugin: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub schema: CommandSchema,
    pub handler: Arc<dyn Command>,
}

impl CommandDescriptor {
    pub fn from_command(plugin: &str, handler: Arc<dyn Command>) -> Self {
        Self {
            name: handler.name().to_string(),
            plugin: plugin.to_string(),
            description: handler.description().to_string(),
            aliases: handler.aliases(),
            schema: handler.schema(),
            handler,
        }
    }

    /// `plugin:command`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.plugin, self.name)
    }

    pub fn usage(&self) -> String {
        self.schema.usage(&self.name)
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct CommandTable {
    commands: BTreeMap<String, CommandDescriptor>,
    /// alias -> command name
    aliases: BTreeMap<String, String>,
    /// user alias -> command reference (name, alias or `plugin:command`)
    user_aliases: BTreeMap<String, String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every command of `plugin`, or none of them.
    pub fn register_all(
        &mut self,
        plugin: &str,
        handlers: Vec<Arc<dyn Command>>,
    ) -> PipelineResult<Vec<String>> {
        let descriptors: Vec<CommandDescriptor> = handlers
            .into_iter()
            .map(|handler| CommandDescriptor::from_command(plugin, handler))
            .collect();

        let mut claimed: BTreeMap<&str, &str> = BTreeMap::new();
        for descriptor in &descriptors {
            let names =
                std::iter::once(descriptor.name.as_str()).chain(descriptor.aliases.iter().map(String::as_str));
            for name in names {
                if let Some((existing, owner)) = self.owner_of(name) {
                    return Err(PipelineError::CommandConflict {
                        command: name.to_string(),
                        plugin: plugin.to_string(),
                        existing,
                        existing_owner: owner,
                    });
                }
                if let Some(previous) = claimed.insert(name, descriptor.name.as_str()) {
                    return Err(PipelineError::CommandConflict {
                        command: name.to_string(),
                        plugin: plugin.to_string(),
                        existing: previous.to_string(),
                        existing_owner: plugin.to_string(),
                    });
                }
            }
        }

        let mut registered = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let names =
                std::iter::once(&descriptor.name).chain(descriptor.aliases.iter());
            for name in names {
                if let Some(target) = self.user_aliases.remove(name) {
                    log::warn!(
                        "CommandTable: user alias '{}' -> '{}' dropped; '{}' now provides it",
                        name,
                        target,
                        plugin
                    );
                }
            }
            for alias in &descriptor.aliases {
                self.aliases.insert(alias.clone(), descriptor.name.clone());
            }
            log::debug!(
                "CommandTable: registered '{}' from '{}'",
                descriptor.name,
                descriptor.plugin
            );
            registered.push(descriptor.name.clone());
            self.commands.insert(descriptor.name.clone(), descriptor);
        }
        Ok(registered)
    }

    /// Remove every command owned by `plugin`, returning their names.
    pub fn remove_owner(&mut self, plugin: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .commands
            .values()
            .filter(|d| d.plugin == plugin)
            .map(|d| d.name.clone())
            .collect();
        for name in &removed {
            self.commands.remove(name);
        }
        self.aliases.retain(|_, target| !removed.contains(target));
        if !removed.is_empty() {
            log::debug!("CommandTable: removed {} command(s) of '{}'", removed.len(), plugin);
        }
        removed
    }

    /// Add a user alias for an existing command.
    ///
    /// `target` must resolve exactly (no prefix) to a registered command.
    /// Replaces an earlier user alias of the same name.
    pub fn add_user_alias(&mut self, alias: &str, target: &str) -> PipelineResult<()> {
        let invalid = |reason: String| PipelineError::InvalidAlias {
            alias: alias.to_string(),
            reason,
        };
        if alias.is_empty() || alias.starts_with('-') || alias.contains([':', ' ']) {
            return Err(invalid("not a valid command name".to_string()));
        }
        if let Some((existing, owner)) = self.owner_of(alias) {
            return Err(invalid(format!(
                "would shadow command '{existing}' of plugin '{owner}'"
            )));
        }
        let descriptor = self
            .resolve_declared(target, false)
            .map_err(|cause| invalid(cause.to_string()))?;

        log::debug!(
            "CommandTable: user alias '{}' -> '{}'",
            alias,
            descriptor.qualified_name()
        );
        self.user_aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// Remove a user alias; `false` if there was none
    pub fn remove_user_alias(&mut self, alias: &str) -> bool {
        self.user_aliases.remove(alias).is_some()
    }

    pub fn user_alias(&self, alias: &str) -> Option<&str> {
        self.user_aliases.get(alias).map(String::as_str)
    }

    pub fn user_aliases(&self) -> &BTreeMap<String, String> {
        &self.user_aliases
    }

    /// Look up a command.
    ///
    /// Tried in order: exact name, alias, `plugin:command`, user alias, then
    /// (when `prefix_matching` is on) a unique prefix of command names.
    pub fn resolve(&self, name: &str, prefix_matching: bool) -> PipelineResult<CommandDescriptor> {
        if let Ok(descriptor) = self.resolve_declared(name, false) {
            return Ok(descriptor);
        }
        if let Some(target) = self.user_aliases.get(name) {
            // Targets are never user aliases themselves
            return self.resolve_declared(target, false);
        }
        self.resolve_declared(name, prefix_matching)
    }

    fn resolve_declared(
        &self,
        name: &str,
        prefix_matching: bool,
    ) -> PipelineResult<CommandDescriptor> {
        if let Some(descriptor) = self.commands.get(name) {
            return Ok(descriptor.clone());
        }
        if let Some(target) = self.aliases.get(name) {
            if let Some(descriptor) = self.commands.get(target) {
                return Ok(descriptor.clone());
            }
        }
        if let Some((plugin, command)) = name.split_once(':') {
            return self
                .commands
                .get(command)
                .filter(|d| d.plugin == plugin)
                .cloned()
                .ok_or_else(|| PipelineError::UnknownCommand {
                    name: name.to_string(),
                });
        }

        if prefix_matching && !name.is_empty() {
            let candidates: Vec<&CommandDescriptor> = self
                .commands
                .range(name.to_string()..)
                .take_while(|(key, _)| key.starts_with(name))
                .map(|(_, d)| d)
                .collect();
            match candidates.as_slice() {
                [single] => return Ok((*single).clone()),
                [] => {}
                many => {
                    return Err(PipelineError::AmbiguousCommand {
                        name: name.to_string(),
                        candidates: many.iter().map(|d| d.name.clone()).collect(),
                    })
                }
            }
        }

        Err(PipelineError::UnknownCommand {
            name: name.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Command names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    pub fn commands_of(&self, plugin: &str) -> Vec<String> {
        self.commands
            .values()
            .filter(|d| d.plugin == plugin)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn owner_of(&self, name: &str) -> Option<(String, String)> {
        if let Some(descriptor) = self.commands.get(name) {
            return Some((descriptor.name.clone(), descriptor.plugin.clone()));
        }
        self.aliases.get(name).and_then(|target| {
            self.commands
                .get(target)
                .map(|d| (d.name.clone(), d.plugin.clone()))
        })
    }
}

/// Single-writer, multi-reader handle shared by the manager and the pipeline
#[derive(Debug, Clone, Default)]
pub struct SharedCommandTable {
    inner: Arc<RwLock<CommandTable>>,
}

impl SharedCommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, CommandTable> {
        self.inner.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, CommandTable> {
        self.inner.write().await
    }

    pub async fn resolve(&self, name: &str, prefix_matching: bool) -> PipelineResult<CommandDescriptor> {
        self.inner.read().await.resolve(name, prefix_matching)
    }

    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::context::CommandContext;
    use crate::command::error::CommandFailure;
    use crate::core::error_handling::{ContextualError, ErrorKind};
    use serde_json::Value;

    struct Named {
        name: &'static str,
        aliases: &'static [&'static str],
    }

    #[async_trait::async_trait]
    impl Command for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn aliases(&self) -> Vec<String> {
            self.aliases.iter().map(|a| a.to_string()).collect()
        }

        async fn run(&self, _context: CommandContext) -> Result<Value, CommandFailure> {
            Ok(Value::Null)
        }
    }

    fn cmd(name: &'static str) -> Arc<dyn Command> {
        Arc::new(Named { name, aliases: &[] })
    }

    fn cmd_with_aliases(name: &'static str, aliases: &'static [&'static str]) -> Arc<dyn Command> {
        Arc::new(Named { name, aliases })
    }

    fn table() -> CommandTable {
        let mut table = CommandTable::new();
        table
            .register_all("core", vec![cmd("start"), cmd("status"), cmd_with_aliases("echo", &["say"])])
            .unwrap();
        table.register_all("greeter", vec![cmd("greet")]).unwrap();
        table
    }

    #[test]
    fn test_resolution_order() {
        let table = table();
        assert_eq!(table.resolve("status", true).unwrap().name, "status");
        assert_eq!(table.resolve("say", true).unwrap().name, "echo");
        assert_eq!(table.resolve("greeter:greet", true).unwrap().plugin, "greeter");
        assert_eq!(table.resolve("gr", true).unwrap().name, "greet");
    }

    #[test]
    fn test_qualified_name_must_match_owner() {
        let err = table().resolve("core:greet", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
    }

    #[test]
    fn test_ambiguous_prefix() {
        match table().resolve("st", true) {
            Err(PipelineError::AmbiguousCommand { candidates, .. }) => {
                assert_eq!(candidates, vec!["start", "status"]);
            }
            other => panic!("expected AmbiguousCommand, got {other:?}"),
        }
    }

    #[test]
    fn test_prefix_matching_can_be_disabled() {
        let err = table().resolve("gr", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
    }

    #[test]
    fn test_conflict_registers_nothing() {
        let mut table = table();
        let err = table
            .register_all("other", vec![cmd("fresh"), cmd("greet")])
            .unwrap_err();

        match err {
            PipelineError::CommandConflict { command, existing_owner, .. } => {
                assert_eq!(command, "greet");
                assert_eq!(existing_owner, "greeter");
            }
            other => panic!("expected CommandConflict, got {other:?}"),
        }
        assert!(!table.contains("fresh"));
        assert_eq!(table.get("greet").unwrap().plugin, "greeter");
    }

    #[test]
    fn test_alias_conflicts_with_command_name() {
        let mut table = table();
        let err = table
            .register_all("other", vec![cmd_with_aliases("hello", &["greet"])])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandConflict);
    }

    #[test]
    fn test_duplicate_within_one_plugin() {
        let mut table = CommandTable::new();
        let err = table
            .register_all("p", vec![cmd("same"), cmd("same")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandConflict);
        assert!(table.is_empty());
    }

    #[test]
    fn test_user_alias_resolves_to_target() {
        let mut table = table();
        table.add_user_alias("hi", "greet").unwrap();
        table.add_user_alias("shout", "core:echo").unwrap();

        assert_eq!(table.resolve("hi", false).unwrap().name, "greet");
        assert_eq!(table.resolve("shout", true).unwrap().name, "echo");
        assert_eq!(table.user_alias("hi"), Some("greet"));
        // Exact user alias beats the prefix match on "status"/"start"
        table.add_user_alias("s", "status").unwrap();
        assert_eq!(table.resolve("s", true).unwrap().name, "status");
    }

    #[test]
    fn test_user_alias_cannot_shadow_commands() {
        let mut table = table();
        for (alias, target) in [("greet", "echo"), ("say", "greet"), ("a:b", "greet"), ("", "greet")] {
            let err = table.add_user_alias(alias, target).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{alias}");
            assert!(err.is_user_actionable());
        }
        assert_eq!(table.resolve("greet", false).unwrap().plugin, "greeter");
        assert!(table.user_aliases().is_empty());
    }

    #[test]
    fn test_user_alias_target_must_exist() {
        let mut table = table();
        let err = table.add_user_alias("hi", "gre").unwrap_err();
        assert!(err.to_string().contains("Unknown command: 'gre'"), "{err}");
    }

    #[test]
    fn test_user_alias_removal_and_takeover() {
        let mut table = table();
        table.add_user_alias("hi", "greet").unwrap();
        table.add_user_alias("wave", "greet").unwrap();

        assert!(table.remove_user_alias("hi"));
        assert!(!table.remove_user_alias("hi"));
        assert!(table.resolve("hi", false).is_err());

        table.register_all("waver", vec![cmd("wave")]).unwrap();
        assert_eq!(table.user_alias("wave"), None);
        assert_eq!(table.resolve("wave", false).unwrap().plugin, "waver");
    }

    #[test]
    fn test_remove_owner_frees_names_and_aliases() {
        let mut table = table();
        let removed = table.remove_owner("core");
        assert_eq!(removed, vec!["echo", "start", "status"]);
        assert!(table.resolve("say", false).is_err());

        table
            .register_all("other", vec![cmd_with_aliases("shout", &["say"]), cmd("start")])
            .unwrap();
        assert_eq!(table.resolve("say", false).unwrap().plugin, "other");
    }
}
