//! Hot reload with rollback

use super::utils::{last_event, manager, plugin_events, register, MockBlueprint};
use crate::command::api::{CommandPipeline, Invocation, PipelineConfig};
use crate::core::error_handling::{ContextualError, ErrorKind};
use crate::plugin::error::PluginError;
use crate::plugin::manager::PluginManager;
use crate::plugin::types::PluginState;
use serde_json::{json, Value};
use std::sync::Arc;

async fn run(manager: &PluginManager, command: &str) -> Value {
    let pipeline = CommandPipeline::new(
        manager.commands().clone(),
        Arc::clone(manager.bus()),
        PipelineConfig::default(),
    );
    let result = pipeline.execute_invocation(Invocation::new(command)).await;
    assert!(result.success, "{command} failed: {:?}", result.error);
    result.value
}

async fn loaded(blueprint: &MockBlueprint) -> PluginManager {
    let manager = manager();
    register(&manager, &[blueprint]).await;
    manager.load_all().await.unwrap();
    manager
}

#[tokio::test]
async fn test_reload_swaps_in_a_fresh_instance() {
    let a = MockBlueprint::new("a").with_commands(&["alpha"]).subscribes_to("custom.*");
    let manager = loaded(&a).await;
    let before = run(&manager, "alpha").await;

    a.set_patch(1);
    manager.reload("a").await.unwrap();

    let after = run(&manager, "alpha").await;
    assert_ne!(before["generation"], after["generation"]);
    assert_eq!(manager.state("a").await, Some(PluginState::Active));
    assert_eq!(a.probe.initialized(), 2);
    assert_eq!(a.probe.cleaned_up(), 1);
    assert_eq!(manager.bus().subscriptions_of("a").len(), 1);

    let statuses = manager.statuses().await;
    assert_eq!(statuses[0].version, "1.0.1");
    assert_eq!(
        last_event(&manager, "plugin.reloaded"),
        Some(json!({ "plugin": "a", "previous_version": "1.0.0", "version": "1.0.1" }))
    );

    let tail: Vec<String> = plugin_events(&manager)
        .into_iter()
        .rev()
        .take(3)
        .map(|(name, _)| name)
        .collect();
    assert_eq!(tail, vec!["plugin.reloaded", "plugin.loaded", "plugin.unloaded"]);
}

#[tokio::test]
async fn test_failed_reload_restores_previous_instance() {
    let a = MockBlueprint::new("a").with_commands(&["alpha"]);
    let manager = loaded(&a).await;
    let before = run(&manager, "alpha").await;

    a.set_patch(7);
    a.set_failing(true);
    let error = manager.reload("a").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ReloadFailed);
    assert!(matches!(error, PluginError::ReloadFailed { restored: true, .. }));
    assert!(error.to_string().contains("previous instance restored"));

    assert_eq!(manager.state("a").await, Some(PluginState::Active));
    assert_eq!(manager.statuses().await[0].version, "1.0.0");
    assert_eq!(run(&manager, "alpha").await, before);
    assert!(last_event(&manager, "plugin.reloaded").is_none());
}

#[tokio::test]
async fn test_reload_leaves_plugin_unloaded_when_restore_fails() {
    let a = MockBlueprint::new("a").with_commands(&["alpha"]);
    let manager = loaded(&a).await;

    a.set_failing(true);
    a.set_reinitialize_failing(true);
    let error = manager.reload("a").await.unwrap_err();

    assert!(matches!(error, PluginError::ReloadFailed { restored: false, .. }));
    assert!(error.to_string().contains("plugin left unloaded"));
    assert_eq!(manager.state("a").await, Some(PluginState::Unloaded));
    assert!(manager.commands().read().await.is_empty());
    assert!(manager.active_plugins().await.is_empty());
}

#[tokio::test]
async fn test_reload_of_inactive_plugin_is_a_load() {
    let a = MockBlueprint::new("a");
    let manager = manager();
    register(&manager, &[&a]).await;

    manager.reload("a").await.unwrap();

    assert_eq!(manager.state("a").await, Some(PluginState::Active));
    assert!(last_event(&manager, "plugin.reloaded").is_none());
}

#[tokio::test]
async fn test_reload_with_active_dependents_is_refused() {
    let a = MockBlueprint::new("a");
    let b = MockBlueprint::new("b").depends_on("a");
    let manager = manager();
    register(&manager, &[&a, &b]).await;
    manager.load_all().await.unwrap();

    let error = manager.reload("a").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::DependentsStillActive);
    assert_eq!(a.probe.cleaned_up(), 0);
    assert_eq!(manager.state("b").await, Some(PluginState::Active));
}
