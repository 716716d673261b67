//! Deadlines and cooperative cancellation

use super::{pipeline_with, Behavior, TestCommand};
use crate::command::api::*;
use crate::core::error_handling::ErrorKind;
use crate::notifications::api::names;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SHORT: Duration = Duration::from_millis(50);
const LONG: Duration = Duration::from_secs(30);

#[tokio::test]
async fn test_timeout_result_and_event_share_correlation_id() {
    let (pipeline, bus) = pipeline_with(
        vec![
            TestCommand::new("stall", Behavior::Stall(LONG))
                .with_timeout(SHORT)
                .shared(),
            TestCommand::new("echo", Behavior::Echo).shared(),
        ],
        PipelineConfig::default(),
    )
    .await;

    let result = pipeline.execute_invocation(Invocation::new("stall")).await;

    assert!(!result.success);
    assert!(result.is_timeout());
    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    assert!(result.duration_ms < LONG.as_millis() as u64);

    let timeout_event = bus
        .timeline()
        .iter()
        .find(|e| e.name == names::COMMAND_TIMEOUT)
        .map(|e| e.correlation_id)
        .unwrap();
    assert_eq!(timeout_event, Some(result.correlation_id));

    // Still usable afterwards
    let next = pipeline.execute_invocation(Invocation::new("echo")).await;
    assert!(next.success);
    assert!(pipeline.active_invocations().is_empty());
}

#[tokio::test]
async fn test_pipeline_default_timeout_applies() {
    let config = PipelineConfig {
        default_timeout: SHORT,
        ..PipelineConfig::default()
    };
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("stall", Behavior::Stall(LONG)).shared()],
        config,
    )
    .await;

    let result = pipeline.execute_invocation(Invocation::new("stall")).await;

    assert_eq!(result.state, InvocationState::TimedOut);
}

#[tokio::test]
async fn test_timeout_signals_cooperative_body() {
    let observed = Arc::new(AtomicBool::new(false));
    let (pipeline, _bus) = pipeline_with(
        vec![
            TestCommand::new("watch", Behavior::Cooperative(LONG, Arc::clone(&observed)))
                .with_timeout(SHORT)
                .shared(),
        ],
        PipelineConfig::default(),
    )
    .await;

    let result = pipeline.execute_invocation(Invocation::new("watch")).await;
    assert!(result.is_timeout());

    for _ in 0..50 {
        if observed.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(observed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_explicit_cancel_of_in_flight_command() {
    let observed = Arc::new(AtomicBool::new(false));
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("watch", Behavior::Cooperative(LONG, Arc::clone(&observed))).shared()],
        PipelineConfig::default(),
    )
    .await;
    let pipeline = Arc::new(pipeline);

    let runner = Arc::clone(&pipeline);
    let run = tokio::spawn(async move { runner.execute_invocation(Invocation::new("watch")).await });

    let mut active = Vec::new();
    for _ in 0..100 {
        active = pipeline.active_invocations();
        if !active.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let (id, command) = active.first().cloned().unwrap();
    assert_eq!(command, "watch");
    assert!(pipeline.cancel(id));

    let result = run.await.unwrap();
    assert_eq!(result.correlation_id, id);
    assert_eq!(result.state, InvocationState::Failed);
    assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
    assert!(!pipeline.cancel(id));
}

struct SlowHook;

#[async_trait::async_trait]
impl PreHook for SlowHook {
    fn name(&self) -> &str {
        "slow"
    }

    async fn before(&self, _context: &mut ExecutionContext) -> Result<HookOutcome, HookError> {
        tokio::time::sleep(LONG).await;
        Ok(HookOutcome::Continue)
    }
}

#[tokio::test]
async fn test_slow_pre_hook_times_out() {
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("echo", Behavior::Echo).with_timeout(SHORT).shared()],
        PipelineConfig::default(),
    )
    .await;
    pipeline.add_pre_hook(Arc::new(SlowHook));

    let result = pipeline.execute_invocation(Invocation::new("echo")).await;

    assert_eq!(result.state, InvocationState::TimedOut);
    assert!(result.error.unwrap().message.ends_with("during PreHooks"));
}

struct SlowPostHook;

#[async_trait::async_trait]
impl PostHook for SlowPostHook {
    fn name(&self) -> &str {
        "slow-after"
    }

    async fn after(
        &self,
        _context: &mut ExecutionContext,
        _outcome: &Result<Value, CommandFailure>,
    ) -> Result<(), HookError> {
        tokio::time::sleep(LONG).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_post_hook_times_out() {
    let (pipeline, bus) = pipeline_with(
        vec![TestCommand::new("echo", Behavior::Echo).with_timeout(SHORT).shared()],
        PipelineConfig::default(),
    )
    .await;
    pipeline.add_post_hook(Arc::new(SlowPostHook));

    let result = pipeline.execute_invocation(Invocation::new("echo")).await;

    assert_eq!(result.state, InvocationState::TimedOut);
    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    assert!(result.error.as_ref().unwrap().message.ends_with("during PostHooks"));

    let timeout_events: Vec<_> = bus
        .timeline()
        .iter()
        .filter(|e| e.name == names::COMMAND_TIMEOUT)
        .map(|e| e.correlation_id)
        .collect();
    assert_eq!(timeout_events, vec![Some(result.correlation_id)]);
}

#[tokio::test]
async fn test_huge_default_timeout_still_runs() {
    let config = PipelineConfig {
        default_timeout: Duration::from_secs(u64::MAX),
        ..PipelineConfig::default()
    };
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("echo", Behavior::Echo).shared()],
        config,
    )
    .await;

    let result = pipeline
        .execute_invocation(Invocation::new("echo").with_arg("still here"))
        .await;

    assert!(result.success);
    assert_eq!(result.value, serde_json::json!(["still here"]));
}

#[tokio::test]
async fn test_huge_command_timeout_still_runs() {
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("echo", Behavior::Echo)
            .with_timeout(Duration::MAX)
            .shared()],
        PipelineConfig::default(),
    )
    .await;

    let result = pipeline.execute_invocation(Invocation::new("echo")).await;

    assert!(result.success);
    assert_eq!(result.state, InvocationState::Completed);
}
