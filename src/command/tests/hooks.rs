//! Pre- and post-hook semantics

use super::{pipeline_with, Behavior, TestCommand};
use crate::command::api::*;
use crate::core::error_handling::ErrorKind;
use crate::notifications::api::names;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

struct Recording {
    name: &'static str,
    log: Log,
    outcome: Result<HookOutcome, HookError>,
}

#[async_trait::async_trait]
impl PreHook for Recording {
    fn name(&self) -> &str {
        self.name
    }

    async fn before(&self, context: &mut ExecutionContext) -> Result<HookOutcome, HookError> {
        self.log.lock().unwrap().push(format!("pre:{}", self.name));
        context.set_scratch(self.name, json!(true));
        self.outcome.clone()
    }
}

struct After {
    name: &'static str,
    log: Log,
    fail: bool,
}

#[async_trait::async_trait]
impl PostHook for After {
    fn name(&self) -> &str {
        self.name
    }

    async fn after(
        &self,
        context: &mut ExecutionContext,
        outcome: &Result<Value, CommandFailure>,
    ) -> Result<(), HookError> {
        let seen_scratch = context.scratch("auth").is_some();
        self.log.lock().unwrap().push(format!(
            "post:{}:{}:{}",
            self.name,
            if outcome.is_ok() { "ok" } else { "err" },
            seen_scratch
        ));
        if self.fail {
            Err(HookError::new("telemetry offline"))
        } else {
            Ok(())
        }
    }
}

fn pre(name: &'static str, log: &Log, outcome: Result<HookOutcome, HookError>) -> Arc<dyn PreHook> {
    Arc::new(Recording {
        name,
        log: Arc::clone(log),
        outcome,
    })
}

fn post(name: &'static str, log: &Log, fail: bool) -> Arc<dyn PostHook> {
    Arc::new(After {
        name,
        log: Arc::clone(log),
        fail,
    })
}

/// Reports whether the `auth` pre-hook left its marker
struct ScratchReader;

#[async_trait::async_trait]
impl Command for ScratchReader {
    fn name(&self) -> &str {
        "whoami"
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure> {
        Ok(json!({ "authenticated": context.scratch("auth").is_some() }))
    }
}

#[tokio::test]
async fn test_hooks_run_in_registration_order_around_body() {
    let log: Log = Arc::default();
    let (pipeline, _bus) =
        pipeline_with(vec![Arc::new(ScratchReader) as Arc<dyn Command>], PipelineConfig::default()).await;
    pipeline.add_pre_hook(pre("auth", &log, Ok(HookOutcome::Continue)));
    pipeline.add_pre_hook(pre("audit", &log, Ok(HookOutcome::Continue)));
    pipeline.add_post_hook(post("metrics", &log, false));

    let result = pipeline.execute_invocation(Invocation::new("whoami")).await;

    assert!(result.success);
    assert_eq!(result.value, json!({ "authenticated": true }));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["pre:auth", "pre:audit", "post:metrics:ok:true"]
    );
}

#[tokio::test]
async fn test_abort_completes_without_body_or_post_hooks() {
    let log: Log = Arc::default();
    let (pipeline, bus) = pipeline_with(
        vec![TestCommand::new("rm", Behavior::Fail("must not run")).shared()],
        PipelineConfig::default(),
    )
    .await;
    pipeline.add_pre_hook(pre("confirm", &log, Ok(HookOutcome::Abort("declined".into()))));
    pipeline.add_pre_hook(pre("never", &log, Ok(HookOutcome::Continue)));
    pipeline.add_post_hook(post("metrics", &log, false));

    let result = pipeline.execute_invocation(Invocation::new("rm")).await;

    assert_eq!(result.state, InvocationState::Completed);
    assert!(!result.success);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::HookAborted);
    assert_eq!(error.cause.as_deref(), Some("declined"));
    assert_eq!(*log.lock().unwrap(), vec!["pre:confirm"]);

    let timeline = bus.timeline();
    let names: Vec<_> = timeline
        .for_correlation(result.correlation_id)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            names::COMMAND_STARTED,
            names::COMMAND_ABORTED,
            names::COMMAND_COMPLETED
        ]
    );
}

#[tokio::test]
async fn test_pre_hook_error_fails_invocation() {
    let log: Log = Arc::default();
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("echo", Behavior::Echo).shared()],
        PipelineConfig::default(),
    )
    .await;
    pipeline.add_pre_hook(pre("auth", &log, Err(HookError::new("token expired"))));
    pipeline.add_post_hook(post("metrics", &log, false));

    let result = pipeline.execute_invocation(Invocation::new("echo")).await;

    assert_eq!(result.state, InvocationState::Failed);
    assert_eq!(result.error_kind(), Some(ErrorKind::HookFailed));
    assert_eq!(*log.lock().unwrap(), vec!["pre:auth"]);
}

#[tokio::test]
async fn test_post_hooks_run_after_body_failure() {
    let log: Log = Arc::default();
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("deploy", Behavior::Fail("boom")).shared()],
        PipelineConfig::default(),
    )
    .await;
    pipeline.add_post_hook(post("cleanup", &log, false));

    let result = pipeline.execute_invocation(Invocation::new("deploy")).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::CommandFailed));
    assert_eq!(*log.lock().unwrap(), vec!["post:cleanup:err:false"]);
}

#[tokio::test]
async fn test_post_hook_failure_does_not_change_success() {
    let log: Log = Arc::default();
    let (pipeline, _bus) = pipeline_with(
        vec![TestCommand::new("echo", Behavior::Echo).shared()],
        PipelineConfig::default(),
    )
    .await;
    pipeline.add_post_hook(post("telemetry", &log, true));
    pipeline.add_post_hook(post("cleanup", &log, false));

    let result = pipeline.execute_invocation(Invocation::new("echo")).await;

    assert!(result.success);
    assert_eq!(result.state, InvocationState::Completed);
    assert_eq!(result.hook_errors, vec!["telemetry: telemetry offline"]);
    assert_eq!(log.lock().unwrap().len(), 2);
}
