//! Public API for the command pipeline
//!
//! External modules should import from here rather than directly from internal modules.

pub use crate::command::context::{CommandContext, ExecutionContext};
pub use crate::command::error::{CommandFailure, HookError, PipelineError, PipelineResult};
pub use crate::command::pipeline::{
    CommandPipeline, PipelineConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_TIMEOUT,
};
pub use crate::command::schema::{ArgSpec, CommandSchema, FlagSpec, OptionSpec};
pub use crate::command::table::{CommandDescriptor, CommandTable, SharedCommandTable};
pub use crate::command::traits::{Command, HookOutcome, PostHook, PreHook};
pub use crate::command::types::{CommandError, CommandResult, Invocation, InvocationState};
