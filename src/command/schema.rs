//! Declared input schema of a command
//!
//! Validation runs once the command is resolved. It checks arity, rejects
//! unknown flags and options for strict schemas, enforces required options
//! and fills in option defaults on the invocation snapshot.

use crate::command::error::{PipelineError, PipelineResult};
use crate::command::types::Invocation;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgSpec {
    pub name: String,
    pub required: bool,
    /// Swallows all remaining positional arguments; only valid last
    pub variadic: bool,
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSpec {
    pub name: String,
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    pub name: String,
    pub required: bool,
    pub default: Option<String>,
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CommandSchema {
    pub args: Vec<ArgSpec>,
    pub flags: Vec<FlagSpec>,
    pub options: Vec<OptionSpec>,
    /// Accept undeclared arguments, flags and options
    pub permissive: bool,
}

impl CommandSchema {
    /// Strict schema accepting nothing until specs are added
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }

    pub fn arg(mut self, name: &str, required: bool, help: &str) -> Self {
        self.args.push(ArgSpec {
            name: name.to_string(),
            required,
            variadic: false,
            help: help.to_string(),
        });
        self
    }

    pub fn variadic(mut self, name: &str, help: &str) -> Self {
        self.args.push(ArgSpec {
            name: name.to_string(),
            required: false,
            variadic: true,
            help: help.to_string(),
        });
        self
    }

    pub fn flag(mut self, name: &str, help: &str) -> Self {
        self.flags.push(FlagSpec {
            name: name.to_string(),
            help: help.to_string(),
        });
        self
    }

    pub fn option(mut self, name: &str, default: Option<&str>, help: &str) -> Self {
        self.options.push(OptionSpec {
            name: name.to_string(),
            required: false,
            default: default.map(str::to_string),
            help: help.to_string(),
        });
        self
    }

    pub fn required_option(mut self, name: &str, help: &str) -> Self {
        self.options.push(OptionSpec {
            name: name.to_string(),
            required: true,
            default: None,
            help: help.to_string(),
        });
        self
    }

    /// Validate `invocation` and return the snapshot with defaults applied
    pub fn validate(&self, command: &str, invocation: &Invocation) -> PipelineResult<Invocation> {
        let invalid = |reason: String| PipelineError::InvalidArguments {
            command: command.to_string(),
            reason,
        };

        // Positionals fill slots left to right
        if let Some(missing) = self
            .args
            .iter()
            .skip(invocation.args.len())
            .find(|a| a.required)
        {
            return Err(invalid(format!("missing argument <{}>", missing.name)));
        }

        let variadic = self.args.last().is_some_and(|a| a.variadic);
        if !self.permissive && !variadic && invocation.args.len() > self.args.len() {
            return Err(invalid(format!(
                "unexpected argument '{}'",
                invocation.args[self.args.len()]
            )));
        }

        for flag in &invocation.flags {
            if self.flags.iter().any(|f| &f.name == flag) {
                continue;
            }
            if self.options.iter().any(|o| &o.name == flag) {
                return Err(invalid(format!("option '--{flag}' requires a value")));
            }
            if !self.permissive {
                return Err(invalid(format!("unknown flag '--{flag}'")));
            }
        }

        for key in invocation.options.keys() {
            if self.flags.iter().any(|f| &f.name == key) {
                return Err(invalid(format!("flag '--{key}' does not take a value")));
            }
            if !self.permissive && !self.options.iter().any(|o| &o.name == key) {
                return Err(invalid(format!("unknown option '--{key}'")));
            }
        }

        let mut validated = invocation.clone();
        for option in &self.options {
            if validated.options.contains_key(&option.name) {
                continue;
            }
            match (&option.default, option.required) {
                (Some(default), _) => {
                    validated
                        .options
                        .insert(option.name.clone(), default.clone());
                }
                (None, true) => {
                    return Err(invalid(format!("missing required option '--{}'", option.name)))
                }
                (None, false) => {}
            }
        }

        Ok(validated)
    }

    /// One-line usage summary, e.g. `greet [--shout] [--name=<name>]`
    pub fn usage(&self, command: &str) -> String {
        let mut parts = vec![command.to_string()];
        for arg in &self.args {
            let rendered = match (arg.required, arg.variadic) {
                (_, true) => format!("[{}...]", arg.name),
                (true, false) => format!("<{}>", arg.name),
                (false, false) => format!("[{}]", arg.name),
            };
            parts.push(rendered);
        }
        for flag in &self.flags {
            parts.push(format!("[--{}]", flag.name));
        }
        for option in &self.options {
            if option.required {
                parts.push(format!("--{}=<{}>", option.name, option.name));
            } else {
                parts.push(format!("[--{}=<{}>]", option.name, option.name));
            }
        }
        parts.join(" ")
    }
}
