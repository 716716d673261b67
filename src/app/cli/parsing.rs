//! Turns the trailing command line into an [`Invocation`]
//!
//! The parser knows nothing about schemas: `--key=value` is an option,
//! `--name` and `-n` are flags (`-abc` is three flags), everything else is a
//! positional argument. After `--` every token is positional. Whether a flag
//! was meant as an option is decided later by the command's schema.

use crate::command::api::{Invocation, PipelineError, PipelineResult};

pub fn parse_invocation(tokens: &[String]) -> PipelineResult<Invocation> {
    let Some((name, rest)) = tokens.split_first() else {
        return Err(PipelineError::InvalidArguments {
            command: String::new(),
            reason: "no command given".to_string(),
        });
    };
    if name.starts_with('-') {
        return Err(PipelineError::InvalidArguments {
            command: name.clone(),
            reason: "expected a command name before any flags".to_string(),
        });
    }

    let mut invocation = Invocation::new(name.as_str());
    let mut positional_only = false;

    for token in rest {
        if positional_only || token == "-" || is_number(token) {
            invocation = invocation.with_arg(token.as_str());
        } else if token == "--" {
            positional_only = true;
        } else if let Some(long) = token.strip_prefix("--") {
            invocation = match long.split_once('=') {
                Some((key, value)) => {
                    ensure_name(name, token, key)?;
                    invocation.with_option(key, value)
                }
                None => {
                    ensure_name(name, token, long)?;
                    invocation.with_flag(long)
                }
            };
        } else if let Some(short) = token.strip_prefix('-') {
            for flag in short.chars() {
                if !flag.is_ascii_alphanumeric() {
                    return Err(PipelineError::InvalidArguments {
                        command: name.clone(),
                        reason: format!("invalid flag '{token}'"),
                    });
                }
                invocation = invocation.with_flag(flag.to_string());
            }
        } else {
            invocation = invocation.with_arg(token.as_str());
        }
    }
    Ok(invocation)
}

fn ensure_name(command: &str, token: &str, name: &str) -> PipelineResult<()> {
    if name.is_empty() || name.starts_with('-') {
        return Err(PipelineError::InvalidArguments {
            command: command.to_string(),
            reason: format!("invalid option '{token}'"),
        });
    }
    Ok(())
}

fn is_number(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}
