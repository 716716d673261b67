//! Command-line arguments
//!
//! Host options come first; the first positional word starts the command line
//! that is handed to the pipeline unchanged:
//!
//! ```text
//! plughost --log-level debug greet --name=Ada --shout
//! ```

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// How command results and listings are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "plughost")]
#[command(about = "Plugin host for extensible command-line applications")]
#[command(version)]
#[command(after_help = " * can be specified multiple times or as a comma-separated list")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force coloured output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Command timeout in seconds
    #[arg(short = 't', long = "timeout", value_name = "SECONDS", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Number of events kept in the timeline (0 disables it)
    #[arg(long = "retention", value_name = "COUNT")]
    pub retention: Option<usize>,

    /// Require full command names (no unique-prefix matching)
    #[arg(long = "no-prefix-match")]
    pub no_prefix_match: bool,

    /// Plugins to leave unloaded*
    #[arg(short = 'd', long = "disable-plugin", value_name = "NAMES", action = ArgAction::Append, value_delimiter = ',')]
    pub disabled_plugins: Vec<String>,

    /// List plugins and their state, then exit
    #[arg(long = "plugins")]
    pub plugins: bool,

    /// Output format for results and listings
    #[arg(long = "output", value_enum, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,

    /// Command to run, followed by its arguments, --flags and --options=values
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Args {
    /// `Some(true)` for `--color`, `Some(false)` for `--no-color`, `None` to auto-detect
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err("timeout must be greater than zero".to_string());
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("timeout of {value} seconds is too large"))
}
