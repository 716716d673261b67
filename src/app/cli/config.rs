//! TOML configuration file loading
//!
//! The file is optional. When `--config-file` is not given the default
//! location `<config dir>/Plughost/plughost.toml` is used if it exists.
//!
//! ```toml
//! log-level = "info"
//! timeout = 30
//! retention = 1000
//! prefix-match = true
//!
//! [plugins]
//! disabled = ["greeter"]
//!
//! [plugins.greeter]
//! greeting = "Howdy"
//!
//! [aliases]
//! hi = "greet"
//! ```
//!
//! Values given on the command line take precedence over the file.

use crate::app::cli::args::{Args, OutputFormat};
use crate::command::api::{PipelineConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_TIMEOUT};
use crate::core::error_handling::{ContextualError, ErrorKind};
use crate::notifications::api::{EventBusConfig, DEFAULT_MAX_DEPTH, DEFAULT_RETENTION};
use crate::plugin::api::{PluginManagerConfig, PluginSettings};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];
const LOG_FORMATS: [&str; 3] = ["text", "ext", "json"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {cause}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {cause}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        cause: toml::de::Error,
    },

    #[error("Invalid configuration value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ContextualError for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }

    fn is_user_actionable(&self) -> bool {
        true
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Values read from the configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub timeout: Option<Duration>,
    pub retention: Option<usize>,
    pub prefix_match: Option<bool>,
    pub disabled: Vec<String>,
    pub plugin_settings: BTreeMap<String, PluginSettings>,
    /// User alias -> command
    pub aliases: BTreeMap<String, String>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Plughost").join("plughost.toml"))
}

/// Load the explicit file, or the default one if present
pub fn load_config_file(config_file: Option<&Path>) -> ConfigResult<FileConfig> {
    let path = match config_file {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                log::debug!("Config: no configuration file");
                return Ok(FileConfig::default());
            }
        },
    };

    let contents = std::fs::read_to_string(&path).map_err(|cause| ConfigError::Read {
        path: path.clone(),
        cause,
    })?;
    let table = toml::from_str::<toml::Table>(&contents).map_err(|cause| ConfigError::Parse {
        path: path.clone(),
        cause,
    })?;
    log::debug!("Config: loaded {}", path.display());
    FileConfig::from_table(&table)
}

impl FileConfig {
    pub fn from_table(config: &toml::Table) -> ConfigResult<Self> {
        let mut file = FileConfig::default();

        for (key, value) in config {
            match key.as_str() {
                "log-level" => file.log_level = Some(choice(key, value, &LOG_LEVELS)?),
                "log-format" => file.log_format = Some(choice(key, value, &LOG_FORMATS)?),
                "log-file" => {
                    let log_file = string(key, value)?;
                    // "none" and "-" disable file logging
                    if !(log_file.eq_ignore_ascii_case("none") || log_file == "-") {
                        file.log_file = Some(PathBuf::from(log_file));
                    }
                }
                "color" => file.color = Some(boolean(key, value)?),
                "timeout" => file.timeout = Some(seconds(key, value)?),
                "retention" => file.retention = Some(count(key, value)?),
                "prefix-match" => file.prefix_match = Some(boolean(key, value)?),
                "plugins" => file.apply_plugins_table(value)?,
                "aliases" => file.apply_aliases_table(value)?,
                other => log::warn!("Config: ignoring unknown key '{}'", other),
            }
        }
        Ok(file)
    }

    fn apply_plugins_table(&mut self, value: &toml::Value) -> ConfigResult<()> {
        let Some(plugins) = value.as_table() else {
            return Err(invalid("plugins", "expected a table"));
        };

        for (key, value) in plugins {
            if key == "disabled" {
                self.disabled.extend(string_list("plugins.disabled", value)?);
                continue;
            }
            match value.as_table() {
                Some(table) => {
                    self.plugin_settings
                        .insert(key.clone(), PluginSettings::from_toml(table));
                }
                None => {
                    return Err(invalid(
                        &format!("plugins.{key}"),
                        "plugin settings must be a table",
                    ))
                }
            }
        }
        Ok(())
    }

    fn apply_aliases_table(&mut self, value: &toml::Value) -> ConfigResult<()> {
        let Some(aliases) = value.as_table() else {
            return Err(invalid("aliases", "expected a table"));
        };
        for (alias, target) in aliases {
            let target = string(&format!("aliases.{alias}"), target)?;
            self.aliases.insert(alias.clone(), target);
        }
        Ok(())
    }
}

/// Effective host configuration after merging file and command line
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub output: OutputFormat,
    pub pipeline: PipelineConfig,
    pub bus: EventBusConfig,
    pub plugins: PluginManagerConfig,
    pub aliases: BTreeMap<String, String>,
}

impl HostConfig {
    pub fn resolve(args: &Args, file: FileConfig) -> Self {
        let default_timeout = args
            .timeout
            .or(file.timeout)
            .unwrap_or(DEFAULT_TIMEOUT);
        let prefix_matching = !args.no_prefix_match && file.prefix_match.unwrap_or(true);

        let mut disabled: BTreeSet<String> = file.disabled.into_iter().collect();
        disabled.extend(
            args.disabled_plugins
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );

        Self {
            log_level: args.log_level.clone().or(file.log_level),
            log_format: args.log_format.clone().or(file.log_format),
            log_file: args.log_file.clone().or(file.log_file),
            color: args.color_choice().or(file.color),
            output: args.output.unwrap_or_default(),
            pipeline: PipelineConfig {
                default_timeout,
                prefix_matching,
                history_limit: DEFAULT_HISTORY_LIMIT,
            },
            bus: EventBusConfig {
                retention: args.retention.or(file.retention).unwrap_or(DEFAULT_RETENTION),
                max_depth: DEFAULT_MAX_DEPTH,
            },
            plugins: PluginManagerConfig {
                disabled,
                settings: file.plugin_settings,
            },
            aliases: file.aliases,
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn string(key: &str, value: &toml::Value) -> ConfigResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(key, "expected a string"))
}

fn choice(key: &str, value: &toml::Value, allowed: &[&str]) -> ConfigResult<String> {
    let text = string(key, value)?;
    if allowed.contains(&text.as_str()) {
        Ok(text)
    } else {
        Err(invalid(key, &format!("expected one of {}", allowed.join(", "))))
    }
}

fn boolean(key: &str, value: &toml::Value) -> ConfigResult<bool> {
    value.as_bool().ok_or_else(|| invalid(key, "expected true or false"))
}

fn count(key: &str, value: &toml::Value) -> ConfigResult<usize> {
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(key, "expected a non-negative integer"))
}

fn seconds(key: &str, value: &toml::Value) -> ConfigResult<Duration> {
    let seconds = match value {
        toml::Value::Integer(n) => *n as f64,
        toml::Value::Float(f) => *f,
        _ => return Err(invalid(key, "expected a number of seconds")),
    };
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(invalid(key, "must be greater than zero"));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid(key, "is too large"))
}

/// A single string, a comma-separated string or an array of strings
fn string_list(key: &str, value: &toml::Value) -> ConfigResult<Vec<String>> {
    let items: Vec<&str> = match value {
        toml::Value::String(s) => vec![s.as_str()],
        toml::Value::Array(array) => array
            .iter()
            .map(|item| item.as_str().ok_or_else(|| invalid(key, "expected strings")))
            .collect::<ConfigResult<_>>()?,
        _ => return Err(invalid(key, "expected a string or an array of strings")),
    };
    Ok(items
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}
