//! Type definitions for the plugin system
//!
//! Plugin metadata, dependency declarations, lifecycle states and the
//! snapshots the manager hands out for display.

use crate::core::error_handling::{ContextualError, ErrorKind};
use crate::plugin::error::PluginError;
use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};

/// Declared dependency on another plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDependency {
    pub name: String,
    pub requirement: VersionReq,
}

impl PluginDependency {
    pub fn new(name: &str, requirement: VersionReq) -> Self {
        Self {
            name: name.to_string(),
            requirement,
        }
    }

    /// Any version satisfies the dependency
    pub fn any(name: &str) -> Self {
        Self::new(name, VersionReq::STAR)
    }

    /// `>= major.minor`
    pub fn at_least(name: &str, major: u64, minor: u64) -> Self {
        Self::new(
            name,
            VersionReq {
                comparators: vec![Comparator {
                    op: Op::GreaterEq,
                    major,
                    minor: Some(minor),
                    patch: None,
                    pre: Prerelease::EMPTY,
                }],
            },
        )
    }

    pub fn accepts(&self, version: &Version) -> bool {
        self.requirement.matches(version)
    }
}

impl std::fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.requirement)
    }
}

/// Plugin metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub version: Version,
    pub description: String,
    pub author: String,
    /// Host API version the plugin was built against
    pub api_version: u32,
    pub dependencies: Vec<PluginDependency>,
}

impl PluginInfo {
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            name: name.to_string(),
            version,
            description: String::new(),
            author: String::new(),
            api_version: crate::core::version::get_api_version(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn depends_on(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.name.clone()).collect()
    }
}

/// Plugin lifecycle state
///
/// `Unloaded → Loaded → Initialized → Active → Stopping → Unloaded`. A failed
/// initialization ends in `Failed`; a plugin whose dependency is not active
/// when its turn comes ends in `BlockedByDependency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
pub enum PluginState {
    Unloaded,
    Loaded,
    Initialized,
    Active,
    Stopping,
    Failed,
    BlockedByDependency,
}

impl PluginState {
    pub fn is_active(self) -> bool {
        self == PluginState::Active
    }
}

/// Snapshot of one plugin for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub version: String,
    pub description: String,
    pub state: PluginState,
    pub dependencies: Vec<String>,
    pub commands: Vec<String>,
    pub failure: Option<String>,
    pub blocked_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub plugin: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl LoadFailure {
    pub fn new(plugin: &str, error: &PluginError) -> Self {
        Self {
            plugin: plugin.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedPlugin {
    pub plugin: String,
    pub dependency: String,
}

/// Outcome of a batch load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Resolved dependency order of every registered plugin
    pub order: Vec<String>,
    pub loaded: Vec<String>,
    pub failed: Vec<LoadFailure>,
    pub blocked: Vec<BlockedPlugin>,
    /// Disabled by configuration
    pub skipped: Vec<String>,
}

impl LoadReport {
    pub fn new(order: Vec<String>) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    /// True when every plugin that was attempted became active
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_requirements() {
        let any = PluginDependency::any("core");
        assert!(any.accepts(&Version::new(0, 0, 1)));

        let at_least = PluginDependency::at_least("core", 1, 2);
        assert!(at_least.accepts(&Version::new(1, 2, 0)));
        assert!(at_least.accepts(&Version::new(2, 0, 0)));
        assert!(!at_least.accepts(&Version::new(1, 1, 9)));
        assert_eq!(at_least.to_string(), "core >=1.2");
    }

    #[test]
    fn test_info_builder() {
        let info = PluginInfo::new("greeter", Version::new(1, 0, 0))
            .with_description("Greets people")
            .depends_on(PluginDependency::any("core"));

        assert_eq!(info.dependency_names(), vec!["core"]);
        assert_eq!(info.api_version, crate::core::version::get_api_version());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PluginState::BlockedByDependency.to_string(), "BlockedByDependency");
        assert!(PluginState::Active.is_active());
        assert!(!PluginState::Initialized.is_active());
    }
}
