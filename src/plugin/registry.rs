//! Plugin Registry
//!
//! Owns every registered plugin entry in registration order and resolves the
//! dependency graph into a deterministic load order.

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{Plugin, PluginFactory};
use crate::plugin::types::{PluginInfo, PluginState, PluginStatus};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One registered plugin
pub struct PluginEntry {
    pub info: PluginInfo,
    pub factory: PluginFactory,
    pub state: PluginState,
    /// Present while the plugin is active
    pub instance: Option<Box<dyn Plugin>>,
    pub failure: Option<String>,
    pub blocked_by: Option<String>,
    pub commands: Vec<String>,
}

impl PluginEntry {
    fn new(info: PluginInfo, factory: PluginFactory) -> Self {
        Self {
            info,
            factory,
            state: PluginState::Unloaded,
            instance: None,
            failure: None,
            blocked_by: None,
            commands: Vec::new(),
        }
    }

    pub fn status(&self) -> PluginStatus {
        PluginStatus {
            name: self.info.name.clone(),
            version: self.info.version.to_string(),
            description: self.info.description.clone(),
            state: self.state,
            dependencies: self.info.dependency_names(),
            commands: self.commands.clone(),
            failure: self.failure.clone(),
            blocked_by: self.blocked_by.clone(),
        }
    }
}

impl std::fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.info.name)
            .field("version", &self.info.version)
            .field("state", &self.state)
            .finish()
    }
}

/// Plugin registry for managing registered plugins
#[derive(Debug, Default)]
pub struct PluginRegistry {
    entries: Vec<PluginEntry>,
    index: HashMap<String, usize>,
    /// Names in the order they became active
    activation_order: Vec<String>,
}

impl PluginRegistry {
    /// Create a new empty plugin registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Fails if the name is taken.
    pub fn register(&mut self, info: PluginInfo, factory: PluginFactory) -> PluginResult<()> {
        if self.index.contains_key(&info.name) {
            return Err(PluginError::DuplicatePlugin {
                plugin_name: info.name,
            });
        }
        self.index.insert(info.name.clone(), self.entries.len());
        self.entries.push(PluginEntry::new(info, factory));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PluginEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PluginEntry> {
        self.index.get(name).map(|&i| &mut self.entries[i])
    }

    pub fn entry(&self, name: &str) -> PluginResult<&PluginEntry> {
        self.get(name).ok_or_else(|| PluginError::PluginNotFound {
            plugin_name: name.to_string(),
        })
    }

    pub fn entry_mut(&mut self, name: &str) -> PluginResult<&mut PluginEntry> {
        self.get_mut(name).ok_or_else(|| PluginError::PluginNotFound {
            plugin_name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.get(name).map(|e| e.state)
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.info.name.clone()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PluginEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mark_activated(&mut self, name: &str) {
        self.activation_order.retain(|n| n != name);
        self.activation_order.push(name.to_string());
    }

    pub fn mark_deactivated(&mut self, name: &str) {
        self.activation_order.retain(|n| n != name);
    }

    /// Active plugins in the order they were activated
    pub fn activation_order(&self) -> &[String] {
        &self.activation_order
    }

    /// Plugins that declare a direct dependency on `name`, in registration order
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.info.dependencies.iter().any(|d| d.name == name))
            .map(|e| e.info.name.clone())
            .collect()
    }

    /// Direct dependents of `name` that are currently active
    pub fn active_dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents_of(name)
            .into_iter()
            .filter(|d| self.state(d).is_some_and(PluginState::is_active))
            .collect()
    }

    /// `name` and everything it depends on, transitively
    pub fn dependency_closure(&self, name: &str) -> PluginResult<HashSet<String>> {
        let mut closure = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !closure.insert(current.clone()) {
                continue;
            }
            let entry = self.entry(&current)?;
            pending.extend(entry.info.dependencies.iter().map(|d| d.name.clone()));
        }
        Ok(closure)
    }

    /// Check every declared dependency against the registered plugins
    pub fn validate_dependencies(&self) -> PluginResult<()> {
        for entry in &self.entries {
            for dependency in &entry.info.dependencies {
                if dependency.name == entry.info.name {
                    return Err(PluginError::CyclicDependency {
                        cycle: vec![entry.info.name.clone(), entry.info.name.clone()],
                    });
                }
                let Some(target) = self.get(&dependency.name) else {
                    return Err(PluginError::InvalidDependency {
                        plugin_name: entry.info.name.clone(),
                        dependency: dependency.name.clone(),
                        reason: "no such plugin is registered".to_string(),
                    });
                };
                if !dependency.accepts(&target.info.version) {
                    return Err(PluginError::InvalidDependency {
                        plugin_name: entry.info.name.clone(),
                        dependency: dependency.name.clone(),
                        reason: format!(
                            "requires {}, found {}",
                            dependency.requirement, target.info.version
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Topological order over all registered plugins
    ///
    /// Every plugin comes after all of its dependencies. Among plugins that
    /// are ready at the same time, the one registered first goes first.
    pub fn resolve_load_order(&self) -> PluginResult<Vec<String>> {
        self.validate_dependencies()?;

        let count = self.entries.len();
        let mut remaining_deps: Vec<usize> = Vec::with_capacity(count);
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, entry) in self.entries.iter().enumerate() {
            let deps: BTreeSet<usize> = entry
                .info
                .dependencies
                .iter()
                .filter_map(|d| self.index.get(&d.name).copied())
                .collect();
            for &dep in &deps {
                dependents[dep].push(i);
            }
            remaining_deps.push(deps.len());
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| remaining_deps[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                remaining_deps[dependent] -= 1;
                if remaining_deps[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < count {
            return Err(PluginError::CyclicDependency {
                cycle: self.find_cycle(&remaining_deps),
            });
        }

        let order: Vec<String> = order
            .into_iter()
            .map(|i| self.entries[i].info.name.clone())
            .collect();
        log::debug!("PluginRegistry: load order {}", order.join(" -> "));
        Ok(order)
    }

    /// Load order restricted to `name` and its dependencies
    pub fn load_order_for(&self, name: &str) -> PluginResult<Vec<String>> {
        let closure = self.dependency_closure(name)?;
        Ok(self
            .resolve_load_order()?
            .into_iter()
            .filter(|n| closure.contains(n))
            .collect())
    }

    /// Walk dependency edges among unresolved plugins until a name repeats
    fn find_cycle(&self, remaining_deps: &[usize]) -> Vec<String> {
        let unresolved = |i: usize| remaining_deps[i] > 0;
        let Some(start) = (0..self.entries.len()).find(|&i| unresolved(i)) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|&i| i == current) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.entries[i].info.name.clone())
                    .collect();
                cycle.push(self.entries[current].info.name.clone());
                return cycle;
            }
            path.push(current);

            // An unresolved plugin always has at least one unresolved dependency
            let next = self.entries[current]
                .info
                .dependencies
                .iter()
                .filter_map(|d| self.index.get(&d.name).copied())
                .find(|&i| unresolved(i));
            match next {
                Some(next) => current = next,
                None => {
                    return path
                        .iter()
                        .map(|&i| self.entries[i].info.name.clone())
                        .collect()
                }
            }
        }
    }
}
