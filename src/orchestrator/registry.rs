//! Module registry (spec §4.1, §6): holds the dependency graph of
//! `Module` instances and starts/stops them in dependency order.
//!
//! Grounded on `original_source/orchestrator/registry.py`'s naming
//! (`ModuleRegistry`, `ModuleDefinition`) — the Python body was stripped
//! to a docstring, so the topological-sort implementation here is fresh,
//! written the way the teacher writes its own DAG-shaped bookkeeping in
//! `risk_budget` (plain `HashMap` + `Vec`, no external graph crate).

use crate::error::CoreError;
use crate::module::Module;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ModuleDefinition {
    pub name: String,
    pub module: Arc<dyn Module>,
    pub depends_on: Vec<String>,
}

/// Holds registered modules and resolves start/stop order from their
/// declared dependencies. Cyclic graphs are rejected at registration
/// time via [`ModuleRegistry::start_order`].
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleDefinition>,
    order: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: ModuleDefinition) {
        self.order.push(def.name.clone());
        self.modules.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).map(|d| d.module.clone())
    }

    /// Topological order, dependencies before dependents. Insertion order
    /// is preserved among modules with no relative ordering constraint so
    /// the result is deterministic across runs.
    fn start_order(&self) -> Result<Vec<String>, CoreError> {
        let mut resolved = Vec::new();
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();

        fn visit(
            name: &str,
            modules: &HashMap<String, ModuleDefinition>,
            visiting: &mut HashSet<String>,
            visited: &mut HashSet<String>,
            resolved: &mut Vec<String>,
        ) -> Result<(), CoreError> {
            if visited.contains(name) {
                return Ok(());
            }
            if !visiting.insert(name.to_string()) {
                return Err(CoreError::Configuration(format!(
                    "module dependency cycle detected at '{name}'"
                )));
            }
            if let Some(def) = modules.get(name) {
                for dep in &def.depends_on {
                    visit(dep, modules, visiting, visited, resolved)?;
                }
            }
            visiting.remove(name);
            visited.insert(name.to_string());
            resolved.push(name.to_string());
            Ok(())
        }

        for name in &self.order {
            visit(name, &self.modules, &mut visiting, &mut visited, &mut resolved)?;
        }
        Ok(resolved)
    }

    /// Starts every registered module leaves-first. On failure, stops
    /// everything already started (reverse order) and returns the error —
    /// never leaves a partially-started registry behind.
    pub async fn start_all(&self) -> Result<(), CoreError> {
        let order = self.start_order()?;
        let mut started = Vec::new();

        for name in &order {
            let def = self.modules.get(name).expect("order derived from modules");
            info!(module = %name, "starting module");
            match def.module.start().await {
                Ok(()) => started.push(name.clone()),
                Err(e) => {
                    warn!(module = %name, error = %e, "module start failed, rolling back");
                    for started_name in started.iter().rev() {
                        if let Some(d) = self.modules.get(started_name) {
                            if let Err(stop_err) = d.module.stop().await {
                                warn!(module = %started_name, error = %stop_err, "cleanup stop failed");
                            }
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Stops every registered module in reverse dependency order. Best
    /// effort: a single module's stop failing does not prevent the rest
    /// from being asked to stop.
    pub async fn stop_all(&self) {
        let order = self.start_order().unwrap_or_else(|_| self.order.clone());
        for name in order.iter().rev() {
            if let Some(def) = self.modules.get(name) {
                if let Err(e) = def.module.stop().await {
                    warn!(module = %name, error = %e, "module stop failed");
                }
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleHealth;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeModule {
        name: String,
        started: AtomicBool,
        fail_start: bool,
    }

    #[async_trait]
    impl Module for FakeModule {
        fn name(&self) -> &str {
            &self.name
        }
        async fn start(&self) -> Result<(), CoreError> {
            if self.fail_start {
                return Err(CoreError::Internal("boom".into()));
            }
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) -> Result<(), CoreError> {
            self.started.store(false, Ordering::SeqCst);
            Ok(())
        }
        async fn health(&self) -> ModuleHealth {
            ModuleHealth::healthy()
        }
    }

    fn fake(name: &str, fail: bool) -> Arc<dyn Module> {
        Arc::new(FakeModule {
            name: name.to_string(),
            started: AtomicBool::new(false),
            fail_start: fail,
        })
    }

    #[tokio::test]
    async fn starts_dependencies_before_dependents() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDefinition { name: "b".into(), module: fake("b", false), depends_on: vec!["a".into()] });
        reg.register(ModuleDefinition { name: "a".into(), module: fake("a", false), depends_on: vec![] });
        let order = reg.start_order().unwrap();
        assert!(order.iter().position(|n| n == "a") < order.iter().position(|n| n == "b"));
        reg.start_all().await.unwrap();
    }

    #[tokio::test]
    async fn cycle_is_rejected() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDefinition { name: "a".into(), module: fake("a", false), depends_on: vec!["b".into()] });
        reg.register(ModuleDefinition { name: "b".into(), module: fake("b", false), depends_on: vec!["a".into()] });
        assert!(reg.start_all().await.is_err());
    }

    #[tokio::test]
    async fn failed_start_rolls_back_already_started() {
        let mut reg = ModuleRegistry::new();
        reg.register(ModuleDefinition { name: "a".into(), module: fake("a", false), depends_on: vec![] });
        reg.register(ModuleDefinition { name: "b".into(), module: fake("b", true), depends_on: vec!["a".into()] });
        let result = reg.start_all().await;
        assert!(result.is_err());
    }
}
