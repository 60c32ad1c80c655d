use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core modules that must come up in a fixed order, before any custom module.
/// The HTTP server is started separately once every module is running.
const CORE_MODULE_ORDER: &[&str] = &["db"];

/// Module registry for managing module lifecycle with core/custom separation
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Init,
    Start,
    Stop,
}

impl Phase {
    fn verb(self) -> &'static str {
        match self {
            Phase::Init => "initialize",
            Phase::Start => "start",
            Phase::Stop => "stop",
        }
    }
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register a core module. Only names listed in the core order take part in the lifecycle.
    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        if !CORE_MODULE_ORDER.contains(&module.name()) {
            tracing::warn!(
                module = module.name(),
                "core module is not part of the core order and will not be initialized"
            );
        }
        self.core_modules.push(module);
    }

    /// Register a custom module with the registry
    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// All registered modules, core first
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .collect()
    }

    /// Get a module by name (searches both core and custom modules)
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules().into_iter().find(|module| module.name() == name)
    }

    pub fn core_module_count(&self) -> usize {
        self.core_modules.len()
    }

    pub fn custom_module_count(&self) -> usize {
        self.custom_modules.len()
    }

    /// Modules in lifecycle order: core modules by `CORE_MODULE_ORDER`, then custom
    /// modules in registration order.
    fn lifecycle_order(&self) -> Vec<&Arc<dyn Module>> {
        CORE_MODULE_ORDER
            .iter()
            .filter_map(|&name| self.core_modules.iter().find(|m| m.name() == name))
            .chain(self.custom_modules.iter())
            .collect()
    }

    async fn run_phase(&self, phase: Phase, ctx: Option<&InitCtx<'_>>) -> anyhow::Result<()> {
        let mut order = self.lifecycle_order();
        if let Phase::Stop = phase {
            order.reverse();
        }

        tracing::info!(
            phase = phase.verb(),
            modules = ?order.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "running module lifecycle phase"
        );

        // Stop keeps going so later modules still release their resources;
        // the first failure is reported.
        let mut first_error = None;
        for module in order {
            let result = match (phase, ctx) {
                (Phase::Init, Some(ctx)) => module.init(ctx).await,
                (Phase::Start, Some(ctx)) => module.start(ctx).await,
                (Phase::Stop, _) => module.stop().await,
                (_, None) => anyhow::bail!("phase '{}' requires an init context", phase.verb()),
            };
            let Err(err) = result.with_context(|| {
                format!("failed to {} module '{}'", phase.verb(), module.name())
            }) else {
                continue;
            };

            match phase {
                Phase::Stop => {
                    tracing::error!(module = module.name(), error = ?err, "module failed to stop");
                    first_error.get_or_insert(err);
                }
                _ => return Err(err),
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Initialize core modules in order, then custom modules
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.run_phase(Phase::Init, Some(ctx)).await
    }

    /// Start core modules in order, then custom modules
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.run_phase(Phase::Start, Some(ctx)).await
    }

    /// Stop custom modules first, then core modules, each in reverse order
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        self.run_phase(Phase::Stop, None).await
    }

    /// Collect migrations in lifecycle order, keeping each module's own ordering.
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        self.lifecycle_order()
            .into_iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (module.name().to_string(), migration))
            })
            .collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
