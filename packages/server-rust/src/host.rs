//! Long-lived owner of all tenant shell state.

use std::sync::Arc;

use http::{HeaderMap, Uri};
use shellgate_core::{SettingsSource, ShellFactory, TenantSettings};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::GateConfig;
use crate::shell::{
    ActivationError, ActivationGate, ActivationOutcome, ScopeGuard, ShellContext, ShellRegistry,
    ShellStatus,
};
use crate::tenant::{RunningShellTable, TenantMatcher};

/// Owns the shell registry, the running shell table and the activation gate.
///
/// Created empty at process start; tenants are loaded by [`initialize`]
/// and shells are built lazily on first request. Shared as `Arc<ShellHost>`.
///
/// [`initialize`]: ShellHost::initialize
pub struct ShellHost {
    source: Arc<dyn SettingsSource>,
    table: Arc<RunningShellTable>,
    matcher: Arc<dyn TenantMatcher>,
    registry: ShellRegistry,
    gate: ActivationGate,
    initialized: OnceCell<()>,
}

impl ShellHost {
    /// Creates a host that matches requests with its own [`RunningShellTable`].
    #[must_use]
    pub fn new(
        config: &GateConfig,
        source: Arc<dyn SettingsSource>,
        factory: Arc<dyn ShellFactory>,
    ) -> Self {
        let table = Arc::new(RunningShellTable::new());
        Self {
            source,
            matcher: Arc::clone(&table) as Arc<dyn TenantMatcher>,
            table,
            registry: ShellRegistry::new(factory),
            gate: ActivationGate::new(config),
            initialized: OnceCell::new(),
        }
    }

    /// Replaces the request matcher. The running shell table is still filled
    /// by [`initialize`](ShellHost::initialize) but no longer consulted.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn TenantMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Loads tenant settings and registers running tenants. Idempotent.
    ///
    /// Concurrent callers wait for the first load. A failed load leaves the
    /// host uninitialized so the next call retries.
    ///
    /// # Errors
    ///
    /// Returns the settings source's error.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                let all = self.source.load().await?;
                let total = all.len();
                let running = all
                    .into_iter()
                    .map(|settings| self.table.add(Arc::new(settings)))
                    .filter(|added| *added)
                    .count();
                info!(tenants = total, running = running, "shell host initialized");
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Adds a running tenant to the table after initialization.
    pub fn register_tenant(&self, settings: TenantSettings) -> bool {
        self.table.add(Arc::new(settings))
    }

    #[must_use]
    pub fn match_request(&self, uri: &Uri, headers: &HeaderMap) -> Option<Arc<TenantSettings>> {
        self.matcher.match_tenant(uri, headers)
    }

    /// Returns the tenant's shell, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the shell factory's error; no shell is registered in that case.
    pub async fn get_or_create_shell(
        &self,
        settings: &Arc<TenantSettings>,
    ) -> anyhow::Result<Arc<ShellContext>> {
        self.registry.resolve(settings).await
    }

    /// Runs the activation gate with the listeners resolved from `scope`.
    ///
    /// # Errors
    ///
    /// See [`ActivationGate::ensure_activated`].
    pub async fn activate(
        &self,
        shell: &Arc<ShellContext>,
        scope: &ScopeGuard,
    ) -> Result<ActivationOutcome, ActivationError> {
        let listeners = scope.tenant_events();
        self.gate.ensure_activated(shell, &listeners).await
    }

    #[must_use]
    pub fn registry(&self) -> &ShellRegistry {
        &self.registry
    }

    #[must_use]
    pub fn table(&self) -> &RunningShellTable {
        &self.table
    }

    #[must_use]
    pub fn shells(&self) -> Vec<ShellStatus> {
        self.registry.snapshot()
    }
}
