use std::sync::Arc;

use anyhow::Context as _;
use dashmap::DashMap;
use serde::Serialize;
use shellgate_core::{ShellFactory, TenantId, TenantSettings};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::context::{ActivationPhase, ShellContext};

/// Registry-level view of a tenant's shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellState {
    /// A slot exists but no shell has been constructed yet (in progress or failed).
    Loading,
    /// Constructed, not yet activated.
    Ready,
    Activated,
}

/// One constructed shell, as reported by [`ShellRegistry::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ShellStatus {
    pub tenant: String,
    pub instance_id: String,
    pub state: ShellState,
}

// ---------------------------------------------------------------------------
// ShellRegistry
// ---------------------------------------------------------------------------

/// Maps tenant ids to their shells, constructing each shell at most once.
///
/// Each tenant gets its own `OnceCell` slot in a sharded `DashMap`. The map
/// shard is locked only long enough to fetch or insert the slot; the
/// (possibly slow) factory call runs on the slot, so construction for one
/// tenant never blocks lookups or construction for another. A failed
/// construction leaves the slot empty and the next `resolve` retries it.
pub struct ShellRegistry {
    factory: Arc<dyn ShellFactory>,
    shells: DashMap<TenantId, Arc<OnceCell<Arc<ShellContext>>>>,
}

impl ShellRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(factory: Arc<dyn ShellFactory>) -> Self {
        Self {
            factory,
            shells: DashMap::new(),
        }
    }

    /// Returns the shell for `settings.name`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if construction fails. Nothing is
    /// registered in that case.
    pub async fn resolve(&self, settings: &Arc<TenantSettings>) -> anyhow::Result<Arc<ShellContext>> {
        if let Some(shell) = self.get(&settings.name) {
            return Ok(shell);
        }

        let slot = Arc::clone(self.shells.entry(settings.name.clone()).or_default().value());

        let shell = slot
            .get_or_try_init(|| async {
                debug!(tenant = %settings.name, "constructing shell");
                let container = self
                    .factory
                    .create(settings)
                    .await
                    .with_context(|| format!("shell factory failed for tenant {}", settings.name))?;
                let shell = Arc::new(ShellContext::new(Arc::clone(settings), container));
                info!(
                    tenant = %settings.name,
                    instance_id = %shell.instance_id(),
                    "shell constructed"
                );
                Ok::<_, anyhow::Error>(shell)
            })
            .await?;

        Ok(Arc::clone(shell))
    }

    /// Returns the shell for `tenant` if one has been constructed.
    #[must_use]
    pub fn get(&self, tenant: &TenantId) -> Option<Arc<ShellContext>> {
        self.shells
            .get(tenant)
            .and_then(|slot| slot.get().map(Arc::clone))
    }

    /// Reports the registry state of `tenant`. `None` means never seen.
    #[must_use]
    pub fn state(&self, tenant: &TenantId) -> Option<ShellState> {
        let slot = self.shells.get(tenant)?;
        Some(match slot.get() {
            None => ShellState::Loading,
            Some(shell) if shell.phase() == ActivationPhase::Activated => ShellState::Activated,
            Some(_) => ShellState::Ready,
        })
    }

    /// Number of constructed shells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shells.iter().filter(|slot| slot.initialized()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all constructed shells, sorted.
    #[must_use]
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut ids: Vec<TenantId> = self
            .shells
            .iter()
            .filter(|slot| slot.initialized())
            .map(|slot| slot.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Status of every constructed shell, sorted by tenant.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ShellStatus> {
        let mut all: Vec<ShellStatus> = self
            .shells
            .iter()
            .filter_map(|slot| {
                let shell = slot.get()?;
                let state = if shell.phase() == ActivationPhase::Activated {
                    ShellState::Activated
                } else {
                    ShellState::Ready
                };
                Some(ShellStatus {
                    tenant: slot.key().to_string(),
                    instance_id: shell.instance_id().to_string(),
                    state,
                })
            })
            .collect();
        all.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        all
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
