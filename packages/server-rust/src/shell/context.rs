//! Runtime record for one tenant shell.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use shellgate_core::{ShellContainer, TenantId, TenantSettings};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::scope::ScopeGuard;

const UNINITIALIZED: u8 = 0;
const ACTIVATING: u8 = 1;
/// Activation flag flipped, `activated` listeners still running under the gate.
const COMMITTED: u8 = 2;
const ACTIVATED: u8 = 3;

/// Activation progress of a shell.
///
/// State machine: Uninitialized -> Activating -> Activated (terminal).
/// A failed `activating` phase returns the shell to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPhase {
    Uninitialized,
    Activating,
    Activated,
}

/// A tenant's shell: settings, service container, activation flag and the
/// exclusive token serializing activation.
///
/// Owned by the `ShellRegistry` and shared as `Arc<ShellContext>`.
pub struct ShellContext {
    settings: Arc<TenantSettings>,
    instance_id: Uuid,
    container: Arc<dyn ShellContainer>,
    phase: AtomicU8,
    /// Guards the activation sequence only, never the request continuation.
    /// Shared so a detached activation task can own its guard.
    pub(crate) gate: Arc<Mutex<()>>,
}

impl ShellContext {
    #[must_use]
    pub fn new(settings: Arc<TenantSettings>, container: Arc<dyn ShellContainer>) -> Self {
        Self {
            settings,
            instance_id: Uuid::new_v4(),
            container,
            phase: AtomicU8::new(UNINITIALIZED),
            gate: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.settings.name
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<TenantSettings> {
        &self.settings
    }

    /// Unique per constructed shell; distinguishes rebuilt shells in logs.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// The activation flag. Monotonic: once true it never reverts.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.phase.load(Ordering::Acquire) >= COMMITTED
    }

    #[must_use]
    pub fn phase(&self) -> ActivationPhase {
        match self.phase.load(Ordering::Acquire) {
            UNINITIALIZED => ActivationPhase::Uninitialized,
            ACTIVATED => ActivationPhase::Activated,
            _ => ActivationPhase::Activating,
        }
    }

    /// Creates a request scope whose release is bound to the returned guard.
    ///
    /// # Errors
    ///
    /// Returns the container's error if the scope cannot be created.
    pub fn create_scope(&self) -> anyhow::Result<ScopeGuard> {
        let scope = self.container.create_scope()?;
        Ok(ScopeGuard::new(self.settings.name.clone(), scope))
    }

    /// True once activation has fully completed, both listener phases included.
    pub(crate) fn activation_settled(&self) -> bool {
        self.phase.load(Ordering::Acquire) == ACTIVATED
    }

    pub(crate) fn mark_activating(&self) {
        self.phase.store(ACTIVATING, Ordering::Release);
    }

    /// Reverts a failed or abandoned `activating` phase. Never clears a
    /// committed flag.
    pub(crate) fn mark_uninitialized(&self) {
        let _ = self.phase.compare_exchange(
            ACTIVATING,
            UNINITIALIZED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_committed(&self) {
        self.phase.store(COMMITTED, Ordering::Release);
    }

    pub(crate) fn mark_activated(&self) {
        self.phase.store(ACTIVATED, Ordering::Release);
    }
}

impl fmt::Debug for ShellContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellContext")
            .field("tenant", &self.settings.name)
            .field("instance_id", &self.instance_id)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
