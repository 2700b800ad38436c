use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;

use crate::tenant::TenantSettings;

/// Lifecycle listener notified when a tenant shell is activated.
///
/// Both phases run at most once per shell. All listeners' `activating` calls
/// complete before the shell is flagged active; `activated` runs after.
/// No ordering is guaranteed among listeners within a phase.
#[async_trait]
pub trait TenantEvents: Send + Sync {
    /// Name used in logs and aggregated failure reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn activating(&self) -> anyhow::Result<()>;

    async fn activated(&self) -> anyhow::Result<()>;
}

/// Services visible to one request. Obtained from [`ShellContainer::create_scope`].
pub trait ServiceScope: Send + Sync {
    /// Looks up a service instance by type.
    fn get_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Lifecycle listeners registered for the owning tenant.
    fn tenant_events(&self) -> Vec<Arc<dyn TenantEvents>>;

    /// Frees all scoped instances. Called exactly once by the scope's owner.
    fn release(&self);
}

impl<'a> dyn ServiceScope + 'a {
    /// Typed lookup over [`ServiceScope::get_any`].
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get_any(TypeId::of::<T>())
            .and_then(|svc| svc.downcast::<T>().ok())
    }
}

/// A tenant's isolated service container.
pub trait ShellContainer: Send + Sync {
    /// Creates a fresh request scope.
    ///
    /// # Errors
    ///
    /// Returns an error if scoped services cannot be set up.
    fn create_scope(&self) -> anyhow::Result<Arc<dyn ServiceScope>>;
}

/// Builds a tenant's service container. May be expensive.
#[async_trait]
pub trait ShellFactory: Send + Sync {
    async fn create(&self, settings: &TenantSettings) -> anyhow::Result<Arc<dyn ShellContainer>>;
}

/// Backing store of tenant settings, loaded once at host initialization.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<TenantSettings>>;
}
