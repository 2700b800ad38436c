//! RAII ownership of a request-scoped service container.

use std::sync::Arc;

use shellgate_core::{RequestServices, ServiceScope, TenantEvents, TenantId};
use tracing::trace;

/// Owns one request scope and releases it exactly once when dropped.
///
/// Dropping covers every exit path of a request: normal completion, early
/// return on error, and the request future itself being dropped.
pub struct ScopeGuard {
    tenant: TenantId,
    scope: Arc<dyn ServiceScope>,
}

impl ScopeGuard {
    #[must_use]
    pub fn new(tenant: TenantId, scope: Arc<dyn ServiceScope>) -> Self {
        Self { tenant, scope }
    }

    #[must_use]
    pub fn scope(&self) -> &dyn ServiceScope {
        self.scope.as_ref()
    }

    /// Handle suitable for binding into request extensions.
    #[must_use]
    pub fn services(&self) -> RequestServices {
        RequestServices(Arc::clone(&self.scope))
    }

    /// Lifecycle listeners resolved from this scope.
    #[must_use]
    pub fn tenant_events(&self) -> Vec<Arc<dyn TenantEvents>> {
        self.scope.tenant_events()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.release();
        trace!(tenant = %self.tenant, "request scope released");
    }
}
