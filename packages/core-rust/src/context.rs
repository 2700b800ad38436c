//! Attributes attached to a request once its tenant has been resolved.
//!
//! The dispatcher inserts these into the request's extensions so the
//! continuation and any downstream code can read them.

use std::fmt;
use std::sync::Arc;

use crate::tenant::{TenantId, TenantSettings};
use crate::traits::ServiceScope;

/// The tenant a request was matched to.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub settings: Arc<TenantSettings>,
}

impl TenantContext {
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.settings.name
    }
}

/// The request-scoped service container bound to a request.
#[derive(Clone)]
pub struct RequestServices(pub Arc<dyn ServiceScope>);

impl RequestServices {
    #[must_use]
    pub fn scope(&self) -> &dyn ServiceScope {
        self.0.as_ref()
    }
}

impl fmt::Debug for RequestServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestServices").finish_non_exhaustive()
    }
}

/// Whether this request ran the tenant's first-time activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationMarker {
    pub triggered: bool,
}
