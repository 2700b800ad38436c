//! Pipeline composition: wraps a continuation with the dispatch layers.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::layer::{TenantContainerLayer, TenantContainerService};
use super::trace::{DispatchTraceLayer, DispatchTraceService};
use crate::host::ShellHost;

/// Build the dispatch pipeline around `continuation`.
///
/// Layer order (outermost to innermost):
/// 1. `DispatchTraceLayer` -- span and completion event for every request
/// 2. `TenantContainerLayer` -- tenant match, shell scope and activation
#[must_use]
pub fn build_dispatch_pipeline<S>(
    host: Arc<ShellHost>,
    continuation: S,
) -> DispatchTraceService<TenantContainerService<S>> {
    ServiceBuilder::new()
        .layer(DispatchTraceLayer)
        .layer(TenantContainerLayer::new(host))
        .service(continuation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
