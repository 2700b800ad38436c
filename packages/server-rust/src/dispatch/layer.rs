//! Tenant container middleware: binds each request to its tenant's shell.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Request;
use shellgate_core::{ActivationMarker, TenantContext, TenantId};
use tower::{Layer, Service};
use tracing::debug;

use crate::host::ShellHost;
use crate::shell::ActivationError;

/// Outcome of a dispatched request.
#[derive(Debug)]
pub enum Dispatch<R> {
    /// The continuation ran and produced this response.
    Served(R),
    /// No tenant matched; the continuation was not invoked.
    Unserved,
}

impl<R> Dispatch<R> {
    #[must_use]
    pub fn is_served(&self) -> bool {
        matches!(self, Self::Served(_))
    }

    pub fn into_served(self) -> Option<R> {
        match self {
            Self::Served(resp) => Some(resp),
            Self::Unserved => None,
        }
    }
}

/// Failures surfaced by the dispatcher. The continuation's own error is
/// carried unchanged in `Handler`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError<E> {
    #[error("tenant host initialization failed")]
    Initialize(#[source] anyhow::Error),
    #[error("failed to construct shell for tenant {tenant}")]
    Construction {
        tenant: TenantId,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to create request scope for tenant {tenant}")]
    Scope {
        tenant: TenantId,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Activation(#[from] ActivationError),
    #[error("request handler failed")]
    Handler(#[source] E),
}

impl<E> DispatchError<E> {
    /// Short stable label for logs and metrics.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Initialize(_) => "initialize",
            Self::Construction { .. } => "construction",
            Self::Scope { .. } => "scope",
            Self::Activation(_) => "activation",
            Self::Handler(_) => "handler",
        }
    }
}

// ---------------------------------------------------------------------------
// TenantContainerLayer
// ---------------------------------------------------------------------------

/// Tower layer that routes every request through a [`ShellHost`].
#[derive(Clone)]
pub struct TenantContainerLayer {
    host: Arc<ShellHost>,
}

impl TenantContainerLayer {
    #[must_use]
    pub fn new(host: Arc<ShellHost>) -> Self {
        Self { host }
    }
}

impl<S> Layer<S> for TenantContainerLayer {
    type Service = TenantContainerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantContainerService {
            inner,
            host: Arc::clone(&self.host),
        }
    }
}

// ---------------------------------------------------------------------------
// TenantContainerService
// ---------------------------------------------------------------------------

/// Service wrapper that resolves the tenant, scopes its services, activates
/// its shell if needed, then calls the continuation.
#[derive(Clone)]
pub struct TenantContainerService<S> {
    inner: S,
    host: Arc<ShellHost>,
}

impl<S, B> Service<Request<B>> for TenantContainerService<S>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
{
    type Response = Dispatch<S::Response>;
    type Error = DispatchError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(DispatchError::Handler)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // Keep the instance that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(dispatch(Arc::clone(&self.host), inner, req))
    }
}

async fn dispatch<S, B>(
    host: Arc<ShellHost>,
    mut inner: S,
    mut req: Request<B>,
) -> Result<Dispatch<S::Response>, DispatchError<S::Error>>
where
    S: Service<Request<B>>,
{
    host.initialize().await.map_err(DispatchError::Initialize)?;

    let Some(settings) = host.match_request(req.uri(), req.headers()) else {
        debug!(uri = %req.uri(), "no tenant matched, request not served");
        metrics::counter!("shellgate_unserved_requests_total").increment(1);
        return Ok(Dispatch::Unserved);
    };
    let tenant = settings.name.clone();

    req.extensions_mut().insert(TenantContext {
        settings: Arc::clone(&settings),
    });

    let shell = host
        .get_or_create_shell(&settings)
        .await
        .map_err(|source| DispatchError::Construction {
            tenant: tenant.clone(),
            source,
        })?;

    // Released when this guard drops, on every path out of this function.
    let scope = shell
        .create_scope()
        .map_err(|source| DispatchError::Scope {
            tenant: tenant.clone(),
            source,
        })?;
    req.extensions_mut().insert(scope.services());

    let outcome = host.activate(&shell, &scope).await?;
    req.extensions_mut().insert(ActivationMarker {
        triggered: outcome.triggered(),
    });

    debug!(tenant = %tenant, triggered = outcome.triggered(), "dispatching to tenant");
    let result = inner.call(req).await;
    drop(scope);

    result.map(Dispatch::Served).map_err(DispatchError::Handler)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
