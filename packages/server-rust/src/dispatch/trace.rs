//! Dispatch tracing: one span and one completion event per request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::Request;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use super::layer::{Dispatch, DispatchError};

// ---------------------------------------------------------------------------
// DispatchTraceLayer
// ---------------------------------------------------------------------------

/// Tower layer that records method, path, outcome and duration of each dispatch.
#[derive(Debug, Clone)]
pub struct DispatchTraceLayer;

impl<S> Layer<S> for DispatchTraceLayer {
    type Service = DispatchTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchTraceService { inner }
    }
}

// ---------------------------------------------------------------------------
// DispatchTraceService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchTraceService<S> {
    inner: S,
}

impl<S, B, R, E> Service<Request<B>> for DispatchTraceService<S>
where
    S: Service<Request<B>, Response = Dispatch<R>, Error = DispatchError<E>> + Send,
    S::Future: Send + 'static,
{
    type Response = Dispatch<R>;
    type Error = DispatchError<E>;
    type Future = Pin<Box<dyn Future<Output = Result<Dispatch<R>, DispatchError<E>>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let span = info_span!(
            "dispatch",
            method = %req.method(),
            path = %req.uri().path(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = outcome_label(&result);
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!("shellgate_dispatch_total", "outcome" => outcome).increment(1);
                tracing::info!(duration_ms = duration_ms, outcome = outcome, "dispatch complete");

                result
            }
            .instrument(span),
        )
    }
}

fn outcome_label<R, E>(result: &Result<Dispatch<R>, DispatchError<E>>) -> &'static str {
    match result {
        Ok(Dispatch::Served(_)) => "served",
        Ok(Dispatch::Unserved) => "unserved",
        Err(err) => err.as_label(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
