//! HTTP adapter: turns dispatch outcomes into plain responses so the
//! pipeline can be mounted on an axum router.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http::Request;
use tower::{Service, ServiceExt};
use tracing::error;

use super::layer::{Dispatch, DispatchError};

/// Maps a dispatch outcome onto an HTTP response.
///
/// | Outcome | Status |
/// |---|---|
/// | served | whatever the continuation returned |
/// | no tenant matched | 404 |
/// | activation failed, retry possible | 503 |
/// | any other failure | 500 |
pub fn into_http_response<R, E>(result: Result<Dispatch<R>, DispatchError<E>>) -> Response
where
    R: IntoResponse,
    E: fmt::Display,
{
    match result {
        Ok(Dispatch::Served(response)) => response.into_response(),
        Ok(Dispatch::Unserved) => {
            (StatusCode::NOT_FOUND, "no tenant serves this request").into_response()
        }
        Err(DispatchError::Activation(err)) if err.is_retryable() => {
            error!(tenant = %err.tenant(), error = %err, "tenant activation failed");
            (StatusCode::SERVICE_UNAVAILABLE, "tenant is starting, retry later").into_response()
        }
        Err(DispatchError::Handler(err)) => {
            error!(kind = "handler", error = %err, "dispatch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "tenant unavailable").into_response()
        }
        Err(err) => {
            error!(kind = err.as_label(), error = %err, "dispatch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "tenant unavailable").into_response()
        }
    }
}

/// Infallible wrapper around a dispatch pipeline, usable as an axum
/// fallback service.
#[derive(Clone)]
pub struct HttpDispatchService<S> {
    inner: S,
}

impl<S> HttpDispatchService<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, B, R, E> Service<Request<B>> for HttpDispatchService<S>
where
    S: Service<Request<B>, Response = Dispatch<R>, Error = DispatchError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
    R: IntoResponse + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner pipeline is awaited per call by `oneshot`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let svc = self.inner.clone();
        Box::pin(async move { Ok(into_http_response(svc.oneshot(req).await)) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
