//! Exactly-once shell activation.
//!
//! Double-checked protocol per shell:
//!
//! 1. **Fast path**: activation already settled -> proceed after one atomic load.
//! 2. **Slow path**: take the shell's gate, re-check, then run the sequence
//!    `activating` fan-out -> flag flip -> `activated` fan-out while holding it.
//!
//! The sequence runs on its own task holding an owned gate guard, so a caller
//! dropped mid-activation (client disconnect, timeout) never cuts it short.
//! Callers that queue on the gate find activation settled once they acquire
//! it and proceed without re-running listeners.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use shellgate_core::{TenantEvents, TenantId};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::context::ShellContext;
use crate::config::GateConfig;

/// Result of passing a request through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The shell was already active; no listener ran.
    AlreadyActive,
    /// This caller ran the activation sequence.
    Activated,
}

impl ActivationOutcome {
    /// Whether this caller triggered first-time activation.
    #[must_use]
    pub fn triggered(self) -> bool {
        matches!(self, Self::Activated)
    }
}

/// One listener's failure within an activation phase.
#[derive(Debug)]
pub struct ListenerFailure {
    pub listener: String,
    pub error: anyhow::Error,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.listener, self.error)
    }
}

/// Activation failures, aggregated over every listener of the failing phase.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// An `activating` listener failed. The shell stays inactive and the
    /// next request retries the whole sequence.
    #[error("tenant {tenant}: {count} listener(s) failed while activating", count = .failures.len())]
    Activating {
        tenant: TenantId,
        failures: Vec<ListenerFailure>,
    },
    /// An `activated` listener failed. The flag was already set and stays set.
    #[error("tenant {tenant}: {count} listener(s) failed after activation", count = .failures.len())]
    Activated {
        tenant: TenantId,
        failures: Vec<ListenerFailure>,
    },
}

impl ActivationError {
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        match self {
            Self::Activating { tenant, .. } | Self::Activated { tenant, .. } => tenant,
        }
    }

    #[must_use]
    pub fn failures(&self) -> &[ListenerFailure] {
        match self {
            Self::Activating { failures, .. } | Self::Activated { failures, .. } => failures,
        }
    }

    /// True when a later request will re-run activation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Activating { .. })
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Activating,
    Activated,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }
}

// ---------------------------------------------------------------------------
// ActivationGate
// ---------------------------------------------------------------------------

/// Runs the activation protocol for any shell.
///
/// Stateless apart from configuration; all per-shell state lives in
/// `ShellContext`, so one gate serves every tenant.
#[derive(Debug, Clone, Default)]
pub struct ActivationGate {
    listener_timeout: Option<Duration>,
}

impl ActivationGate {
    #[must_use]
    pub fn new(config: &GateConfig) -> Self {
        Self {
            listener_timeout: config.activation_timeout,
        }
    }

    /// Ensures `shell` is activated, running `listeners` if this caller wins.
    ///
    /// Returns only after activation has fully completed (or failed). The
    /// gate is released before returning, so callers never hold it while
    /// serving the request. Dropping the returned future does not stop an
    /// activation already started; the next caller waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Activating`] if any `activating` listener
    /// failed (shell left inactive), or [`ActivationError::Activated`] if any
    /// `activated` listener failed (shell left active).
    pub async fn ensure_activated(
        &self,
        shell: &Arc<ShellContext>,
        listeners: &[Arc<dyn TenantEvents>],
    ) -> Result<ActivationOutcome, ActivationError> {
        if shell.activation_settled() {
            return Ok(ActivationOutcome::AlreadyActive);
        }

        let token = Arc::clone(&shell.gate).lock_owned().await;

        if shell.activation_settled() {
            debug!(tenant = %shell.tenant_id(), "shell activated by another request");
            return Ok(ActivationOutcome::AlreadyActive);
        }

        let sequence = tokio::spawn(self.clone().run_sequence(
            Arc::clone(shell),
            listeners.to_vec(),
            token,
        ));

        match sequence.await {
            Ok(result) => result,
            Err(join_error) => Err(abandoned(shell, &join_error).await),
        }
    }

    /// The activation sequence proper. Holds `_token` until it returns.
    ///
    /// A shell found already committed was interrupted between the flag flip
    /// and the end of the `activated` phase; only that phase is re-run.
    async fn run_sequence(
        self,
        shell: Arc<ShellContext>,
        listeners: Vec<Arc<dyn TenantEvents>>,
        _token: OwnedMutexGuard<()>,
    ) -> Result<ActivationOutcome, ActivationError> {
        let tenant = shell.tenant_id().clone();
        let started = Instant::now();
        let resuming = shell.is_activated();
        info!(
            tenant = %tenant,
            listeners = listeners.len(),
            resuming = resuming,
            "activating shell"
        );

        if !resuming {
            shell.mark_activating();
            let failures = self.fan_out(Phase::Activating, &listeners).await;
            if !failures.is_empty() {
                shell.mark_uninitialized();
                record_failure(&tenant, Phase::Activating, &failures);
                return Err(ActivationError::Activating { tenant, failures });
            }
            shell.mark_committed();
        }

        let failures = self.fan_out(Phase::Activated, &listeners).await;
        shell.mark_activated();

        let elapsed = started.elapsed();
        metrics::counter!("shellgate_activations_total").increment(1);
        metrics::histogram!("shellgate_activation_duration_seconds").record(elapsed.as_secs_f64());

        if !failures.is_empty() {
            record_failure(&tenant, Phase::Activated, &failures);
            return Err(ActivationError::Activated { tenant, failures });
        }

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = elapsed.as_millis() as u64;
        info!(tenant = %tenant, duration_ms = duration_ms, "shell activated");
        Ok(ActivationOutcome::Activated)
    }

    /// Calls every listener's `phase` concurrently and waits for all of them.
    async fn fan_out(&self, phase: Phase, listeners: &[Arc<dyn TenantEvents>]) -> Vec<ListenerFailure> {
        let calls = listeners.iter().map(|listener| async move {
            let call = async {
                match phase {
                    Phase::Activating => listener.activating().await,
                    Phase::Activated => listener.activated().await,
                }
            };
            let result = match self.listener_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("timed out after {limit:?}"))),
                None => call.await,
            };
            result.err().map(|error| ListenerFailure {
                listener: listener.name().to_string(),
                error,
            })
        });

        join_all(calls).await.into_iter().flatten().collect()
    }
}

/// Error for a sequence task that panicked or was cancelled. An abandoned
/// `activating` phase is returned to `Uninitialized`; a committed shell keeps
/// its flag and the next caller re-runs the `activated` phase.
async fn abandoned(shell: &ShellContext, join_error: &JoinError) -> ActivationError {
    {
        let _token = shell.gate.lock().await;
        shell.mark_uninitialized();
    }

    let tenant = shell.tenant_id().clone();
    let failures = vec![ListenerFailure {
        listener: "activation task".to_string(),
        error: anyhow::anyhow!("activation task aborted: {join_error}"),
    }];
    if shell.is_activated() {
        record_failure(&tenant, Phase::Activated, &failures);
        ActivationError::Activated { tenant, failures }
    } else {
        record_failure(&tenant, Phase::Activating, &failures);
        ActivationError::Activating { tenant, failures }
    }
}

fn record_failure(tenant: &TenantId, phase: Phase, failures: &[ListenerFailure]) {
    metrics::counter!("shellgate_activation_failures_total", "phase" => phase.label()).increment(1);
    for failure in failures {
        warn!(
            tenant = %tenant,
            phase = phase.label(),
            listener = %failure.listener,
            error = %failure.error,
            "tenant listener failed"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
