//! Shared test doubles for lifecycle listeners and shell factories.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shellgate_core::{ServiceScope, ShellContainer, ShellFactory, TenantEvents, TenantSettings};

use crate::shell::services::ShellServices;

/// Ordered log of `"{listener}:{phase}"` entries shared across listeners.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Number of calls made in `phase` (`"activating"` or `"activated"`).
    pub(crate) fn count(&self, phase: &str) -> usize {
        let suffix = format!(":{phase}");
        self.0.lock().iter().filter(|e| e.ends_with(&suffix)).count()
    }
}

/// Listener that logs every call, with optional delays and injected failures.
pub(crate) struct RecordingListener {
    name: String,
    log: EventLog,
    activating_delay: Duration,
    activated_delay: Duration,
    fail_activating: AtomicU32,
    fail_activated: AtomicBool,
}

impl RecordingListener {
    pub(crate) fn new(name: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            activating_delay: Duration::ZERO,
            activated_delay: Duration::ZERO,
            fail_activating: AtomicU32::new(0),
            fail_activated: AtomicBool::new(false),
        }
    }

    /// Delays both phases.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.activating_delay = delay;
        self.activated_delay = delay;
        self
    }

    pub(crate) fn with_activated_delay(mut self, delay: Duration) -> Self {
        self.activated_delay = delay;
        self
    }

    /// Fails the first `times` calls to `activating`.
    pub(crate) fn failing_activating(self, times: u32) -> Self {
        self.fail_activating.store(times, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_activated(self) -> Self {
        self.fail_activated.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl TenantEvents for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn activating(&self) -> anyhow::Result<()> {
        tokio::time::sleep(self.activating_delay).await;
        self.log.push(format!("{}:activating", self.name));
        let should_fail = self
            .fail_activating
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            anyhow::bail!("{} refused to activate", self.name);
        }
        Ok(())
    }

    async fn activated(&self) -> anyhow::Result<()> {
        tokio::time::sleep(self.activated_delay).await;
        self.log.push(format!("{}:activated", self.name));
        if self.fail_activated.load(Ordering::SeqCst) {
            anyhow::bail!("{} failed after activation", self.name);
        }
        Ok(())
    }
}

type ListenerSet = Box<dyn Fn(&TenantSettings) -> Vec<Arc<dyn TenantEvents>> + Send + Sync>;

/// Factory building a `ShellServices` per tenant with the given listeners.
///
/// Counts constructions and exposes each shell's live-scope counter. Every
/// scope it hands out also reports to a shared [`ScopeLedger`].
pub(crate) struct ListenerFactory {
    listeners: ListenerSet,
    pub(crate) created: AtomicU32,
    pub(crate) live_scopes: Mutex<Vec<Arc<AtomicUsize>>>,
    pub(crate) ledger: Arc<ScopeLedger>,
}

impl ListenerFactory {
    pub(crate) fn new(listeners: Vec<Arc<dyn TenantEvents>>) -> Self {
        Self::per_tenant(move |_| listeners.clone())
    }

    /// Builds each tenant's listeners from its settings.
    pub(crate) fn per_tenant<F>(listeners: F) -> Self
    where
        F: Fn(&TenantSettings) -> Vec<Arc<dyn TenantEvents>> + Send + Sync + 'static,
    {
        Self {
            listeners: Box::new(listeners),
            created: AtomicU32::new(0),
            live_scopes: Mutex::new(Vec::new()),
            ledger: Arc::new(ScopeLedger::default()),
        }
    }

    /// Scopes currently alive across every shell built by this factory.
    pub(crate) fn live_scope_total(&self) -> usize {
        self.live_scopes
            .lock()
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl ShellFactory for ListenerFactory {
    async fn create(&self, settings: &TenantSettings) -> anyhow::Result<Arc<dyn ShellContainer>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let services = (self.listeners)(settings)
            .iter()
            .fold(ShellServices::builder(), |b, l| b.listener(Arc::clone(l)))
            .build();
        self.live_scopes.lock().push(services.live_scope_counter());
        Ok(Arc::new(CountingContainer {
            inner: Arc::new(services),
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

/// Counts scopes opened and `release` calls, across all shells.
///
/// Unlike the live-scope gauge this notices a scope released twice.
#[derive(Debug, Default)]
pub(crate) struct ScopeLedger {
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl ScopeLedger {
    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct CountingContainer {
    inner: Arc<ShellServices>,
    ledger: Arc<ScopeLedger>,
}

impl ShellContainer for CountingContainer {
    fn create_scope(&self) -> anyhow::Result<Arc<dyn ServiceScope>> {
        let inner = self.inner.create_scope()?;
        self.ledger.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingScope {
            inner,
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

struct CountingScope {
    inner: Arc<dyn ServiceScope>,
    ledger: Arc<ScopeLedger>,
}

impl ServiceScope for CountingScope {
    fn get_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.get_any(type_id)
    }

    fn tenant_events(&self) -> Vec<Arc<dyn TenantEvents>> {
        self.inner.tenant_events()
    }

    fn release(&self) {
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release();
    }
}
