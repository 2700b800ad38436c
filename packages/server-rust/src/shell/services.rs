//! Type-keyed service container used as a shell's default `ShellContainer`.
//!
//! Two lifetimes are supported:
//! - **Singletons**: one instance shared by every request of the shell
//! - **Scoped**: built lazily per request scope, dropped on release. The
//!   factory receives the scope and may resolve other services from it.
//!
//! The container also carries the tenant's lifecycle listeners, which the
//! activation gate resolves through the request scope.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shellgate_core::{ServiceScope, ShellContainer, TenantEvents};

type Instance = Arc<dyn Any + Send + Sync>;
type ScopedFactory = Arc<dyn Fn(&dyn ServiceScope) -> Instance + Send + Sync>;

struct Registrations {
    singletons: HashMap<TypeId, Instance>,
    scoped: HashMap<TypeId, ScopedFactory>,
    events: Vec<Arc<dyn TenantEvents>>,
}

// ---------------------------------------------------------------------------
// ShellServicesBuilder
// ---------------------------------------------------------------------------

/// Collects service registrations for one shell.
pub struct ShellServicesBuilder {
    singletons: HashMap<TypeId, Instance>,
    scoped: HashMap<TypeId, ScopedFactory>,
    events: Vec<Arc<dyn TenantEvents>>,
}

impl ShellServicesBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            singletons: HashMap::new(),
            scoped: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Registers a shell-wide instance. Replaces an earlier registration of `T`.
    #[must_use]
    pub fn singleton<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.singletons.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Registers a per-request factory. Takes precedence over a singleton of `T`.
    ///
    /// The factory runs outside the scope's lock, so it may look up other
    /// services from the scope it is given. It must not resolve `T` itself.
    #[must_use]
    pub fn scoped<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn ServiceScope) -> T + Send + Sync + 'static,
    {
        let erased: ScopedFactory =
            Arc::new(move |scope: &dyn ServiceScope| Arc::new(factory(scope)) as Instance);
        self.scoped.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Adds a lifecycle listener notified when the shell activates.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn TenantEvents>) -> Self {
        self.events.push(listener);
        self
    }

    #[must_use]
    pub fn build(self) -> ShellServices {
        ShellServices {
            registrations: Arc::new(Registrations {
                singletons: self.singletons,
                scoped: self.scoped,
                events: self.events,
            }),
            live_scopes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for ShellServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ShellServices
// ---------------------------------------------------------------------------

/// A shell's service container.
pub struct ShellServices {
    registrations: Arc<Registrations>,
    live_scopes: Arc<AtomicUsize>,
}

impl ShellServices {
    #[must_use]
    pub fn builder() -> ShellServicesBuilder {
        ShellServicesBuilder::new()
    }

    /// Number of scopes created and not yet released.
    #[must_use]
    pub fn live_scopes(&self) -> usize {
        self.live_scopes.load(Ordering::SeqCst)
    }

    /// Shared handle on the live-scope counter, readable after the container
    /// has been handed to a shell.
    #[must_use]
    pub fn live_scope_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_scopes)
    }
}

impl ShellContainer for ShellServices {
    fn create_scope(&self) -> anyhow::Result<Arc<dyn ServiceScope>> {
        self.live_scopes.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScopedServices {
            registrations: Arc::clone(&self.registrations),
            instances: Mutex::new(Some(HashMap::new())),
            live_scopes: Arc::clone(&self.live_scopes),
        }))
    }
}

// ---------------------------------------------------------------------------
// ScopedServices
// ---------------------------------------------------------------------------

/// One request's view of a `ShellServices` container.
///
/// `instances` is `None` once released; lookups then return `None`.
///
/// Two racing first lookups of a scoped type may both run its factory; the
/// first instance stored wins and both callers receive it.
struct ScopedServices {
    registrations: Arc<Registrations>,
    instances: Mutex<Option<HashMap<TypeId, Instance>>>,
    live_scopes: Arc<AtomicUsize>,
}

impl ServiceScope for ScopedServices {
    fn get_any(&self, type_id: TypeId) -> Option<Instance> {
        {
            let guard = self.instances.lock();
            let instances = guard.as_ref()?;
            if let Some(instance) = instances.get(&type_id) {
                return Some(Arc::clone(instance));
            }
        }

        let Some(factory) = self.registrations.scoped.get(&type_id) else {
            return self.registrations.singletons.get(&type_id).cloned();
        };

        let built = factory(self as &dyn ServiceScope);
        let mut guard = self.instances.lock();
        let instances = guard.as_mut()?;
        Some(Arc::clone(instances.entry(type_id).or_insert(built)))
    }

    fn tenant_events(&self) -> Vec<Arc<dyn TenantEvents>> {
        self.registrations.events.clone()
    }

    fn release(&self) {
        if self.instances.lock().take().is_some() {
            self.live_scopes.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
