//! Request -> tenant matching by host name and first path segment.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::HOST;
use http::{HeaderMap, Uri};
use parking_lot::RwLock;
use shellgate_core::{TenantId, TenantSettings};
use tracing::debug;

/// Maps a request to the settings of the tenant that owns it.
pub trait TenantMatcher: Send + Sync {
    /// Returns `None` when no tenant serves the request.
    fn match_tenant(&self, uri: &Uri, headers: &HeaderMap) -> Option<Arc<TenantSettings>>;
}

/// Table of running tenants keyed by `host/prefix`.
///
/// Lookup order for host `h` and first path segment `p`:
/// 1. `h/p` -- tenant bound to both host and prefix
/// 2. `h/` -- tenant bound to host only
/// 3. `/p` -- tenant bound to prefix only
/// 4. `/` -- fallback tenant with neither binding
#[derive(Debug, Default)]
pub struct RunningShellTable {
    entries: RwLock<HashMap<String, Arc<TenantSettings>>>,
}

impl RunningShellTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tenant under every `host/prefix` key it declares.
    ///
    /// Returns `false` (and adds nothing) when the tenant is not `Running`.
    /// A later tenant claiming an existing key replaces the earlier one.
    pub fn add(&self, settings: Arc<TenantSettings>) -> bool {
        if !settings.state.is_running() {
            debug!(tenant = %settings.name, state = ?settings.state, "skipping non-running tenant");
            return false;
        }

        let prefix = settings.prefix().unwrap_or_default();
        let mut hosts = settings.hosts();
        if hosts.is_empty() {
            hosts.push(String::new());
        }

        let mut entries = self.entries.write();
        for host in hosts {
            let key = entry_key(&host, &prefix);
            if let Some(previous) = entries.insert(key.clone(), Arc::clone(&settings)) {
                if previous.name != settings.name {
                    debug!(key = %key, replaced = %previous.name, tenant = %settings.name, "tenant key reassigned");
                }
            }
        }
        true
    }

    /// Removes every key owned by `tenant`. Returns the number removed.
    pub fn remove(&self, tenant: &TenantId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, settings| &settings.name != tenant);
        before - entries.len()
    }

    /// Number of `host/prefix` keys in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Matches a host (port allowed) and request path.
    #[must_use]
    pub fn match_host_path(&self, host: Option<&str>, path: &str) -> Option<Arc<TenantSettings>> {
        let host = host.map(normalize_host).unwrap_or_default();
        let segment = first_segment(path);

        let entries = self.entries.read();
        let candidates = [
            entry_key(&host, &segment),
            entry_key(&host, ""),
            entry_key("", &segment),
            entry_key("", ""),
        ];
        candidates.iter().find_map(|key| entries.get(key).cloned())
    }
}

impl TenantMatcher for RunningShellTable {
    fn match_tenant(&self, uri: &Uri, headers: &HeaderMap) -> Option<Arc<TenantSettings>> {
        let host = uri
            .host()
            .or_else(|| headers.get(HOST).and_then(|v| v.to_str().ok()));
        self.match_host_path(host, uri.path())
    }
}

fn entry_key(host: &str, prefix: &str) -> String {
    format!("{host}/{prefix}")
}

/// Lowercases and strips the port, keeping bracketed IPv6 literals intact.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if host.starts_with('[') {
        host.find(']').map_or(host, |end| &host[..=end])
    } else {
        host.split(':').next().unwrap_or_default()
    };
    without_port.to_ascii_lowercase()
}

fn first_segment(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
