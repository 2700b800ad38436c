//! Tenant identity and settings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum length of a tenant identifier.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Error returned when a string is not a valid tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tenant id {id:?}: {reason}")]
pub struct InvalidTenantId {
    pub id: String,
    pub reason: &'static str,
}

/// Stable key naming a tenant. Immutable once constructed.
///
/// Accepts ASCII alphanumerics, `-` and `_`, up to [`MAX_TENANT_ID_LEN`] chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validates and wraps a tenant identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTenantId`] if `id` is empty, too long, or contains
    /// characters other than ASCII alphanumerics, `-` and `_`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidTenantId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidTenantId { id, reason: "empty" });
        }
        if id.len() > MAX_TENANT_ID_LEN {
            return Err(InvalidTenantId {
                id,
                reason: "too long",
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(InvalidTenantId {
                id,
                reason: "unsupported character",
            });
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = InvalidTenantId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Lifecycle state of a tenant as recorded in its settings.
///
/// Only `Running` tenants are routable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantState {
    /// Declared but never set up.
    #[default]
    Uninitialized,
    /// Setup in progress.
    Initializing,
    /// Serving requests.
    Running,
    /// Administratively switched off.
    Disabled,
    /// Settings could not be applied.
    Invalid,
}

impl TenantState {
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Per-tenant configuration used for request matching and shell construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Unique tenant name.
    pub name: TenantId,
    #[serde(default)]
    pub state: TenantState,
    /// Comma-separated host names this tenant answers on. `None` matches any host.
    #[serde(default)]
    pub request_url_host: Option<String>,
    /// First path segment this tenant is mounted under. `None` mounts at the root.
    #[serde(default)]
    pub request_url_prefix: Option<String>,
    /// Free-form properties passed through to the shell factory.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl TenantSettings {
    /// Creates settings for a running tenant with no host or prefix binding.
    #[must_use]
    pub fn running(name: TenantId) -> Self {
        Self {
            name,
            state: TenantState::Running,
            request_url_host: None,
            request_url_prefix: None,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.request_url_host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request_url_prefix = Some(prefix.into());
        self
    }

    /// Returns the configured host names, trimmed and lowercased.
    ///
    /// Empty entries are skipped, so `None`, `""` and `" , "` all yield no hosts.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        self.request_url_host
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }

    /// Returns the path prefix without surrounding slashes, lowercased.
    #[must_use]
    pub fn prefix(&self) -> Option<String> {
        self.request_url_prefix
            .as_deref()
            .map(|p| p.trim().trim_matches('/').to_ascii_lowercase())
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn id(s: &str) -> TenantId {
        TenantId::new(s).unwrap()
    }

    #[test]
    fn tenant_id_accepts_simple_names() {
        assert_eq!(id("acme-corp_2").as_str(), "acme-corp_2");
    }

    #[test]
    fn tenant_id_rejects_empty_and_bad_chars() {
        assert_eq!(TenantId::new("").unwrap_err().reason, "empty");
        assert_eq!(
            TenantId::new("a/b").unwrap_err().reason,
            "unsupported character"
        );
        assert_eq!(
            TenantId::new("x".repeat(MAX_TENANT_ID_LEN + 1))
                .unwrap_err()
                .reason,
            "too long"
        );
    }

    #[test]
    fn hosts_split_trim_and_lowercase() {
        let settings = TenantSettings::running(id("t1")).with_host(" A.example.com, ,b.example.com");
        assert_eq!(settings.hosts(), vec!["a.example.com", "b.example.com"]);
        assert!(TenantSettings::running(id("t2")).hosts().is_empty());
    }

    #[test]
    fn prefix_strips_slashes() {
        let settings = TenantSettings::running(id("t1")).with_prefix("/Blog/");
        assert_eq!(settings.prefix().as_deref(), Some("blog"));
        let empty = TenantSettings::running(id("t1")).with_prefix("/");
        assert!(empty.prefix().is_none());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let json = r#"{"name":"shop","state":"running","request_url_prefix":"shop"}"#;
        let settings: TenantSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.name, id("shop"));
        assert!(settings.state.is_running());
        assert!(settings.request_url_host.is_none());
        assert!(settings.properties.is_empty());
    }

    #[test]
    fn settings_reject_invalid_name() {
        let json = r#"{"name":"bad name"}"#;
        assert!(serde_json::from_str::<TenantSettings>(json).is_err());
    }

    proptest! {
        #[test]
        fn ids_with_separator_are_rejected(
            head in "[a-z0-9]{0,10}",
            sep in "[/ .:?#]",
            tail in "[a-z0-9]{0,10}",
        ) {
            let raw = format!("{head}{sep}{tail}");
            prop_assert!(TenantId::new(raw).is_err());
        }
    }
}
