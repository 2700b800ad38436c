//! Tenant settings sources read once at host initialization.

use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use shellgate_core::{SettingsSource, TenantSettings};

/// Fixed, in-memory list of tenants.
#[derive(Debug, Clone, Default)]
pub struct StaticSettingsSource {
    tenants: Vec<TenantSettings>,
}

impl StaticSettingsSource {
    #[must_use]
    pub fn new(tenants: Vec<TenantSettings>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl SettingsSource for StaticSettingsSource {
    async fn load(&self) -> anyhow::Result<Vec<TenantSettings>> {
        Ok(self.tenants.clone())
    }
}

/// Reads a JSON array of tenant settings from a file.
#[derive(Debug, Clone)]
pub struct JsonSettingsSource {
    path: PathBuf,
}

impl JsonSettingsSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsSource for JsonSettingsSource {
    async fn load(&self) -> anyhow::Result<Vec<TenantSettings>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading tenant settings from {}", self.path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing tenant settings in {}", self.path.display()))
    }
}
