//! Tenant lookup: settings sources and request matching.

pub mod source;
pub mod table;

pub use source::{JsonSettingsSource, StaticSettingsSource};
pub use table::{RunningShellTable, TenantMatcher};
