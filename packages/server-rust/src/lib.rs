//! Shellgate Server -- multi-tenant request dispatch with lazy, exactly-once
//! shell activation.

pub mod config;
pub mod dispatch;
pub mod host;
pub mod shell;
pub mod tenant;

#[cfg(test)]
mod testing;

pub use config::GateConfig;
pub use dispatch::{
    build_dispatch_pipeline, Dispatch, DispatchError, HttpDispatchService, TenantContainerLayer,
};
pub use host::ShellHost;
pub use shell::{ActivationError, ActivationGate, ShellContext, ShellRegistry, ShellServices};
pub use tenant::{JsonSettingsSource, RunningShellTable, StaticSettingsSource, TenantMatcher};
