//! Shellgate Core -- tenant model and the collaborator traits of the shell gate.

pub mod context;
pub mod tenant;
pub mod traits;

pub use context::{ActivationMarker, RequestServices, TenantContext};
pub use tenant::{InvalidTenantId, TenantId, TenantSettings, TenantState};
pub use traits::{ServiceScope, SettingsSource, ShellContainer, ShellFactory, TenantEvents};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
