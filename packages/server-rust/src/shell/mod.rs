//! Tenant shells: construction, activation, and request scopes.
//!
//! 1. **Registry** (`registry`): tenant id -> `ShellContext`, built at most once
//! 2. **Context** (`context`): per-shell activation flag and gate
//! 3. **Activation** (`activation`): double-checked exactly-once activation
//! 4. **Scope** (`scope`): RAII release of request-scoped containers
//! 5. **Services** (`services`): default type-keyed `ShellContainer`

pub mod activation;
pub mod context;
pub mod registry;
pub mod scope;
pub mod services;

pub use activation::{ActivationError, ActivationGate, ActivationOutcome, ListenerFailure};
pub use context::{ActivationPhase, ShellContext};
pub use registry::{ShellRegistry, ShellState, ShellStatus};
pub use scope::ScopeGuard;
pub use services::{ShellServices, ShellServicesBuilder};
