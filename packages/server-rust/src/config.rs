use std::time::Duration;

/// Gate-level configuration for shell activation.
#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    /// Upper bound on each lifecycle listener call during activation.
    /// An elapsed call counts as a failure of its phase. `None` waits indefinitely.
    pub activation_timeout: Option<Duration>,
}

impl GateConfig {
    #[must_use]
    pub fn with_activation_timeout(timeout: Duration) -> Self {
        Self {
            activation_timeout: Some(timeout),
        }
    }
}
