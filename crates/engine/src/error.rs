use fleetsim_kernel::ValidationError;

use crate::config::ConfigError;

/// Errors surfaced by [`Engine`](crate::Engine) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A task submission was malformed.
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),
    /// A reconfigure asked for an interval below the minimum.
    #[error("invalid tick interval {ms} ms (minimum {min_ms} ms)")]
    InvalidInterval { ms: u64, min_ms: u64 },
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),
    /// The engine was built outside a tokio runtime.
    #[error("no tokio runtime available to drive the tick scheduler")]
    NoRuntime,
}
