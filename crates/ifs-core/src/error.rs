//! Error types for the IFS engine

use thiserror::Error;

/// Main error type for IFS operations.
///
/// Search itself never fails: infeasible moves and exhausted budgets are
/// reported as "no neighbour". Errors are reserved for setup problems.
#[derive(Debug, Error)]
pub enum IfsError {
    /// Malformed model construction
    #[error("Model error: {0}")]
    Model(String),

    /// Unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid operation for the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for IFS operations
pub type Result<T> = std::result::Result<T, IfsError>;
