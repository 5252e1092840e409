//! Error types for grace-nn.

use thiserror::Error;

/// grace-nn error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Graph construction or augmentation error.
    #[error("graph error: {0}")]
    Graph(#[from] grace_core::Error),

    /// IO error (checkpoints, embedding export).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config sidecar (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
