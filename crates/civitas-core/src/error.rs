//! Error types for Civitas

/// Result type alias using Civitas' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Civitas operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Classifier loading or inference errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Failures talking to an upstream HTTP service
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Record store errors
    #[error("store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a new store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
