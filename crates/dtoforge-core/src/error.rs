use thiserror::Error;

/// Core error type shared across dtoforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest or registry violates internal invariants.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    /// A type name was referenced but never registered.
    #[error("unknown type: {0}")]
    UnknownType(String),
    /// JSON Schema compilation or validation failure.
    #[error("schema error: {0}")]
    Schema(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results returned by dtoforge crates.
pub type Result<T> = std::result::Result<T, Error>;
