mod artifacts;
mod logging;

pub use artifacts::{RunContext, start_run, write_instances, write_report};
pub use logging::init_logging;

use thiserror::Error;

/// Errors while writing run artifacts.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
}

pub type RunResult<T> = std::result::Result<T, RunError>;
