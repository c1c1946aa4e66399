use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dtoforge_rules::ValidationReport;

/// Error returned by user-supplied custom generators.
pub type CustomError = Box<dyn std::error::Error + Send + Sync>;

/// Errors emitted while configuring, composing or running generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Ambiguous or conflicting rule metadata anywhere in the object graph.
    #[error("{0}")]
    Structural(ValidationReport),
    /// A key was registered twice, or a value re-set to something different.
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("custom generator '{0}' is not registered")]
    UnknownCustomGenerator(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("collection at '{path}' reached {reached} of {target} elements after {attempts} attempts")]
    SizeUnreachable {
        path: String,
        target: usize,
        reached: usize,
        attempts: u32,
    },
    #[error("type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("custom generator failed at '{path}': {source}")]
    Custom {
        path: String,
        #[source]
        source: CustomError,
    },
    #[error("generation failed at '{path}': {message}")]
    Runtime { path: String, message: String },
    #[error("{0}")]
    Failed(FailureReport),
    #[error("core error: {0}")]
    Core(#[from] dtoforge_core::Error),
}

/// One field whose generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub path: String,
    pub message: String,
}

/// Every field failure of one instance, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub type_name: String,
    pub failures: Vec<FieldFailure>,
}

impl FailureReport {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, path: impl Into<String>, error: &GenerationError) {
        self.failures.push(FieldFailure {
            path: path.into(),
            message: error.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation of {} failed for {} field(s)",
            self.type_name,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.path, failure.message)?;
        }
        Ok(())
    }
}
