use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::FieldFailure;

/// Options for composition and generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Base seed for deterministic runs; random when absent.
    pub seed: Option<u64>,
    /// Number of root instances the engine generates per run.
    pub count: usize,
    /// Maximum nesting depth below the root object.
    pub max_depth: usize,
    /// Attempts a collection or map may waste on duplicate elements before
    /// giving up on its target size.
    pub max_attempts_element: u32,
    /// Fall back to type-driven generators for fields without rules.
    pub generate_all_known_types: bool,
    /// Keep generating remaining fields after a field fails and report all
    /// failures together.
    pub collect_field_errors: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: None,
            count: 1,
            max_depth: 4,
            max_attempts_element: 100,
            generate_all_known_types: false,
            collect_field_errors: false,
        }
    }
}

/// Non-fatal observation made while composing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: String,
    pub code: String,
    pub message: String,
    pub path: String,
}

impl Diagnostic {
    pub fn warning(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            path: path.to_string(),
        }
    }

    pub fn info(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            level: "info".to_string(),
            code: code.to_string(),
            message: message.into(),
            path: path.to_string(),
        }
    }
}

/// Summary of one composition of a root type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositionReport {
    pub root_type: String,
    pub fields_composed: u64,
    pub fields_skipped: u64,
    pub generator_usage: BTreeMap<String, u64>,
    pub override_usage: BTreeMap<String, u64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompositionReport {
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            root_type: root_type.into(),
            ..Self::default()
        }
    }

    pub fn record_generator_usage(&mut self, id: &str) {
        *self.generator_usage.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn record_override(&mut self, source: &str) {
        *self.override_usage.entry(source.to_string()).or_insert(0) += 1;
    }

    pub fn record_composed(&mut self) {
        self.fields_composed += 1;
    }

    pub fn record_skipped(&mut self, diagnostic: Diagnostic) {
        self.fields_skipped += 1;
        self.diagnostics.push(diagnostic);
    }

    pub fn record_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics_with_code<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.iter().filter(move |diagnostic| diagnostic.code == code)
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub root_type: String,
    pub seed: u64,
    pub instances_requested: u64,
    pub instances_generated: u64,
    pub duration_ms: u64,
    pub composition: CompositionReport,
    pub failures: Vec<FieldFailure>,
}

impl GenerationReport {
    pub fn new(run_id: String, root_type: &str, seed: u64, composition: CompositionReport) -> Self {
        Self {
            run_id,
            root_type: root_type.to_string(),
            seed,
            instances_requested: 0,
            instances_generated: 0,
            duration_ms: 0,
            composition,
            failures: Vec::new(),
        }
    }
}
