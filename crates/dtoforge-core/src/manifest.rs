use std::path::Path;

use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::schema::TypeManifest;

/// JSON Schema for the type manifest contract.
pub fn manifest_json_schema() -> JsonValue {
    let schema = schema_for!(TypeManifest);
    serde_json::to_value(&schema).unwrap_or(JsonValue::Null)
}

/// Validate a manifest document against [`manifest_json_schema`].
///
/// Returns every schema violation as `path: message`.
pub fn validate_manifest_json(manifest: &JsonValue) -> Result<Vec<String>> {
    let schema = manifest_json_schema();
    let compiled = JSONSchema::compile(&schema).map_err(|err| Error::Schema(err.to_string()))?;

    let mut violations = Vec::new();
    if let Err(errors) = compiled.validate(manifest) {
        for error in errors {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            violations.push(format!("{path}: {error}"));
        }
    }
    Ok(violations)
}

/// Parse, schema-check and consistency-check a manifest document.
pub fn load_manifest_str(contents: &str) -> Result<TypeRegistry> {
    let json: JsonValue = serde_json::from_str(contents)?;
    let violations = validate_manifest_json(&json)?;
    if !violations.is_empty() {
        return Err(Error::Schema(violations.join("; ")));
    }
    let manifest: TypeManifest = serde_json::from_value(json)?;
    if manifest.manifest_version != crate::MANIFEST_VERSION {
        return Err(Error::InvalidManifest(format!(
            "unsupported manifest_version '{}' (expected '{}')",
            manifest.manifest_version,
            crate::MANIFEST_VERSION
        )));
    }
    TypeRegistry::from_manifest(manifest)
}

pub fn load_manifest_file(path: &Path) -> Result<TypeRegistry> {
    let contents = std::fs::read_to_string(path)?;
    load_manifest_str(&contents)
}
