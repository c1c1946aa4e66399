//! TOML settings file for the `generate` and `check` commands.
//!
//! ```toml
//! groups = ["admin"]
//!
//! [options]
//! count = 10
//! max_depth = 3
//!
//! [global]
//! max = 500
//!
//! [types."int?"]
//! min = 1
//!
//! [fields.email]
//! pattern = "[a-z]{6}@example\\.org"
//!
//! [objects.address]
//! charset = "abcdef"
//!
//! [constants]
//! "address.country" = "PT"
//!
//! [remarks.fields.greeting]
//! name = "Ada"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

use dtoforge_core::{Error as CoreError, FieldType, ScalarKind, TypeRegistry, Value};
use dtoforge_generate::generators::ConstantGenerator;
use dtoforge_generate::params::{parse_attributes, parse_date_value, parse_timestamp_value};
use dtoforge_generate::{
    BuildSession, GenerateOptions, GenerationError, GeneratorOrBuilder, HolderScope,
    PartialConfig, set_global,
};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Generation(#[from] GenerationError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

type AttributeTable = BTreeMap<String, toml::Value>;

/// Remark or param entries by holder scope.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HolderTables<V> {
    pub global: BTreeMap<String, V>,
    pub generators: BTreeMap<String, BTreeMap<String, V>>,
    pub fields: BTreeMap<String, BTreeMap<String, V>>,
}

impl<V> Default for HolderTables<V> {
    fn default() -> Self {
        Self {
            global: BTreeMap::new(),
            generators: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }
}

impl<V> HolderTables<V> {
    fn entries(&self) -> Vec<(HolderScope, &str, &V)> {
        let mut entries: Vec<(HolderScope, &str, &V)> = self
            .global
            .iter()
            .map(|(key, value)| (HolderScope::Global, key.as_str(), value))
            .collect();
        for (name, table) in &self.generators {
            entries.extend(table.iter().map(|(key, value)| {
                (HolderScope::generator(name.clone()), key.as_str(), value)
            }));
        }
        for (path, table) in &self.fields {
            entries.extend(
                table
                    .iter()
                    .map(|(key, value)| (HolderScope::field(path.clone()), key.as_str(), value)),
            );
        }
        entries
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub groups: Vec<String>,
    pub options: Option<GenerateOptions>,
    pub global: AttributeTable,
    pub instance: AttributeTable,
    /// PerDeclaredType scope, keyed by type key (`int`, `int?`, `Address`).
    pub types: BTreeMap<String, AttributeTable>,
    /// PerFieldName scope.
    pub fields: BTreeMap<String, AttributeTable>,
    /// Instance scope of the nested object at a field path.
    pub objects: BTreeMap<String, AttributeTable>,
    /// Constant path overrides.
    pub constants: BTreeMap<String, toml::Value>,
    pub remarks: HolderTables<String>,
    pub params: HolderTables<toml::Value>,
}

impl Settings {
    pub fn load(path: &Path) -> SettingsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> SettingsResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Merge the `[global]` table into the process-wide layer.
    pub fn apply_global(&self) -> SettingsResult<()> {
        let global = attributes(&self.global, "global")?;
        if !global.is_empty() {
            set_global(global)?;
        }
        Ok(())
    }

    /// Configure `session` for generating `root_type`. Options and the
    /// global table are applied separately.
    pub fn apply(&self, session: &mut BuildSession, root_type: &str) -> SettingsResult<()> {
        if !self.groups.is_empty() {
            session.include_groups(self.groups.iter().cloned());
        }
        let instance = attributes(&self.instance, "instance")?;
        if !instance.is_empty() {
            session.configure_instance(instance);
        }
        for (key, table) in &self.types {
            let config = attributes(table, &format!("types.{key}"))?;
            session.configure_type(key.clone(), config);
        }
        for (name, table) in &self.fields {
            let config = attributes(table, &format!("fields.{name}"))?;
            session.configure_field(name.clone(), config);
        }
        for (path, table) in &self.objects {
            let config = attributes(table, &format!("objects.{path}"))?;
            session.scopes_at(path)?.set_instance(config);
        }
        for (path, raw) in &self.constants {
            let field_type = field_type_at(session.registry(), root_type, path)?;
            let value = constant_value(session.registry(), &field_type, raw, path)?;
            debug!(path = %path, value = ?value, "constant override");
            session.override_path(
                path.clone(),
                GeneratorOrBuilder::generator(ConstantGenerator::new(value)),
            )?;
        }
        for (scope, key, value) in self.remarks.entries() {
            session.set_remark(scope, key, value.clone())?;
        }
        for (scope, key, value) in self.params.entries() {
            session.set_param(scope, key, toml_to_json(value))?;
        }
        Ok(())
    }
}

fn attributes(table: &AttributeTable, ctx: &str) -> SettingsResult<PartialConfig> {
    let map: Map<String, JsonValue> = table
        .iter()
        .map(|(key, value)| (key.clone(), toml_to_json(value)))
        .collect();
    Ok(parse_attributes(&map, ctx)?)
}

fn toml_to_json(value: &toml::Value) -> JsonValue {
    match value {
        toml::Value::String(text) => JsonValue::String(text.clone()),
        toml::Value::Integer(number) => JsonValue::from(*number),
        toml::Value::Float(number) => JsonValue::from(*number),
        toml::Value::Boolean(flag) => JsonValue::Bool(*flag),
        toml::Value::Datetime(datetime) => JsonValue::String(datetime.to_string()),
        toml::Value::Array(items) => JsonValue::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .iter()
                .map(|(key, value)| (key.clone(), toml_to_json(value)))
                .collect(),
        ),
    }
}

/// Declared type of the field at `path` below `root_type`.
fn field_type_at(
    registry: &TypeRegistry,
    root_type: &str,
    path: &str,
) -> SettingsResult<FieldType> {
    let mut owner = root_type.to_string();
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let field = registry
            .fields_of(&owner)?
            .into_iter()
            .find(|field| field.name == segment)
            .ok_or_else(|| {
                SettingsError::Invalid(format!(
                    "constant '{path}': {owner} has no field '{segment}'"
                ))
            })?;
        if segments.peek().is_none() {
            return Ok(field.field_type.clone());
        }
        owner = field
            .field_type
            .object_name()
            .ok_or_else(|| {
                SettingsError::Invalid(format!("constant '{path}': '{segment}' is not an object"))
            })?
            .to_string();
    }
    Err(SettingsError::Invalid("constant path is empty".to_string()))
}

fn constant_value(
    registry: &TypeRegistry,
    field_type: &FieldType,
    raw: &toml::Value,
    path: &str,
) -> SettingsResult<Value> {
    let invalid = || SettingsError::Invalid(format!("constant '{path}' does not fit {field_type}"));
    let text = || match raw {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Datetime(datetime) => Some(datetime.to_string()),
        _ => None,
    };

    let value = match field_type {
        FieldType::Scalar { scalar, .. } => match (scalar, raw) {
            (ScalarKind::Bool, toml::Value::Boolean(flag)) => Value::Bool(*flag),
            (ScalarKind::Int, toml::Value::Integer(number)) => Value::Int(*number),
            (ScalarKind::Float, toml::Value::Float(number)) => Value::Float(*number),
            (ScalarKind::Float, toml::Value::Integer(number)) => Value::Float(*number as f64),
            (ScalarKind::Char, toml::Value::String(text)) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(invalid()),
                }
            }
            (ScalarKind::Text, toml::Value::String(text)) => Value::Text(text.clone()),
            (ScalarKind::Uuid, toml::Value::String(text)) => {
                Value::Uuid(uuid::Uuid::parse_str(text).map_err(|_| invalid())?)
            }
            (ScalarKind::Date, _) => Value::Date(
                text()
                    .as_deref()
                    .and_then(parse_date_value)
                    .ok_or_else(invalid)?,
            ),
            (ScalarKind::Timestamp, _) => Value::Timestamp(
                text()
                    .as_deref()
                    .and_then(parse_timestamp_value)
                    .ok_or_else(invalid)?,
            ),
            _ => return Err(invalid()),
        },
        FieldType::Enum { name } => {
            let label = text().ok_or_else(invalid)?;
            let known = registry
                .enum_labels(name)
                .is_some_and(|labels| labels.contains(&label));
            if !known {
                return Err(SettingsError::Invalid(format!(
                    "constant '{path}': '{label}' is not a label of {name}"
                )));
            }
            Value::Text(label)
        }
        _ => {
            return Err(SettingsError::Invalid(format!(
                "constant '{path}': only scalar and enum fields take constants"
            )));
        }
    };
    Ok(value)
}
