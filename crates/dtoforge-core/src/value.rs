use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value as JsonValue};

use crate::types::{FieldType, ScalarKind};

/// Dynamic value stored in a [`Record`] field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Text(String),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    /// Insertion-ordered collection without duplicates.
    Set(Vec<Value>),
    /// Insertion-ordered entries with unique keys.
    Map(Vec<(Value, Value)>),
    Object(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Zero value a freshly created instance holds for a field of this type.
    pub fn zero_for(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Scalar {
                scalar,
                nullable: false,
            } => match scalar {
                ScalarKind::Bool => Value::Bool(false),
                ScalarKind::Int => Value::Int(0),
                ScalarKind::Float => Value::Float(0.0),
                ScalarKind::Char => Value::Char('\0'),
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    }

    /// Short name of the variant, used in mismatch diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    /// Whether this value can be stored in a field of `field_type`.
    ///
    /// Null conforms to every non-primitive type. Containers are checked
    /// element by element.
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        if self.is_null() {
            return !field_type.is_primitive();
        }
        match (self, field_type) {
            (Value::Bool(_), FieldType::Scalar { scalar, .. }) => *scalar == ScalarKind::Bool,
            (Value::Int(_), FieldType::Scalar { scalar, .. }) => *scalar == ScalarKind::Int,
            (Value::Float(_), FieldType::Scalar { scalar, .. }) => *scalar == ScalarKind::Float,
            (Value::Char(_), FieldType::Scalar { scalar, .. }) => *scalar == ScalarKind::Char,
            (Value::Text(_), FieldType::Scalar { scalar, .. }) => *scalar == ScalarKind::Text,
            (Value::Text(_), FieldType::Enum { .. }) => true,
            (Value::Uuid(_), FieldType::Scalar { scalar, .. }) => {
                matches!(scalar, ScalarKind::Uuid | ScalarKind::Text)
            }
            (Value::Date(_), FieldType::Scalar { scalar, .. }) => *scalar == ScalarKind::Date,
            (Value::Timestamp(_), FieldType::Scalar { scalar, .. }) => {
                *scalar == ScalarKind::Timestamp
            }
            (Value::List(items), FieldType::List { element })
            | (Value::List(items), FieldType::Array { element })
            | (Value::Set(items), FieldType::Set { element }) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            (Value::Map(entries), FieldType::Map { key, value }) => entries
                .iter()
                .all(|(k, v)| k.conforms_to(key) && v.conforms_to(value)),
            (Value::Object(record), FieldType::Object { name }) => record.type_name == *name,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            Value::Text(value) => Some(value.chars().count()),
            _ => None,
        }
    }

    /// JSON rendering used by the CLI and in test snapshots.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(value) => JsonValue::Bool(*value),
            Value::Int(value) => JsonValue::from(*value),
            Value::Float(value) => JsonValue::from(*value),
            Value::Char(value) => JsonValue::String(value.to_string()),
            Value::Text(value) => JsonValue::String(value.clone()),
            Value::Uuid(value) => JsonValue::String(value.to_string()),
            Value::Date(value) => JsonValue::String(value.format("%Y-%m-%d").to_string()),
            Value::Timestamp(value) => {
                JsonValue::String(value.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::List(items) | Value::Set(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.to_key_string(), value.to_json());
                }
                JsonValue::Object(map)
            }
            Value::Object(record) => record.to_json(),
        }
    }

    fn to_key_string(&self) -> String {
        match self.to_json() {
            JsonValue::String(value) => value,
            other => other.to_string(),
        }
    }
}

/// An instantiated DTO: its type name plus field values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Set a field, appending it when the record does not declare it yet.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Walk a dotted path through nested object fields.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = current.as_record()?.get(segment)?;
        }
        Some(current)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }
}
