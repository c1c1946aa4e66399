use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Leaf value kinds a field can declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Char,
    Text,
    Date,
    Timestamp,
    Uuid,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Char => "char",
            ScalarKind::Text => "text",
            ScalarKind::Date => "date",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Uuid => "uuid",
        }
    }

    /// Kinds that have a zero value and therefore a non-nullable flavour.
    pub fn has_primitive_form(&self) -> bool {
        matches!(
            self,
            ScalarKind::Bool | ScalarKind::Int | ScalarKind::Float | ScalarKind::Char
        )
    }
}

/// Declared type of a field as seen by the reflection layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    /// Scalar leaf. `nullable = false` on a kind with a zero value is the
    /// primitive flavour: it can never hold null.
    Scalar {
        scalar: ScalarKind,
        #[serde(default = "default_nullable")]
        nullable: bool,
    },
    /// Reference to an [`EnumType`] by name.
    Enum { name: String },
    List { element: Box<FieldType> },
    Set { element: Box<FieldType> },
    Array { element: Box<FieldType> },
    Map {
        key: Box<FieldType>,
        value: Box<FieldType>,
    },
    /// Reference to a [`crate::TypeDescriptor`] by name.
    Object { name: String },
}

fn default_nullable() -> bool {
    true
}

impl FieldType {
    pub fn scalar(kind: ScalarKind) -> Self {
        FieldType::Scalar {
            scalar: kind,
            nullable: true,
        }
    }

    pub fn primitive(kind: ScalarKind) -> Self {
        FieldType::Scalar {
            scalar: kind,
            nullable: false,
        }
    }

    pub fn list(element: FieldType) -> Self {
        FieldType::List {
            element: Box::new(element),
        }
    }

    pub fn set(element: FieldType) -> Self {
        FieldType::Set {
            element: Box::new(element),
        }
    }

    pub fn array(element: FieldType) -> Self {
        FieldType::Array {
            element: Box::new(element),
        }
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        FieldType::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        FieldType::Object { name: name.into() }
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        FieldType::Enum { name: name.into() }
    }

    /// True for the non-nullable scalar flavour (`int`, `bool`, ...).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldType::Scalar { scalar, nullable: false } if scalar.has_primitive_form()
        )
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            FieldType::List { .. } | FieldType::Set { .. } | FieldType::Array { .. }
        )
    }

    pub fn is_container(&self) -> bool {
        self.is_collection() || matches!(self, FieldType::Map { .. })
    }

    pub fn element(&self) -> Option<&FieldType> {
        match self {
            FieldType::List { element }
            | FieldType::Set { element }
            | FieldType::Array { element } => Some(element),
            _ => None,
        }
    }

    pub fn map_parts(&self) -> Option<(&FieldType, &FieldType)> {
        match self {
            FieldType::Map { key, value } => Some((key, value)),
            _ => None,
        }
    }

    pub fn object_name(&self) -> Option<&str> {
        match self {
            FieldType::Object { name } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Stable key used to address per-type configuration and overrides.
    ///
    /// Primitive scalars render bare (`int`), nullable ones carry a `?`
    /// suffix (`int?`), containers render their element types
    /// (`list<text?>`), objects and enums render their declared name.
    pub fn type_key(&self) -> String {
        match self {
            FieldType::Scalar { scalar, nullable } => {
                if *nullable && scalar.has_primitive_form() {
                    format!("{}?", scalar.as_str())
                } else {
                    scalar.as_str().to_string()
                }
            }
            FieldType::Enum { name } | FieldType::Object { name } => name.clone(),
            FieldType::List { element } => format!("list<{}>", element.type_key()),
            FieldType::Set { element } => format!("set<{}>", element.type_key()),
            FieldType::Array { element } => format!("array<{}>", element.type_key()),
            FieldType::Map { key, value } => {
                format!("map<{},{}>", key.type_key(), value.type_key())
            }
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_key())
    }
}

/// Named enumeration with its labels in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct EnumType {
    pub name: String,
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_keys_distinguish_primitive_and_boxed() {
        assert_eq!(FieldType::primitive(ScalarKind::Int).type_key(), "int");
        assert_eq!(FieldType::scalar(ScalarKind::Int).type_key(), "int?");
        assert_eq!(FieldType::scalar(ScalarKind::Text).type_key(), "text");
        assert_eq!(
            FieldType::map(
                FieldType::scalar(ScalarKind::Text),
                FieldType::list(FieldType::object("Item"))
            )
            .type_key(),
            "map<text,list<Item>>"
        );
    }

    #[test]
    fn text_is_never_primitive() {
        assert!(!FieldType::primitive(ScalarKind::Text).is_primitive());
        assert!(FieldType::primitive(ScalarKind::Bool).is_primitive());
    }

    #[test]
    fn scalar_nullable_defaults_to_true_when_deserialized() {
        let field_type: FieldType =
            serde_json::from_str(r#"{"kind":"scalar","scalar":"int"}"#).expect("parse type");
        assert_eq!(field_type, FieldType::scalar(ScalarKind::Int));
    }
}
