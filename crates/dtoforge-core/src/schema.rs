use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::types::{EnumType, FieldType};

/// Top-level manifest describing the DTO types available for generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TypeManifest {
    /// Contract version for this manifest format.
    #[serde(default = "default_manifest_version")]
    pub manifest_version: String,
    /// DTO types in any order; parents are referenced by name.
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
    /// Enum types referenced by `enum` fields.
    #[serde(default)]
    pub enums: Vec<EnumType>,
}

fn default_manifest_version() -> String {
    crate::MANIFEST_VERSION.to_string()
}

/// A DTO type: ordered fields plus an optional parent type whose fields
/// come first.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// Identity of one declared field and its raw rule metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Final fields are never generated into.
    #[serde(default)]
    pub is_final: bool,
    /// Declarative rule metadata in declaration order.
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_final: false,
            rules: Vec::new(),
        }
    }

    pub fn final_field(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn rule(mut self, rule: RuleDecl) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Which part of a field a rule declaration applies to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    /// The field value itself.
    #[default]
    Field,
    /// Each element of a list, set or array field.
    Element,
    /// Each key of a map field.
    Key,
    /// Each value of a map field.
    Value,
}

impl RuleTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleTarget::Field => "field",
            RuleTarget::Element => "element",
            RuleTarget::Key => "key",
            RuleTarget::Value => "value",
        }
    }
}

/// One parsed unit of declarative metadata attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleDecl {
    /// Rule tag, e.g. `text`, `list`, `nested`, `custom`.
    pub tag: String,
    #[serde(default)]
    pub target: RuleTarget,
    /// Group tag; `None` means the implicit default group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
}

impl RuleDecl {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            target: RuleTarget::Field,
            group: None,
            attributes: Map::new(),
        }
    }

    pub fn target(mut self, target: RuleTarget) -> Self {
        self.target = target;
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or(crate::DEFAULT_GROUP)
    }
}
