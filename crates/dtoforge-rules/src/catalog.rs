use std::collections::BTreeMap;
use std::fmt;

use dtoforge_core::{FieldType, ScalarKind};
use serde::{Deserialize, Serialize};

/// Category a rule declaration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Basic,
    Collection,
    Map,
    Nested,
    Custom,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Basic => "basic",
            RuleCategory::Collection => "collection",
            RuleCategory::Map => "map",
            RuleCategory::Nested => "nested",
            RuleCategory::Custom => "custom",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, RuleCategory::Collection | RuleCategory::Map)
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared field types a rule tag may be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    Any,
    Scalar(Vec<ScalarKind>),
    Enum,
    Object,
    List,
    Set,
    Array,
    Map,
    AnyOf(Vec<TypeMatcher>),
}

impl TypeMatcher {
    pub fn matches(&self, field_type: &FieldType) -> bool {
        match self {
            TypeMatcher::Any => true,
            TypeMatcher::Scalar(kinds) => matches!(
                field_type,
                FieldType::Scalar { scalar, .. } if kinds.contains(scalar)
            ),
            TypeMatcher::Enum => matches!(field_type, FieldType::Enum { .. }),
            TypeMatcher::Object => matches!(field_type, FieldType::Object { .. }),
            TypeMatcher::List => matches!(field_type, FieldType::List { .. }),
            TypeMatcher::Set => matches!(field_type, FieldType::Set { .. }),
            TypeMatcher::Array => matches!(field_type, FieldType::Array { .. }),
            TypeMatcher::Map => matches!(field_type, FieldType::Map { .. }),
            TypeMatcher::AnyOf(matchers) => {
                matchers.iter().any(|matcher| matcher.matches(field_type))
            }
        }
    }
}

/// Catalog entry for one rule tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub tag: String,
    pub category: RuleCategory,
    pub accepts: TypeMatcher,
}

/// Registry mapping rule tags to their category and accepted field types.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    specs: BTreeMap<String, RuleSpec>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleCatalog {
    /// Empty catalog; most callers want [`RuleCatalog::builtin`].
    pub fn empty() -> Self {
        Self {
            specs: BTreeMap::new(),
        }
    }

    /// Catalog with every built-in tag registered.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        let basic = [
            ("bool", TypeMatcher::Scalar(vec![ScalarKind::Bool])),
            ("int", TypeMatcher::Scalar(vec![ScalarKind::Int])),
            ("float", TypeMatcher::Scalar(vec![ScalarKind::Float])),
            ("char", TypeMatcher::Scalar(vec![ScalarKind::Char])),
            ("text", TypeMatcher::Scalar(vec![ScalarKind::Text])),
            ("date", TypeMatcher::Scalar(vec![ScalarKind::Date])),
            ("timestamp", TypeMatcher::Scalar(vec![ScalarKind::Timestamp])),
            (
                "uuid",
                TypeMatcher::Scalar(vec![ScalarKind::Uuid, ScalarKind::Text]),
            ),
            (
                "enum",
                TypeMatcher::AnyOf(vec![
                    TypeMatcher::Enum,
                    TypeMatcher::Scalar(vec![ScalarKind::Text]),
                ]),
            ),
        ];
        for (tag, accepts) in basic {
            catalog.insert(tag, RuleCategory::Basic, accepts);
        }
        catalog.insert("list", RuleCategory::Collection, TypeMatcher::List);
        catalog.insert("set", RuleCategory::Collection, TypeMatcher::Set);
        catalog.insert("array", RuleCategory::Collection, TypeMatcher::Array);
        catalog.insert("map", RuleCategory::Map, TypeMatcher::Map);
        catalog.insert("nested", RuleCategory::Nested, TypeMatcher::Object);
        catalog.insert("custom", RuleCategory::Custom, TypeMatcher::Any);
        catalog
    }

    fn insert(&mut self, tag: &str, category: RuleCategory, accepts: TypeMatcher) {
        self.specs.insert(
            tag.to_string(),
            RuleSpec {
                tag: tag.to_string(),
                category,
                accepts,
            },
        );
    }

    /// Register an additional tag. Returns `false` when the tag is taken.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        category: RuleCategory,
        accepts: TypeMatcher,
    ) -> bool {
        let tag = tag.into();
        if self.specs.contains_key(&tag) {
            return false;
        }
        self.insert(&tag, category, accepts);
        true
    }

    pub fn get(&self, tag: &str) -> Option<&RuleSpec> {
        self.specs.get(tag)
    }

    pub fn category(&self, tag: &str) -> Option<RuleCategory> {
        self.specs.get(tag).map(|spec| spec.category)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
}
