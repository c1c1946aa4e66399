use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::GenerationError;
use crate::generators::{Generator, GeneratorBuilder};

/// A user-registered replacement: a ready generator, or a builder that is
/// fed the merged configuration of the field it replaces.
#[derive(Clone)]
pub enum GeneratorOrBuilder {
    Generator(Arc<dyn Generator>),
    Builder(Arc<dyn GeneratorBuilder>),
}

impl GeneratorOrBuilder {
    pub fn generator(generator: impl Generator + 'static) -> Self {
        GeneratorOrBuilder::Generator(Arc::new(generator))
    }

    pub fn builder(builder: impl GeneratorBuilder + 'static) -> Self {
        GeneratorOrBuilder::Builder(Arc::new(builder))
    }
}

impl fmt::Debug for GeneratorOrBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorOrBuilder::Generator(generator) => {
                write!(f, "Generator({})", generator.id())
            }
            GeneratorOrBuilder::Builder(_) => f.write_str("Builder"),
        }
    }
}

/// Where a resolved override came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSource {
    Path,
    RuleTag,
    Type,
}

impl OverrideSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideSource::Path => "path",
            OverrideSource::RuleTag => "rule_tag",
            OverrideSource::Type => "type",
        }
    }
}

/// Overrides keyed by field path, by declared type key and by rule tag.
/// Each key takes at most one entry; registering it again is a conflict.
#[derive(Debug, Clone, Default)]
pub struct OverrideRegistry {
    by_path: BTreeMap<String, GeneratorOrBuilder>,
    by_type: BTreeMap<String, GeneratorOrBuilder>,
    by_rule: BTreeMap<String, GeneratorOrBuilder>,
}

fn insert_unique(
    map: &mut BTreeMap<String, GeneratorOrBuilder>,
    kind: &str,
    key: String,
    entry: GeneratorOrBuilder,
) -> Result<(), GenerationError> {
    if map.contains_key(&key) {
        return Err(GenerationError::ConfigurationConflict(format!(
            "an override for {kind} '{key}' is already registered"
        )));
    }
    map.insert(key, entry);
    Ok(())
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_path(
        &mut self,
        path: impl Into<String>,
        entry: GeneratorOrBuilder,
    ) -> Result<(), GenerationError> {
        insert_unique(&mut self.by_path, "path", path.into(), entry)
    }

    pub fn register_type(
        &mut self,
        type_key: impl Into<String>,
        entry: GeneratorOrBuilder,
    ) -> Result<(), GenerationError> {
        insert_unique(&mut self.by_type, "type", type_key.into(), entry)
    }

    pub fn register_rule(
        &mut self,
        tag: impl Into<String>,
        entry: GeneratorOrBuilder,
    ) -> Result<(), GenerationError> {
        insert_unique(&mut self.by_rule, "rule tag", tag.into(), entry)
    }

    pub fn for_path(&self, path: &str) -> Option<&GeneratorOrBuilder> {
        self.by_path.get(path)
    }

    pub fn for_type(&self, type_key: &str) -> Option<&GeneratorOrBuilder> {
        self.by_type.get(type_key)
    }

    pub fn for_rule(&self, tag: &str) -> Option<&GeneratorOrBuilder> {
        self.by_rule.get(tag)
    }

    /// Path first, then rule tag, then declared type. Containers can only
    /// be replaced by path, so callers pass neither a tag nor a type key for
    /// them.
    pub fn resolve(
        &self,
        path: &str,
        rule_tag: Option<&str>,
        type_key: Option<&str>,
    ) -> Option<(OverrideSource, &GeneratorOrBuilder)> {
        if let Some(entry) = self.for_path(path) {
            return Some((OverrideSource::Path, entry));
        }
        if let Some(entry) = rule_tag.and_then(|tag| self.for_rule(tag)) {
            return Some((OverrideSource::RuleTag, entry));
        }
        type_key
            .and_then(|key| self.for_type(key))
            .map(|entry| (OverrideSource::Type, entry))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::ConstantGenerator;
    use dtoforge_core::Value;

    fn constant(value: i64) -> GeneratorOrBuilder {
        GeneratorOrBuilder::generator(ConstantGenerator::new(Value::Int(value)))
    }

    #[test]
    fn second_registration_for_same_key_conflicts() {
        let mut registry = OverrideRegistry::new();
        registry.register_path("a.b", constant(1)).expect("first");
        registry.register_type("int", constant(1)).expect("first");
        registry.register_rule("int", constant(1)).expect("first");

        assert!(matches!(
            registry.register_path("a.b", constant(2)),
            Err(GenerationError::ConfigurationConflict(_))
        ));
        assert!(registry.register_type("int", constant(2)).is_err());
        assert!(registry.register_rule("int", constant(2)).is_err());
        assert!(matches!(
            registry.for_path("a.b"),
            Some(GeneratorOrBuilder::Generator(generator)) if generator.id() == "constant"
        ));
    }

    #[test]
    fn path_then_rule_tag_then_type() {
        let mut registry = OverrideRegistry::new();
        registry.register_path("age", constant(1)).expect("path");
        registry.register_rule("int", constant(2)).expect("rule");
        registry.register_type("int", constant(3)).expect("type");

        let (source, _) = registry.resolve("age", Some("int"), Some("int")).expect("override");
        assert_eq!(source, OverrideSource::Path);
        let (source, _) = registry.resolve("height", Some("int"), Some("int")).expect("override");
        assert_eq!(source, OverrideSource::RuleTag);
        let (source, _) = registry.resolve("height", Some("uuid"), Some("int")).expect("override");
        assert_eq!(source, OverrideSource::Type);
        assert!(registry.resolve("height", None, None).is_none());
    }
}
