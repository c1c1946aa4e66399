use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::errors::GenerationError;

/// Free-form string remarks handed to remark-aware custom generators.
pub type RemarkSet = BTreeMap<String, String>;

/// Free-form params handed to param-aware custom generators.
pub type ParamMap = BTreeMap<String, JsonValue>;

/// Address of a remark/param entry. Field entries override generator
/// entries, which override global ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HolderScope {
    Global,
    /// Keyed by custom generator name.
    Generator(String),
    /// Keyed by full dotted field path.
    Field(String),
}

impl HolderScope {
    pub fn generator(name: impl Into<String>) -> Self {
        HolderScope::Generator(name.into())
    }

    pub fn field(path: impl Into<String>) -> Self {
        HolderScope::Field(path.into())
    }

    fn describe(&self) -> String {
        match self {
            HolderScope::Global => "global".to_string(),
            HolderScope::Generator(name) => format!("generator '{name}'"),
            HolderScope::Field(path) => format!("field '{path}'"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemarkAndParamHolder {
    remarks: BTreeMap<HolderScope, RemarkSet>,
    params: BTreeMap<HolderScope, ParamMap>,
}

impl RemarkAndParamHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_remark(
        &mut self,
        scope: HolderScope,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), GenerationError> {
        let (key, value) = (key.into(), value.into());
        let entries = self.remarks.entry(scope.clone()).or_default();
        match entries.get(&key) {
            Some(existing) if *existing != value => Err(GenerationError::ConfigurationConflict(
                format!(
                    "remark '{key}' for {} already set to '{existing}'",
                    scope.describe()
                ),
            )),
            _ => {
                entries.insert(key, value);
                Ok(())
            }
        }
    }

    pub fn set_param(
        &mut self,
        scope: HolderScope,
        key: impl Into<String>,
        value: impl Into<JsonValue>,
    ) -> Result<(), GenerationError> {
        let (key, value) = (key.into(), value.into());
        let entries = self.params.entry(scope.clone()).or_default();
        match entries.get(&key) {
            Some(existing) if *existing != value => Err(GenerationError::ConfigurationConflict(
                format!(
                    "param '{key}' for {} already set to {existing}",
                    scope.describe()
                ),
            )),
            _ => {
                entries.insert(key, value);
                Ok(())
            }
        }
    }

    pub fn remarks_for(&self, path: &str, generator: &str) -> RemarkSet {
        layered(&self.remarks, path, generator)
    }

    pub fn params_for(&self, path: &str, generator: &str) -> ParamMap {
        layered(&self.params, path, generator)
    }

    pub fn is_empty(&self) -> bool {
        self.remarks.is_empty() && self.params.is_empty()
    }
}

fn layered<V: Clone>(
    store: &BTreeMap<HolderScope, BTreeMap<String, V>>,
    path: &str,
    generator: &str,
) -> BTreeMap<String, V> {
    let mut merged = BTreeMap::new();
    let layers = [
        HolderScope::Global,
        HolderScope::generator(generator),
        HolderScope::field(path),
    ];
    for scope in &layers {
        if let Some(entries) = store.get(scope) {
            merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_overrides_generator_overrides_global() {
        let mut holder = RemarkAndParamHolder::new();
        holder.set_remark(HolderScope::Global, "style", "plain").expect("global");
        holder.set_remark(HolderScope::Global, "lang", "en").expect("global");
        holder
            .set_remark(HolderScope::generator("slug"), "style", "kebab")
            .expect("generator");
        holder
            .set_remark(HolderScope::field("user.handle"), "style", "snake")
            .expect("field");

        let remarks = holder.remarks_for("user.handle", "slug");
        assert_eq!(remarks.get("style").map(String::as_str), Some("snake"));
        assert_eq!(remarks.get("lang").map(String::as_str), Some("en"));

        let other = holder.remarks_for("user.name", "slug");
        assert_eq!(other.get("style").map(String::as_str), Some("kebab"));
    }

    #[test]
    fn resetting_same_value_is_allowed() {
        let mut holder = RemarkAndParamHolder::new();
        holder.set_param(HolderScope::Global, "width", 4).expect("first");
        holder.set_param(HolderScope::Global, "width", 4).expect("same value");
        assert_eq!(holder.params_for("x", "g").get("width"), Some(&json!(4)));
    }

    #[test]
    fn resetting_different_value_conflicts() {
        let mut holder = RemarkAndParamHolder::new();
        holder
            .set_remark(HolderScope::field("a"), "mode", "x")
            .expect("first");
        let result = holder.set_remark(HolderScope::field("a"), "mode", "y");
        assert!(matches!(
            result,
            Err(GenerationError::ConfigurationConflict(_))
        ));
        assert_eq!(
            holder.remarks_for("a", "g").get("mode").map(String::as_str),
            Some("x")
        );
    }
}
