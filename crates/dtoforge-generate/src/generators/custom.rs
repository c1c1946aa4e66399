use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dtoforge_core::Value;

use crate::errors::{CustomError, GenerationError};
use crate::generators::{GenerationContext, Generator, ParentView};
use crate::remarks::{ParamMap, RemarkSet};

/// User-supplied generator attached to a field through a `custom` rule.
///
/// Capabilities are opt-in: composition injects params and remarks only
/// into generators that ask for them, and only parent-aware generators see
/// the enclosing instance through [`GenerationContext::parent`].
pub trait CustomGenerator: Send + Sync {
    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError>;

    fn param_aware(&self) -> bool {
        false
    }

    fn remark_aware(&self) -> bool {
        false
    }

    fn parent_aware(&self) -> bool {
        false
    }

    fn set_params(&mut self, _params: ParamMap) {}

    fn set_remarks(&mut self, _remarks: RemarkSet) {}
}

/// Creates a fresh custom generator per composed field.
pub type CustomFactory = Arc<dyn Fn() -> Box<dyn CustomGenerator> + Send + Sync>;

/// Custom generator factories by name.
#[derive(Clone, Default)]
pub struct CustomRegistry {
    factories: BTreeMap<String, CustomFactory>,
}

impl fmt::Debug for CustomRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: CustomFactory,
    ) -> Result<(), GenerationError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(GenerationError::ConfigurationConflict(format!(
                "custom generator '{name}' is already registered"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate `name` and inject whatever it declared itself aware of.
    pub fn instantiate(
        &self,
        name: &str,
        params: ParamMap,
        remarks: RemarkSet,
    ) -> Result<CustomGeneratorAdapter, GenerationError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| GenerationError::UnknownCustomGenerator(name.to_string()))?;
        let mut inner = factory();
        if inner.param_aware() {
            inner.set_params(params);
        }
        if inner.remark_aware() {
            inner.set_remarks(remarks);
        }
        Ok(CustomGeneratorAdapter {
            id: format!("custom.{name}"),
            parent_aware: inner.parent_aware(),
            inner,
        })
    }
}

/// Bridges a [`CustomGenerator`] into the [`Generator`] capability.
pub struct CustomGeneratorAdapter {
    id: String,
    parent_aware: bool,
    inner: Box<dyn CustomGenerator>,
}

impl Generator for CustomGeneratorAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let path = ctx.path;
        let result = if self.parent_aware {
            self.inner.generate(ctx)
        } else {
            let mut scoped = GenerationContext::new(path, &mut *ctx.rng, ParentView::detached());
            self.inner.generate(&mut scoped)
        };
        result.map_err(|source| GenerationError::Custom {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    #[derive(Default)]
    struct Prefixed {
        prefix: String,
    }

    impl CustomGenerator for Prefixed {
        fn generate(&self, _ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError> {
            Ok(Value::Text(format!("{}1", self.prefix)))
        }

        fn param_aware(&self) -> bool {
            true
        }

        fn set_params(&mut self, params: ParamMap) {
            if let Some(prefix) = params.get("prefix").and_then(|value| value.as_str()) {
                self.prefix = prefix.to_string();
            }
        }
    }

    struct Failing;

    impl CustomGenerator for Failing {
        fn generate(&self, _ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError> {
            Err("backend unavailable".into())
        }
    }

    fn registry() -> CustomRegistry {
        let mut registry = CustomRegistry::new();
        registry
            .register(
                "prefixed",
                Arc::new(|| Box::new(Prefixed::default()) as Box<dyn CustomGenerator>),
            )
            .expect("register");
        registry
            .register("failing", Arc::new(|| Box::new(Failing) as Box<dyn CustomGenerator>))
            .expect("register");
        registry
    }

    #[test]
    fn params_are_injected_into_param_aware_generators() {
        let registry = registry();
        let params = ParamMap::from([("prefix".to_string(), json!("usr-"))]);
        let generator = registry
            .instantiate("prefixed", params, RemarkSet::new())
            .expect("instantiate");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = GenerationContext::new("handle", &mut rng, ParentView::detached());
        assert_eq!(
            generator.generate(&mut ctx).expect("generate"),
            Value::Text("usr-1".to_string())
        );
        assert_eq!(generator.id(), "custom.prefixed");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let result = registry().instantiate("nope", ParamMap::new(), RemarkSet::new());
        assert!(matches!(
            result,
            Err(GenerationError::UnknownCustomGenerator(name)) if name == "nope"
        ));
    }

    #[test]
    fn failures_are_wrapped_with_path() {
        let generator = registry()
            .instantiate("failing", ParamMap::new(), RemarkSet::new())
            .expect("instantiate");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = GenerationContext::new("a.b", &mut rng, ParentView::detached());
        let err = generator.generate(&mut ctx).expect_err("should fail");
        assert!(matches!(&err, GenerationError::Custom { path, .. } if path == "a.b"));
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let mut registry = registry();
        let result = registry.register(
            "failing",
            Arc::new(|| Box::new(Failing) as Box<dyn CustomGenerator>),
        );
        assert!(matches!(
            result,
            Err(GenerationError::ConfigurationConflict(_))
        ));
    }
}
