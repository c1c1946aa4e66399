use dtoforge_core::Value;

use crate::errors::GenerationError;
use crate::generators::{GenerationContext, Generator};

/// Always yields a clone of the same value.
#[derive(Debug, Clone)]
pub struct ConstantGenerator {
    value: Value,
}

impl ConstantGenerator {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Generator for ConstantGenerator {
    fn id(&self) -> &str {
        "constant"
    }

    fn generate(&self, _ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        Ok(self.value.clone())
    }
}

type GenerateFn =
    dyn Fn(&mut GenerationContext<'_>) -> Result<Value, GenerationError> + Send + Sync;

/// Generator backed by a closure, for ad-hoc overrides.
pub struct FnGenerator {
    id: String,
    generate: Box<GenerateFn>,
}

impl FnGenerator {
    pub fn new<F>(id: impl Into<String>, generate: F) -> Self
    where
        F: Fn(&mut GenerationContext<'_>) -> Result<Value, GenerationError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            generate: Box::new(generate),
        }
    }
}

impl Generator for FnGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        (self.generate)(ctx)
    }
}
