use std::sync::Arc;

use dtoforge_core::Value;

use crate::compiled::CompiledComposition;
use crate::config::SelectionMode;
use crate::errors::GenerationError;
use crate::generators::{GenerationContext, Generator};

/// Generates a whole nested object from its own compiled composition.
pub struct NestedGenerator {
    id: String,
    composition: Arc<CompiledComposition>,
    selection: SelectionMode,
}

impl NestedGenerator {
    pub fn new(composition: Arc<CompiledComposition>, selection: SelectionMode) -> Self {
        Self {
            id: format!("nested.{}", composition.type_name()),
            composition,
            selection,
        }
    }

    pub fn composition(&self) -> &Arc<CompiledComposition> {
        &self.composition
    }
}

impl Generator for NestedGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        if self.selection == SelectionMode::Null {
            return Ok(Value::Null);
        }
        let record = self.composition.generate(&mut *ctx.rng)?;
        Ok(Value::Object(record))
    }
}
