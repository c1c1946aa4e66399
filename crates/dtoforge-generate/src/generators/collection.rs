use std::sync::Arc;

use rand::Rng;

use dtoforge_core::{FieldType, Value};

use crate::config::SelectionMode;
use crate::errors::GenerationError;
use crate::generators::{GenerationContext, Generator, substitute_primitive_null};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    List,
    Set,
    Array,
}

impl CollectionShape {
    pub fn of(field_type: &FieldType) -> Option<Self> {
        match field_type {
            FieldType::List { .. } => Some(CollectionShape::List),
            FieldType::Set { .. } => Some(CollectionShape::Set),
            FieldType::Array { .. } => Some(CollectionShape::Array),
            _ => None,
        }
    }

    fn id(&self) -> &'static str {
        match self {
            CollectionShape::List => "collection.list",
            CollectionShape::Set => "collection.set",
            CollectionShape::Array => "collection.array",
        }
    }
}

/// Upper bound on up-front allocation; larger targets grow as they fill.
const PREALLOCATE_LIMIT: usize = 64;

/// Size range and retry budget shared by collections and maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub min: usize,
    pub max: usize,
    pub selection: SelectionMode,
    /// Wasted draws (duplicates or nulls) tolerated before giving up.
    pub max_attempts: u32,
}

impl Sizing {
    /// Target size, or `None` when the container itself should be null.
    fn target(&self, ctx: &mut GenerationContext<'_>) -> Option<usize> {
        match self.selection {
            SelectionMode::Null => None,
            SelectionMode::Min => Some(self.min),
            SelectionMode::Max => Some(self.max),
            SelectionMode::Random => Some(ctx.rng.random_range(self.min..=self.max)),
        }
    }

    fn buffer<T>(target: usize) -> Vec<T> {
        Vec::with_capacity(target.min(PREALLOCATE_LIMIT))
    }

    fn miss(
        &self,
        misses: &mut u32,
        path: &str,
        target: usize,
        reached: usize,
    ) -> Result<(), GenerationError> {
        *misses += 1;
        if *misses >= self.max_attempts {
            return Err(GenerationError::SizeUnreachable {
                path: path.to_string(),
                target,
                reached,
                attempts: *misses,
            });
        }
        Ok(())
    }
}

/// List, set or array built from one element generator. Null elements are
/// never inserted; sets also reject duplicates.
pub struct CollectionGenerator {
    shape: CollectionShape,
    element: Arc<dyn Generator>,
    element_type: FieldType,
    sizing: Sizing,
}

impl CollectionGenerator {
    pub fn new(
        shape: CollectionShape,
        element: Arc<dyn Generator>,
        element_type: FieldType,
        sizing: Sizing,
    ) -> Self {
        Self {
            shape,
            element,
            element_type,
            sizing,
        }
    }
}

impl Generator for CollectionGenerator {
    fn id(&self) -> &str {
        self.shape.id()
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let Some(target) = self.sizing.target(ctx) else {
            return Ok(Value::Null);
        };
        let mut items: Vec<Value> = Sizing::buffer(target);
        let mut misses = 0;
        while items.len() < target {
            let value = self.element.generate(ctx)?;
            let value = substitute_primitive_null(value, &self.element_type, ctx.path);
            let rejected = value.is_null()
                || (self.shape == CollectionShape::Set && items.contains(&value));
            if rejected {
                self.sizing.miss(&mut misses, ctx.path, target, items.len())?;
                continue;
            }
            items.push(value);
        }
        Ok(match self.shape {
            CollectionShape::Set => Value::Set(items),
            CollectionShape::List | CollectionShape::Array => Value::List(items),
        })
    }
}

/// Map with unique keys; a duplicate or null key costs one attempt.
pub struct MapGenerator {
    key: Arc<dyn Generator>,
    value: Arc<dyn Generator>,
    key_type: FieldType,
    value_type: FieldType,
    sizing: Sizing,
}

impl MapGenerator {
    pub fn new(
        key: Arc<dyn Generator>,
        value: Arc<dyn Generator>,
        key_type: FieldType,
        value_type: FieldType,
        sizing: Sizing,
    ) -> Self {
        Self {
            key,
            value,
            key_type,
            value_type,
            sizing,
        }
    }
}

impl Generator for MapGenerator {
    fn id(&self) -> &str {
        "collection.map"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let Some(target) = self.sizing.target(ctx) else {
            return Ok(Value::Null);
        };
        let mut entries: Vec<(Value, Value)> = Sizing::buffer(target);
        let mut misses = 0;
        while entries.len() < target {
            let key = self.key.generate(ctx)?;
            let key = substitute_primitive_null(key, &self.key_type, ctx.path);
            if key.is_null() || entries.iter().any(|(existing, _)| *existing == key) {
                self.sizing.miss(&mut misses, ctx.path, target, entries.len())?;
                continue;
            }
            let value = self.value.generate(ctx)?;
            let value = substitute_primitive_null(value, &self.value_type, ctx.path);
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}
