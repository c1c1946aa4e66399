//! Generator capability and the built-in generator families.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use tracing::warn;

use dtoforge_core::{FieldType, Record, Value};

use crate::config::EffectiveConfig;
use crate::errors::GenerationError;
use crate::remarks::{ParamMap, RemarkSet};

pub mod collection;
pub mod constant;
pub mod custom;
pub mod nested;
pub mod primitives;

pub use collection::{CollectionGenerator, CollectionShape, MapGenerator, Sizing};
pub use constant::{ConstantGenerator, FnGenerator};
pub use custom::{CustomFactory, CustomGenerator, CustomGeneratorAdapter, CustomRegistry};
pub use nested::NestedGenerator;
pub use primitives::BuilderRegistry;

/// Produces one value per call. Successive calls may differ but never
/// mutate shared state, so one generator can serve concurrent callers.
pub trait Generator: Send + Sync {
    fn id(&self) -> &str;

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError>;
}

impl fmt::Debug for dyn Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generator({})", self.id())
    }
}

/// Per-call state: the field being filled, the randomness source and a
/// read-only view of the instance under construction.
pub struct GenerationContext<'a> {
    pub path: &'a str,
    pub rng: &'a mut dyn RngCore,
    pub parent: ParentView<'a>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(path: &'a str, rng: &'a mut dyn RngCore, parent: ParentView<'a>) -> Self {
        Self { path, rng, parent }
    }
}

/// Read access to the enclosing instance while its fields are generated.
///
/// Fields are filled in declaration order (superclass fields first). A
/// field that is not ready yet still holds its zero/default value; this is
/// an ordering convenience, not a dependency resolver.
#[derive(Debug, Clone, Copy)]
pub struct ParentView<'a> {
    record: Option<&'a Record>,
    ready: &'a [String],
}

impl<'a> ParentView<'a> {
    pub fn new(record: &'a Record, ready: &'a [String]) -> Self {
        Self {
            record: Some(record),
            ready,
        }
    }

    /// View with no enclosing instance.
    pub fn detached() -> Self {
        Self {
            record: None,
            ready: &[],
        }
    }

    pub fn is_attached(&self) -> bool {
        self.record.is_some()
    }

    pub fn type_name(&self) -> Option<&'a str> {
        self.record.map(|record| record.type_name.as_str())
    }

    pub fn is_ready(&self, field: &str) -> bool {
        self.ready.iter().any(|name| name == field)
    }

    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.record.and_then(|record| record.get(field))
    }

    pub fn generated_fields(&self) -> &'a [String] {
        self.ready
    }
}

/// Everything a builder may consult to instantiate a generator for one
/// field (or one container element).
pub struct BuildRequest<'a> {
    pub path: &'a str,
    pub field_name: &'a str,
    pub field_type: &'a FieldType,
    pub config: &'a EffectiveConfig,
    /// Rule tag that triggered the build, if any.
    pub tag: Option<&'a str>,
    pub enum_labels: Option<&'a [String]>,
    pub remarks: &'a RemarkSet,
    pub params: &'a ParamMap,
}

/// A primitive slot cannot hold null: substitute its zero value instead.
pub(crate) fn substitute_primitive_null(value: Value, field_type: &FieldType, path: &str) -> Value {
    if value.is_null() && field_type.is_primitive() {
        warn!(
            path,
            field_type = %field_type,
            "null requested for a primitive slot; using its zero value"
        );
        return Value::zero_for(field_type);
    }
    value
}

/// Turns merged configuration into a ready generator.
pub trait GeneratorBuilder: Send + Sync {
    fn build(&self, request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError>;
}

impl<F> GeneratorBuilder for F
where
    F: Fn(&BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> + Send + Sync,
{
    fn build(&self, request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
        self(request)
    }
}
