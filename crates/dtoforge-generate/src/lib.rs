//! Generator composition for DTO test fixtures.
//!
//! A [`BuildSession`] collects configuration scopes, overrides, remarks and
//! custom generators, then compiles a root type into a
//! [`CompiledComposition`]: one generator per populated field, nested
//! objects included. Compiled compositions are immutable and can generate
//! concurrently; [`GenerationEngine`] drives seeded batch runs.

pub mod compiled;
mod composer;
pub mod config;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod global;
pub mod model;
pub mod overrides;
pub mod params;
pub mod path;
pub mod remarks;
pub mod session;

pub use compiled::{CompiledComposition, CompiledField};
pub use config::{Bound, ConfigurationScopes, EffectiveConfig, PartialConfig, SelectionMode};
pub use engine::{GenerationEngine, GenerationResult};
pub use errors::{CustomError, FailureReport, FieldFailure, GenerationError};
pub use generators::{
    BuildRequest, CustomGenerator, GenerationContext, Generator, GeneratorBuilder, ParentView,
};
pub use global::{global_snapshot, reset_global, restore_global, set_global};
pub use model::{CompositionReport, Diagnostic, GenerateOptions, GenerationReport};
pub use overrides::{GeneratorOrBuilder, OverrideSource};
pub use remarks::{HolderScope, ParamMap, RemarkSet};
pub use session::BuildSession;
