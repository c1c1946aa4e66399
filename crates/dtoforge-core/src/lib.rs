//! Core contracts for dtoforge.
//!
//! This crate defines the reflection boundary the generation engine works
//! against: declared field types, raw rule metadata, DTO type descriptors,
//! the dynamic value model, and manifest loading/validation.

pub mod error;
pub mod manifest;
pub mod registry;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

pub use error::{Error, Result};
pub use manifest::{
    load_manifest_file, load_manifest_str, manifest_json_schema, validate_manifest_json,
};
pub use registry::TypeRegistry;
pub use schema::{FieldDescriptor, RuleDecl, RuleTarget, TypeDescriptor, TypeManifest};
pub use types::{EnumType, FieldType, ScalarKind};
pub use validation::validate_manifest;
pub use value::{Record, Value};

/// Current contract version for type manifests.
pub const MANIFEST_VERSION: &str = "0.1";

/// Group every rule declaration without an explicit group belongs to.
pub const DEFAULT_GROUP: &str = "default";
