use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::{FieldDescriptor, TypeDescriptor, TypeManifest};
use crate::types::EnumType;
use crate::validation::validate_manifest;
use crate::value::{Record, Value};

/// Reflection boundary: known DTO types and enums, instance creation and
/// field enumeration.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDescriptor>,
    enums: BTreeMap<String, EnumType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a manifest after checking its consistency.
    pub fn from_manifest(manifest: TypeManifest) -> Result<Self> {
        validate_manifest(&manifest)?;
        let mut registry = Self::new();
        for enum_type in manifest.enums {
            registry.register_enum(enum_type)?;
        }
        for descriptor in manifest.types {
            registry.register_type(descriptor)?;
        }
        Ok(registry)
    }

    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        if self.types.contains_key(&descriptor.name) {
            return Err(Error::InvalidManifest(format!(
                "duplicate type name: {}",
                descriptor.name
            )));
        }
        self.types.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn register_enum(&mut self, enum_type: EnumType) -> Result<()> {
        if self.enums.contains_key(&enum_type.name) {
            return Err(Error::InvalidManifest(format!(
                "duplicate enum name: {}",
                enum_type.name
            )));
        }
        self.enums.insert(enum_type.name.clone(), enum_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn enum_labels(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(|enum_type| enum_type.labels.as_slice())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// All fields of a type in generation order: parent fields first, then
    /// the type's own fields, each in declaration order.
    pub fn fields_of(&self, name: &str) -> Result<Vec<&FieldDescriptor>> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            if !seen.insert(type_name) {
                return Err(Error::InvalidManifest(format!(
                    "inheritance cycle through type: {type_name}"
                )));
            }
            let descriptor = self
                .types
                .get(type_name)
                .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
            chain.push(descriptor);
            current = descriptor.parent.as_deref();
        }

        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|descriptor| descriptor.fields.iter())
            .collect())
    }

    /// Create an instance with every field at its zero/default value.
    pub fn create_instance(&self, name: &str) -> Result<Record> {
        let mut record = Record::new(name);
        for field in self.fields_of(name)? {
            record.set(&field.name, Value::zero_for(&field.field_type));
        }
        Ok(record)
    }
}
