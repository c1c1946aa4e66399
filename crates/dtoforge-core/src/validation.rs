use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::{TypeDescriptor, TypeManifest};
use crate::types::FieldType;

/// Validate internal consistency of a type manifest.
///
/// This checks:
/// - duplicate type/enum/field names
/// - parent types exist and inheritance is acyclic
/// - object and enum field types reference known names
/// - a field name is not redeclared by a subtype
pub fn validate_manifest(manifest: &TypeManifest) -> Result<()> {
    let mut types: BTreeMap<&str, &TypeDescriptor> = BTreeMap::new();
    for descriptor in &manifest.types {
        if types.insert(descriptor.name.as_str(), descriptor).is_some() {
            return Err(Error::InvalidManifest(format!(
                "duplicate type name: {}",
                descriptor.name
            )));
        }
    }

    let mut enums = BTreeSet::new();
    for enum_type in &manifest.enums {
        if !enums.insert(enum_type.name.as_str()) {
            return Err(Error::InvalidManifest(format!(
                "duplicate enum name: {}",
                enum_type.name
            )));
        }
        if enum_type.labels.is_empty() {
            return Err(Error::InvalidManifest(format!(
                "enum has no labels: {}",
                enum_type.name
            )));
        }
    }

    for descriptor in &manifest.types {
        let mut fields = BTreeSet::new();
        for field in &descriptor.fields {
            if !fields.insert(field.name.as_str()) {
                return Err(Error::InvalidManifest(format!(
                    "duplicate field name: {}.{}",
                    descriptor.name, field.name
                )));
            }
            if field.name.is_empty() || field.name.contains('.') {
                return Err(Error::InvalidManifest(format!(
                    "invalid field name '{}' in {}",
                    field.name, descriptor.name
                )));
            }
            check_references(&descriptor.name, &field.name, &field.field_type, &types, &enums)?;
        }

        if let Some(parent) = &descriptor.parent
            && !types.contains_key(parent.as_str())
        {
            return Err(Error::InvalidManifest(format!(
                "unknown parent type '{}' for {}",
                parent, descriptor.name
            )));
        }
    }

    for descriptor in &manifest.types {
        check_hierarchy(descriptor, &types)?;
    }

    Ok(())
}

fn check_references(
    type_name: &str,
    field_name: &str,
    field_type: &FieldType,
    types: &BTreeMap<&str, &TypeDescriptor>,
    enums: &BTreeSet<&str>,
) -> Result<()> {
    match field_type {
        FieldType::Scalar { .. } => Ok(()),
        FieldType::Enum { name } => {
            if enums.contains(name.as_str()) {
                Ok(())
            } else {
                Err(Error::InvalidManifest(format!(
                    "unknown enum '{name}' referenced by {type_name}.{field_name}"
                )))
            }
        }
        FieldType::Object { name } => {
            if types.contains_key(name.as_str()) {
                Ok(())
            } else {
                Err(Error::InvalidManifest(format!(
                    "unknown type '{name}' referenced by {type_name}.{field_name}"
                )))
            }
        }
        FieldType::List { element } | FieldType::Set { element } | FieldType::Array { element } => {
            check_references(type_name, field_name, element, types, enums)
        }
        FieldType::Map { key, value } => {
            check_references(type_name, field_name, key, types, enums)?;
            check_references(type_name, field_name, value, types, enums)
        }
    }
}

fn check_hierarchy(
    descriptor: &TypeDescriptor,
    types: &BTreeMap<&str, &TypeDescriptor>,
) -> Result<()> {
    let mut seen_types = BTreeSet::new();
    let mut seen_fields = BTreeSet::new();
    let mut current = Some(descriptor);

    while let Some(node) = current {
        if !seen_types.insert(node.name.as_str()) {
            return Err(Error::InvalidManifest(format!(
                "inheritance cycle through type: {}",
                node.name
            )));
        }
        for field in &node.fields {
            if !seen_fields.insert(field.name.as_str()) {
                return Err(Error::InvalidManifest(format!(
                    "field '{}' of {} redeclares an inherited field",
                    field.name, descriptor.name
                )));
            }
        }
        current = node
            .parent
            .as_deref()
            .and_then(|parent| types.get(parent).copied());
    }

    Ok(())
}
