use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use tracing::{debug, warn};

use dtoforge_core::{FieldType, Record, Value};

use crate::errors::{FailureReport, GenerationError};
use crate::generators::{GenerationContext, Generator, ParentView, substitute_primitive_null};

/// One field of a compiled type with its ready generator.
pub struct CompiledField {
    pub name: String,
    pub path: String,
    pub field_type: FieldType,
    pub generator: Arc<dyn Generator>,
}

/// Immutable field → generator mapping for one type, shareable across
/// threads. The instance being filled is passed per call and never stored.
pub struct CompiledComposition {
    type_name: String,
    path: String,
    template: Record,
    fields: Vec<CompiledField>,
    collect_field_errors: bool,
}

impl fmt::Debug for CompiledComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|field| (field.name.as_str(), field.generator.id()))
            .collect();
        f.debug_struct("CompiledComposition")
            .field("type_name", &self.type_name)
            .field("path", &self.path)
            .field("fields", &fields)
            .finish()
    }
}

impl CompiledComposition {
    pub(crate) fn new(
        type_name: String,
        path: String,
        template: Record,
        fields: Vec<CompiledField>,
        collect_field_errors: bool,
    ) -> Self {
        Self {
            type_name,
            path,
            template,
            fields,
            collect_field_errors,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Path of the node this composition fills; empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fields that get generated, in generation order.
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fresh instance with every field at its zero/default value.
    pub fn new_instance(&self) -> Record {
        self.template.clone()
    }

    pub fn generate(&self, rng: &mut dyn RngCore) -> Result<Record, GenerationError> {
        let mut record = self.new_instance();
        self.populate(&mut record, rng)?;
        Ok(record)
    }

    /// Fill `record` in field declaration order. Fields without a generator
    /// keep whatever value `record` already holds.
    pub fn populate(
        &self,
        record: &mut Record,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        if record.type_name != self.type_name {
            return Err(GenerationError::TypeMismatch {
                path: self.path.clone(),
                expected: self.type_name.clone(),
                actual: record.type_name.clone(),
            });
        }

        let mut ready: Vec<String> = Vec::with_capacity(self.fields.len());
        let mut failures = FailureReport::new(self.type_name.clone());
        for field in &self.fields {
            let generated = {
                let parent = ParentView::new(record, &ready);
                let mut ctx = GenerationContext::new(&field.path, &mut *rng, parent);
                field.generator.generate(&mut ctx)
            };
            match generated.and_then(|value| check_value(field, value)) {
                Ok(value) => {
                    record.set(&field.name, value);
                    ready.push(field.name.clone());
                }
                Err(err) if self.collect_field_errors => {
                    warn!(path = %field.path, error = %err, "field generation failed");
                    match err {
                        GenerationError::Failed(nested) => {
                            failures.failures.extend(nested.failures)
                        }
                        other => failures.record(field.path.clone(), &other),
                    }
                }
                Err(err) => return Err(err),
            }
        }

        if failures.is_empty() {
            debug!(type_name = %self.type_name, fields = ready.len(), "instance populated");
            Ok(())
        } else {
            Err(GenerationError::Failed(failures))
        }
    }
}

fn check_value(field: &CompiledField, value: Value) -> Result<Value, GenerationError> {
    let value = substitute_primitive_null(value, &field.field_type, &field.path);
    if value.conforms_to(&field.field_type) {
        Ok(value)
    } else {
        Err(GenerationError::TypeMismatch {
            path: field.path.clone(),
            expected: field.field_type.to_string(),
            actual: value.kind_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{ConstantGenerator, FnGenerator};
    use dtoforge_core::ScalarKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn field(name: &str, field_type: FieldType, generator: Arc<dyn Generator>) -> CompiledField {
        CompiledField {
            name: name.to_string(),
            path: name.to_string(),
            field_type,
            generator,
        }
    }

    fn template() -> Record {
        let mut record = Record::new("User");
        record.set("age", Value::Int(0));
        record.set("name", Value::Null);
        record
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let composition = CompiledComposition::new(
            "User".to_string(),
            String::new(),
            template(),
            vec![field(
                "age",
                FieldType::primitive(ScalarKind::Int),
                Arc::new(ConstantGenerator::new(Value::Text("x".to_string()))),
            )],
            false,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = composition.generate(&mut rng).expect_err("mismatch");
        assert!(matches!(err, GenerationError::TypeMismatch { path, .. } if path == "age"));
    }

    #[test]
    fn later_fields_see_earlier_ones() {
        let composition = CompiledComposition::new(
            "User".to_string(),
            String::new(),
            template(),
            vec![
                field(
                    "age",
                    FieldType::primitive(ScalarKind::Int),
                    Arc::new(ConstantGenerator::new(Value::Int(30))),
                ),
                field(
                    "name",
                    FieldType::scalar(ScalarKind::Text),
                    Arc::new(FnGenerator::new("echo", |ctx| {
                        assert!(ctx.parent.is_ready("age"));
                        assert!(!ctx.parent.is_ready("name"));
                        let age = ctx.parent.get("age").and_then(Value::as_i64).unwrap_or(-1);
                        Ok(Value::Text(format!("age {age}")))
                    })),
                ),
            ],
            false,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let record = composition.generate(&mut rng).expect("generate");
        assert_eq!(record.get("name"), Some(&Value::Text("age 30".to_string())));
    }

    #[test]
    fn collect_mode_reports_every_failure() {
        let failing = || -> Arc<dyn Generator> {
            Arc::new(FnGenerator::new("boom", |ctx| {
                Err(GenerationError::Runtime {
                    path: ctx.path.to_string(),
                    message: "boom".to_string(),
                })
            }))
        };
        let composition = CompiledComposition::new(
            "User".to_string(),
            String::new(),
            template(),
            vec![
                field("age", FieldType::primitive(ScalarKind::Int), failing()),
                field("name", FieldType::scalar(ScalarKind::Text), failing()),
            ],
            true,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        match composition.generate(&mut rng) {
            Err(GenerationError::Failed(report)) => {
                let paths: Vec<&str> = report.failures.iter().map(|f| f.path.as_str()).collect();
                assert_eq!(paths, vec!["age", "name"]);
            }
            other => panic!("expected aggregated failure, got {other:?}"),
        }
    }

    #[test]
    fn populate_rejects_foreign_record() {
        let composition = CompiledComposition::new(
            "User".to_string(),
            String::new(),
            template(),
            Vec::new(),
            false,
        );
        let mut record = Record::new("Order");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            composition.populate(&mut record, &mut rng),
            Err(GenerationError::TypeMismatch { .. })
        ));
    }
}
