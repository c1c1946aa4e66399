use std::sync::Arc;
use std::thread;

use dtoforge_core::{
    FieldDescriptor, FieldType, RuleDecl, ScalarKind, TypeDescriptor, TypeRegistry, Value,
};
use dtoforge_generate::generators::ConstantGenerator;
use dtoforge_generate::{
    BuildSession, GenerateOptions, GenerationEngine, GenerationError, GeneratorOrBuilder,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn account_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Account")
                .field(
                    FieldDescriptor::new("id", FieldType::scalar(ScalarKind::Uuid))
                        .rule(RuleDecl::new("uuid")),
                )
                .field(
                    FieldDescriptor::new("name", FieldType::scalar(ScalarKind::Text))
                        .rule(RuleDecl::new("text").attr("min_len", 12).attr("max_len", 12)),
                )
                .field(
                    FieldDescriptor::new("opened", FieldType::scalar(ScalarKind::Date))
                        .rule(
                            RuleDecl::new("date")
                                .attr("min", "2020-01-01")
                                .attr("max", "2020-12-31"),
                        ),
                )
                .field(FieldDescriptor::new("currency", FieldType::scalar(ScalarKind::Text))),
        )
        .expect("account");
    registry
}

fn session() -> BuildSession {
    let mut session = BuildSession::new(account_registry());
    session
        .override_path(
            "currency",
            GeneratorOrBuilder::generator(ConstantGenerator::new(Value::Text("EUR".to_string()))),
        )
        .expect("override");
    session
}

#[test]
fn reused_composition_varies_random_fields_only() {
    let composition = session().compile("Account").expect("compile");
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let first = composition.generate(&mut rng).expect("first");
    let second = composition.generate(&mut rng).expect("second");

    assert_ne!(first.get("id"), second.get("id"));
    assert_ne!(first.get("name"), second.get("name"));
    assert_eq!(first.get("currency"), second.get("currency"));
    assert_eq!(first.get("currency"), Some(&Value::Text("EUR".to_string())));
}

#[test]
fn compiled_composition_is_shared_across_threads() {
    let composition = session().compile("Account").expect("compile");
    let names: Vec<Value> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4_u64)
            .map(|seed| {
                let composition = Arc::clone(&composition);
                scope.spawn(move || {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    composition.generate(&mut rng).expect("generate")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                let account = handle.join().expect("thread");
                assert_eq!(account.get("currency"), Some(&Value::Text("EUR".to_string())));
                account.get("name").cloned().expect("name")
            })
            .collect()
    });
    for (index, name) in names.iter().enumerate() {
        assert!(!names[index + 1..].contains(name));
    }
}

#[test]
fn cloned_session_is_independent() {
    let mut original = session();
    let mut copy = original.clone();
    copy.override_path(
        "name",
        GeneratorOrBuilder::generator(ConstantGenerator::new(Value::Text("fixed".to_string()))),
    )
    .expect("override on copy");

    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let account = original.generate("Account", &mut rng).expect("original");
    assert_ne!(account.get("name"), Some(&Value::Text("fixed".to_string())));
    let account = copy.generate("Account", &mut rng).expect("copy");
    assert_eq!(account.get("name"), Some(&Value::Text("fixed".to_string())));
}

#[test]
fn engine_is_deterministic_for_a_seed() {
    let options = GenerateOptions {
        seed: Some(42),
        count: 5,
        ..GenerateOptions::default()
    };
    let engine = GenerationEngine::new(options.clone());
    let first = engine.run(&mut session(), "Account").expect("first run");
    let second = engine.run(&mut session(), "Account").expect("second run");
    assert_eq!(first.instances, second.instances);
    assert_eq!(first.report.instances_generated, 5);
    assert_eq!(first.report.seed, 42);
    assert_eq!(first.report.composition.generator_usage.get("constant"), Some(&1));

    let other = GenerationEngine::new(GenerateOptions {
        seed: Some(43),
        ..options
    })
    .run(&mut session(), "Account")
    .expect("other seed");
    assert_ne!(first.instances, other.instances);
}

#[test]
fn engine_skips_failed_instances_when_collecting() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Flags").field(
                FieldDescriptor::new("flags", FieldType::set(FieldType::scalar(ScalarKind::Bool)))
                    .rule(RuleDecl::new("set").attr("min_size", 3).attr("max_size", 3))
                    .rule(RuleDecl::new("bool").target(dtoforge_core::RuleTarget::Element)),
            ),
        )
        .expect("flags");
    let options = GenerateOptions {
        seed: Some(1),
        count: 2,
        max_attempts_element: 4,
        collect_field_errors: true,
        ..GenerateOptions::default()
    };
    let result = GenerationEngine::new(options.clone())
        .run(&mut BuildSession::new(registry.clone()), "Flags")
        .expect("run");
    assert!(result.instances.is_empty());
    assert_eq!(result.report.instances_requested, 2);
    assert_eq!(result.report.failures.len(), 2);
    assert!(result.report.failures.iter().all(|failure| failure.path == "flags"));

    let err = GenerationEngine::new(GenerateOptions {
        collect_field_errors: false,
        ..options
    })
    .run(&mut BuildSession::new(registry), "Flags")
    .expect_err("abort");
    assert!(matches!(err, GenerationError::SizeUnreachable { .. }));
}
