use std::sync::{Mutex, MutexGuard, PoisonError};

use dtoforge_core::{
    FieldDescriptor, FieldType, RuleDecl, ScalarKind, TypeDescriptor, TypeRegistry, Value,
};
use dtoforge_generate::{
    BuildSession, GenerationError, PartialConfig, global_snapshot, reset_global, restore_global,
    set_global,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

/// Holds the lock and puts the global layer back when dropped.
struct GlobalGuard {
    snapshot: PartialConfig,
    _lock: MutexGuard<'static, ()>,
}

impl GlobalGuard {
    fn acquire() -> Self {
        let lock = GLOBAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = global_snapshot();
        reset_global();
        Self {
            snapshot,
            _lock: lock,
        }
    }
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        restore_global(self.snapshot.clone());
    }
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("User").field(
                FieldDescriptor::new("age", FieldType::scalar(ScalarKind::Int))
                    .rule(RuleDecl::new("int").attr("min", 1).attr("max", 1)),
            ),
        )
        .expect("user");
    registry
}

fn age(session: &mut BuildSession) -> Value {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let user = session.generate("User", &mut rng).expect("generate");
    user.get("age").cloned().expect("age")
}

#[test]
fn global_layer_sits_between_rule_and_type_scopes() {
    let _guard = GlobalGuard::acquire();
    set_global(PartialConfig::new().with_min(5_i64).with_max(5_i64)).expect("global");

    let mut session = BuildSession::new(registry());
    assert_eq!(age(&mut session), Value::Int(5));

    session.configure_type("int?", PartialConfig::new().with_min(6_i64).with_max(6_i64));
    assert_eq!(age(&mut session), Value::Int(6));
}

#[test]
fn global_values_conflict_until_reset() {
    let _guard = GlobalGuard::acquire();
    set_global(PartialConfig::new().with_max(5_i64)).expect("first");
    set_global(PartialConfig::new().with_max(5_i64)).expect("same value");
    assert!(matches!(
        set_global(PartialConfig::new().with_max(6_i64)),
        Err(GenerationError::ConfigurationConflict(_))
    ));

    reset_global();
    set_global(PartialConfig::new().with_max(6_i64)).expect("after reset");
    assert_eq!(global_snapshot(), PartialConfig::new().with_max(6_i64));
}

#[test]
fn compile_reads_global_once() {
    let _guard = GlobalGuard::acquire();
    let mut session = BuildSession::new(registry());
    set_global(PartialConfig::new().with_min(3_i64).with_max(3_i64)).expect("global");
    let composition = session.compile("User").expect("compile");

    reset_global();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let user = composition.generate(&mut rng).expect("generate");
    assert_eq!(user.get("age"), Some(&Value::Int(3)));
    assert_eq!(age(&mut session), Value::Int(1));
}
