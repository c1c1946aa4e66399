use std::sync::Arc;

use dtoforge_core::{
    FieldDescriptor, FieldType, RuleDecl, ScalarKind, TypeDescriptor, TypeRegistry, Value,
};
use dtoforge_generate::generators::{BuildRequest, FnGenerator};
use dtoforge_generate::{
    BuildSession, CustomError, CustomGenerator, GenerateOptions, GenerationContext,
    GenerationError, Generator, GeneratorOrBuilder, HolderScope, ParamMap, RemarkSet,
};
use dtoforge_rules::TypeMatcher;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Default)]
struct Greeting {
    remarks: RemarkSet,
    params: ParamMap,
}

impl CustomGenerator for Greeting {
    fn generate(&self, _ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError> {
        let prefix = self
            .params
            .get("prefix")
            .and_then(|value| value.as_str())
            .unwrap_or("Hello ");
        let name = self.remarks.get("name").map(String::as_str).unwrap_or("nobody");
        Ok(Value::Text(format!("{prefix}{name}")))
    }

    fn param_aware(&self) -> bool {
        true
    }

    fn remark_aware(&self) -> bool {
        true
    }

    fn set_params(&mut self, params: ParamMap) {
        self.params = params;
    }

    fn set_remarks(&mut self, remarks: RemarkSet) {
        self.remarks = remarks;
    }
}

/// Echoes a sibling field when it has been generated already.
struct Echo {
    source: &'static str,
}

impl CustomGenerator for Echo {
    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError> {
        if !ctx.parent.is_ready(self.source) {
            return Ok(Value::Text("pending".to_string()));
        }
        let value = ctx.parent.get(self.source).cloned().unwrap_or(Value::Null);
        Ok(value)
    }

    fn parent_aware(&self) -> bool {
        true
    }
}

/// Reports whether it could see the enclosing instance.
struct Blind;

impl CustomGenerator for Blind {
    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError> {
        Ok(Value::Bool(ctx.parent.is_attached()))
    }
}

struct Broken;

impl CustomGenerator for Broken {
    fn generate(&self, _ctx: &mut GenerationContext<'_>) -> Result<Value, CustomError> {
        Err("upstream lookup failed".into())
    }
}

fn custom_field(name: &str, field_type: FieldType, generator: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, field_type)
        .rule(RuleDecl::new("custom").attr("generator", generator))
}

fn profile_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Profile")
                .field(
                    custom_field("greeting", FieldType::scalar(ScalarKind::Text), "greeting"),
                )
                .field(
                    FieldDescriptor::new("handle", FieldType::scalar(ScalarKind::Text)).rule(
                        RuleDecl::new("text").attr("min_len", 6).attr("max_len", 6),
                    ),
                )
                .field(custom_field("before", FieldType::scalar(ScalarKind::Text), "echo_later"))
                .field(custom_field("after", FieldType::scalar(ScalarKind::Text), "echo_handle"))
                .field(custom_field("attached", FieldType::scalar(ScalarKind::Bool), "blind")),
        )
        .expect("profile");
    registry
}

fn profile_session() -> BuildSession {
    let mut session = BuildSession::new(profile_registry());
    session
        .register_custom_with("greeting", Greeting::default)
        .expect("greeting");
    session
        .register_custom_with("echo_later", || Echo { source: "after" })
        .expect("echo later");
    session
        .register_custom_with("echo_handle", || Echo { source: "handle" })
        .expect("echo handle");
    session.register_custom_with("blind", || Blind).expect("blind");
    session
}

#[test]
fn remarks_and_params_reach_aware_generators() {
    let mut session = profile_session();
    session
        .set_param(HolderScope::generator("greeting"), "prefix", "Hi ")
        .expect("param");
    session
        .set_remark(HolderScope::Global, "name", "everyone")
        .expect("global remark");
    session
        .set_remark(HolderScope::field("greeting"), "name", "Ada")
        .expect("field remark");

    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let profile = session.generate("Profile", &mut rng).expect("generate");
    assert_eq!(profile.get("greeting"), Some(&Value::Text("Hi Ada".to_string())));
}

#[test]
fn rule_attributes_become_params() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Card").field(
                FieldDescriptor::new("title", FieldType::scalar(ScalarKind::Text)).rule(
                    RuleDecl::new("custom")
                        .attr("generator", "greeting")
                        .attr("prefix", "Dear "),
                ),
            ),
        )
        .expect("card");
    let mut session = BuildSession::new(registry);
    session
        .register_custom_with("greeting", Greeting::default)
        .expect("greeting");
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let card = session.generate("Card", &mut rng).expect("generate");
    assert_eq!(card.get("title"), Some(&Value::Text("Dear nobody".to_string())));
}

#[test]
fn parent_aware_generators_see_only_earlier_fields() {
    let mut session = profile_session();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let profile = session.generate("Profile", &mut rng).expect("generate");

    let handle = profile.get("handle").cloned().expect("handle");
    assert_eq!(profile.get("after"), Some(&handle));
    assert_eq!(profile.get("before"), Some(&Value::Text("pending".to_string())));
    assert_eq!(profile.get("attached"), Some(&Value::Bool(false)));
}

#[test]
fn custom_failure_carries_field_path() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Account")
                .field(custom_field("balance", FieldType::scalar(ScalarKind::Int), "broken")),
        )
        .expect("account");
    let mut session = BuildSession::new(registry);
    session.register_custom_with("broken", || Broken).expect("broken");
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let err = session.generate("Account", &mut rng).expect_err("failure");
    assert!(matches!(err, GenerationError::Custom { ref path, .. } if path == "balance"));
    assert!(err.to_string().contains("balance"));
}

#[test]
fn collected_failures_are_reported_together() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Account")
                .field(custom_field("balance", FieldType::scalar(ScalarKind::Int), "broken"))
                .field(custom_field("limit", FieldType::scalar(ScalarKind::Int), "broken"))
                .field(
                    FieldDescriptor::new("owner", FieldType::scalar(ScalarKind::Text))
                        .rule(RuleDecl::new("text")),
                ),
        )
        .expect("account");
    let mut session = BuildSession::new(registry).with_options(GenerateOptions {
        collect_field_errors: true,
        ..GenerateOptions::default()
    });
    session.register_custom_with("broken", || Broken).expect("broken");
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let err = session.generate("Account", &mut rng).expect_err("failures");
    let GenerationError::Failed(report) = err else {
        panic!("expected collected failures, got {err}");
    };
    let paths: Vec<&str> = report.failures.iter().map(|failure| failure.path.as_str()).collect();
    assert_eq!(paths, vec!["balance", "limit"]);
}

#[test]
fn unknown_custom_generator_fails_compile() {
    let mut session = BuildSession::new(profile_registry());
    assert!(matches!(
        session.compile("Profile"),
        Err(GenerationError::UnknownCustomGenerator(name)) if name == "greeting"
    ));
}

#[test]
fn custom_rule_without_generator_name_is_structural() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Account").field(
                FieldDescriptor::new("balance", FieldType::scalar(ScalarKind::Int))
                    .rule(RuleDecl::new("custom")),
            ),
        )
        .expect("account");
    let mut session = BuildSession::new(registry);
    let err = session.compile("Account").expect_err("missing name");
    let GenerationError::Structural(issues) = err else {
        panic!("expected structural error, got {err}");
    };
    assert_eq!(issues.error_paths(), vec!["balance"]);
}

#[test]
fn registrations_are_not_replaced() {
    let mut session = profile_session();
    assert!(matches!(
        session.register_custom_with("greeting", || Blind),
        Err(GenerationError::ConfigurationConflict(_))
    ));
    session
        .set_remark(HolderScope::Global, "name", "Ada")
        .expect("first");
    session
        .set_remark(HolderScope::Global, "name", "Ada")
        .expect("same value again");
    assert!(matches!(
        session.set_remark(HolderScope::Global, "name", "Grace"),
        Err(GenerationError::ConfigurationConflict(_))
    ));
}

#[test]
fn registered_rule_tag_uses_its_builder() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Contact").field(
                FieldDescriptor::new("email", FieldType::scalar(ScalarKind::Text))
                    .rule(RuleDecl::new("email").attr("domain", "example.org")),
            ),
        )
        .expect("contact");
    let mut session = BuildSession::new(registry);
    let builder = |request: &BuildRequest<'_>| -> Result<Arc<dyn Generator>, GenerationError> {
        let domain = request
            .params
            .get("domain")
            .and_then(|value| value.as_str())
            .unwrap_or("test.local")
            .to_string();
        Ok(Arc::new(FnGenerator::new("email", move |_ctx| {
            Ok(Value::Text(format!("user@{domain}")))
        })))
    };
    session
        .register_rule_tag(
            "email",
            TypeMatcher::Scalar(vec![ScalarKind::Text]),
            Arc::new(builder),
        )
        .expect("register tag");
    assert!(matches!(
        session.register_rule_tag(
            "text",
            TypeMatcher::Scalar(vec![ScalarKind::Text]),
            Arc::new(builder),
        ),
        Err(GenerationError::ConfigurationConflict(_))
    ));

    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let contact = session.generate("Contact", &mut rng).expect("generate");
    assert_eq!(
        contact.get("email"),
        Some(&Value::Text("user@example.org".to_string()))
    );
}

#[test]
fn builder_override_receives_merged_config() {
    let mut registry = TypeRegistry::new();
    registry
        .register_type(
            TypeDescriptor::new("Item").field(
                FieldDescriptor::new("price", FieldType::scalar(ScalarKind::Int))
                    .rule(RuleDecl::new("int").attr("min", 10).attr("max", 20)),
            ),
        )
        .expect("item");
    let mut session = BuildSession::new(registry);
    let builder = |request: &BuildRequest<'_>| -> Result<Arc<dyn Generator>, GenerationError> {
        let (_, max) = request.config.int_range()?;
        Ok(Arc::new(FnGenerator::new("max", move |_ctx| Ok(Value::Int(max * 2)))))
    };
    session
        .override_rule("int", GeneratorOrBuilder::builder(builder))
        .expect("override");
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let item = session.generate("Item", &mut rng).expect("generate");
    assert_eq!(item.get("price"), Some(&Value::Int(40)));
}
