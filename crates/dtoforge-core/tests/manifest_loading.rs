use dtoforge_core::{
    Error, FieldType, RuleTarget, ScalarKind, Value, load_manifest_str, validate_manifest_json,
};
use serde_json::json;

const MANIFEST: &str = r#"{
  "manifest_version": "0.1",
  "enums": [{"name": "Status", "labels": ["ACTIVE", "BLOCKED"]}],
  "types": [
    {
      "name": "Address",
      "fields": [
        {"name": "street", "field_type": {"kind": "scalar", "scalar": "text"},
         "rules": [{"tag": "text", "attributes": {"min_len": 3, "max_len": 12}}]}
      ]
    },
    {
      "name": "User",
      "fields": [
        {"name": "age", "field_type": {"kind": "scalar", "scalar": "int", "nullable": false}},
        {"name": "status", "field_type": {"kind": "enum", "name": "Status"}},
        {"name": "tags", "field_type": {"kind": "list", "element": {"kind": "scalar", "scalar": "text"}},
         "rules": [
           {"tag": "list", "attributes": {"min_size": 2, "max_size": 2}},
           {"tag": "text", "target": "element"}
         ]},
        {"name": "address", "field_type": {"kind": "object", "name": "Address"},
         "rules": [{"tag": "nested"}]}
      ]
    }
  ]
}"#;

#[test]
fn loads_manifest_into_registry() {
    let registry = load_manifest_str(MANIFEST).expect("load manifest");

    let fields = registry.fields_of("User").expect("user fields");
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[0].field_type, FieldType::primitive(ScalarKind::Int));
    assert_eq!(fields[2].rules[1].target, RuleTarget::Element);
    assert_eq!(
        registry.enum_labels("Status"),
        Some(&["ACTIVE".to_string(), "BLOCKED".to_string()][..])
    );

    let instance = registry.create_instance("User").expect("instance");
    assert_eq!(instance.get("age"), Some(&Value::Int(0)));
    assert_eq!(instance.get("address"), Some(&Value::Null));
}

#[test]
fn schema_violations_are_reported_with_paths() {
    let manifest = json!({
        "types": [{"name": "User", "fields": [{"name": "age"}]}]
    });
    let violations = validate_manifest_json(&manifest).expect("validate");
    assert!(!violations.is_empty());
    assert!(violations.iter().any(|v| v.starts_with("/types/0/fields/0")));
}

#[test]
fn inconsistent_manifest_is_rejected() {
    let manifest = r#"{
      "types": [
        {"name": "User", "fields": [
          {"name": "address", "field_type": {"kind": "object", "name": "Missing"}}
        ]}
      ]
    }"#;
    let err = load_manifest_str(manifest).expect_err("unknown reference");
    assert!(matches!(err, Error::InvalidManifest(_)));
}
