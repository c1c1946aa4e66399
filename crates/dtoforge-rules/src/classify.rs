use std::collections::BTreeMap;

use dtoforge_core::{FieldDescriptor, FieldType, RuleDecl, RuleTarget};
use tracing::debug;

use crate::catalog::{RuleCatalog, RuleCategory};
use crate::errors::{ValidationIssue, ValidationReport};
use crate::group::GroupFilter;

/// Shape of the active rule, with sub-rules for containers.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Basic,
    Collection { element: Box<RuleInfo> },
    Map { key: Box<RuleInfo>, value: Box<RuleInfo> },
    Nested,
    Custom,
}

/// The single rule declaration that drives generation of a field (or of a
/// container's elements).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleInfo {
    pub decl: RuleDecl,
    /// Declared type the rule applies to: the field type, or the
    /// element/key/value type for sub-rules.
    pub field_type: FieldType,
    pub kind: RuleKind,
}

impl RuleInfo {
    pub fn category(&self) -> RuleCategory {
        match self.kind {
            RuleKind::Basic => RuleCategory::Basic,
            RuleKind::Collection { .. } => RuleCategory::Collection,
            RuleKind::Map { .. } => RuleCategory::Map,
            RuleKind::Nested => RuleCategory::Nested,
            RuleKind::Custom => RuleCategory::Custom,
        }
    }

    pub fn tag(&self) -> &str {
        &self.decl.tag
    }

    pub fn group(&self) -> &str {
        self.decl.group_name()
    }
}

/// Outcome of classifying one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The field carries no rule declarations.
    Unruled,
    /// Rule declarations exist but none is in an included group.
    Excluded,
    Active(RuleInfo),
    /// Structural issues were recorded in the report for this field.
    Invalid,
}

/// Pure classification of raw rule metadata against a group filter.
pub struct RuleClassifier<'a> {
    catalog: &'a RuleCatalog,
    filter: &'a GroupFilter,
}

struct Partition<'f> {
    field: Vec<&'f RuleDecl>,
    element: Vec<&'f RuleDecl>,
    key: Vec<&'f RuleDecl>,
    value: Vec<&'f RuleDecl>,
}

impl<'a> RuleClassifier<'a> {
    pub fn new(catalog: &'a RuleCatalog, filter: &'a GroupFilter) -> Self {
        Self { catalog, filter }
    }

    /// Classify a field's declarations, recording structural issues under
    /// `path` instead of failing fast.
    pub fn classify(
        &self,
        field: &FieldDescriptor,
        path: &str,
        report: &mut ValidationReport,
    ) -> Classification {
        let errors_before = report.errors.len();

        for decl in &field.rules {
            if self.catalog.get(&decl.tag).is_none() {
                report.push_error(
                    ValidationIssue::error(
                        "unknown_rule_tag",
                        path,
                        format!("unknown rule tag '{}'", decl.tag),
                    )
                    .with_hint("register the tag in the rule catalog before compiling"),
                );
            }
        }
        if report.errors.len() > errors_before {
            return Classification::Invalid;
        }

        let partition = partition(&field.rules);
        self.check_nesting_counts(&partition, path, report);

        if partition.field.is_empty() {
            return if report.errors.len() > errors_before {
                Classification::Invalid
            } else {
                Classification::Unruled
            };
        }

        let active: Vec<&RuleDecl> = partition
            .field
            .iter()
            .copied()
            .filter(|decl| self.filter.is_included(decl.group_name()))
            .collect();

        let mut by_category: BTreeMap<RuleCategory, Vec<&RuleDecl>> = BTreeMap::new();
        for decl in &active {
            if let Some(category) = self.catalog.category(&decl.tag) {
                by_category.entry(category).or_default().push(decl);
            }
        }

        for (category, decls) in &by_category {
            if decls.len() > 1 {
                report.push_error(
                    ValidationIssue::error(
                        "ambiguous_rule",
                        path,
                        format!(
                            "more than one {category} rule for field ({})",
                            describe_decls(decls)
                        ),
                    )
                    .with_hint("tag the declarations with distinct groups and include only one"),
                );
            }
        }
        if by_category.len() > 1 {
            let categories: Vec<&str> = by_category.keys().map(RuleCategory::as_str).collect();
            report.push_error(ValidationIssue::error(
                "conflicting_rule_kinds",
                path,
                format!(
                    "field declares {} rules in included groups",
                    categories.join(" and ")
                ),
            ));
        }
        if report.errors.len() > errors_before {
            return Classification::Invalid;
        }

        let Some(decl) = active.first() else {
            debug!(path, "no rule in an included group; field is skipped");
            return Classification::Excluded;
        };

        match self.build(decl, &field.field_type, &partition, path, report) {
            Some(info) if report.errors.len() == errors_before => Classification::Active(info),
            _ => Classification::Invalid,
        }
    }

    fn check_nesting_counts(
        &self,
        partition: &Partition<'_>,
        path: &str,
        report: &mut ValidationReport,
    ) {
        let count = |category: RuleCategory| {
            partition
                .field
                .iter()
                .filter(|decl| self.catalog.category(&decl.tag) == Some(category))
                .count()
        };
        let collections = count(RuleCategory::Collection);
        let maps = count(RuleCategory::Map);

        let checks = [
            (RuleTarget::Element, partition.element.len(), collections, "collection"),
            (RuleTarget::Key, partition.key.len(), maps, "map"),
            (RuleTarget::Value, partition.value.len(), maps, "map"),
        ];
        for (target, found, expected, container) in checks {
            if found != expected {
                report.push_error(
                    ValidationIssue::error(
                        format!("{}_rule_mismatch", target.as_str()),
                        path,
                        format!(
                            "{found} {} rule(s) declared for {expected} {container} rule(s)",
                            target.as_str()
                        ),
                    )
                    .with_hint(format!(
                        "declare exactly one {} rule per {container} rule",
                        target.as_str()
                    )),
                );
            }
        }
    }

    fn build(
        &self,
        decl: &RuleDecl,
        field_type: &FieldType,
        partition: &Partition<'_>,
        path: &str,
        report: &mut ValidationReport,
    ) -> Option<RuleInfo> {
        let spec = self.catalog.get(&decl.tag)?;
        if !spec.accepts.matches(field_type) {
            report.push_error(type_mismatch(decl, field_type, path));
            return None;
        }

        let kind = match spec.category {
            RuleCategory::Basic => RuleKind::Basic,
            RuleCategory::Nested => RuleKind::Nested,
            RuleCategory::Custom => RuleKind::Custom,
            RuleCategory::Collection => {
                let element_type = field_type.element()?;
                let element = self.select_sub(
                    &partition.element,
                    RuleTarget::Element,
                    element_type,
                    path,
                    report,
                )?;
                RuleKind::Collection {
                    element: Box::new(element),
                }
            }
            RuleCategory::Map => {
                let (key_type, value_type) = field_type.map_parts()?;
                let key = self.select_sub(&partition.key, RuleTarget::Key, key_type, path, report);
                let value =
                    self.select_sub(&partition.value, RuleTarget::Value, value_type, path, report);
                RuleKind::Map {
                    key: Box::new(key?),
                    value: Box::new(value?),
                }
            }
        };

        Some(RuleInfo {
            decl: decl.clone(),
            field_type: field_type.clone(),
            kind,
        })
    }

    fn select_sub(
        &self,
        decls: &[&RuleDecl],
        target: RuleTarget,
        sub_type: &FieldType,
        path: &str,
        report: &mut ValidationReport,
    ) -> Option<RuleInfo> {
        let active: Vec<&RuleDecl> = decls
            .iter()
            .copied()
            .filter(|decl| self.filter.is_included(decl.group_name()))
            .collect();

        let decl = match active.as_slice() {
            [decl] => *decl,
            [] => {
                report.push_error(ValidationIssue::error(
                    format!("missing_{}_rule", target.as_str()),
                    path,
                    format!("no {} rule in an included group", target.as_str()),
                ));
                return None;
            }
            many => {
                report.push_error(ValidationIssue::error(
                    format!("ambiguous_{}_rule", target.as_str()),
                    path,
                    format!(
                        "more than one {} rule in included groups ({})",
                        target.as_str(),
                        describe_decls(many)
                    ),
                ));
                return None;
            }
        };

        let spec = self.catalog.get(&decl.tag)?;
        let kind = match spec.category {
            RuleCategory::Basic => RuleKind::Basic,
            RuleCategory::Nested => RuleKind::Nested,
            RuleCategory::Custom => RuleKind::Custom,
            RuleCategory::Collection | RuleCategory::Map => {
                report.push_error(ValidationIssue::error(
                    "nested_container_rule",
                    path,
                    format!(
                        "{} rule '{}' cannot itself be a container rule",
                        target.as_str(),
                        decl.tag
                    ),
                ));
                return None;
            }
        };
        if !spec.accepts.matches(sub_type) {
            report.push_error(type_mismatch(decl, sub_type, path));
            return None;
        }

        Some(RuleInfo {
            decl: decl.clone(),
            field_type: sub_type.clone(),
            kind,
        })
    }
}

fn partition(rules: &[RuleDecl]) -> Partition<'_> {
    let mut partition = Partition {
        field: Vec::new(),
        element: Vec::new(),
        key: Vec::new(),
        value: Vec::new(),
    };
    for decl in rules {
        match decl.target {
            RuleTarget::Field => partition.field.push(decl),
            RuleTarget::Element => partition.element.push(decl),
            RuleTarget::Key => partition.key.push(decl),
            RuleTarget::Value => partition.value.push(decl),
        }
    }
    partition
}

fn type_mismatch(decl: &RuleDecl, field_type: &FieldType, path: &str) -> ValidationIssue {
    ValidationIssue::error(
        "rule_type_mismatch",
        path,
        format!(
            "{} rule '{}' cannot apply to type {field_type}",
            decl.target.as_str(),
            decl.tag
        ),
    )
}

fn describe_decls(decls: &[&RuleDecl]) -> String {
    decls
        .iter()
        .map(|decl| format!("{}@{}", decl.tag, decl.group_name()))
        .collect::<Vec<_>>()
        .join(", ")
}
