//! Rule classification for dtoforge.
//!
//! Turns a field's raw rule declarations into at most one active
//! [`RuleInfo`], honouring the included rule groups and collecting every
//! structural problem into a [`ValidationReport`] instead of failing on the
//! first one.

pub mod catalog;
pub mod classify;
pub mod errors;
pub mod group;

pub use catalog::{RuleCatalog, RuleCategory, RuleSpec, TypeMatcher};
pub use classify::{Classification, RuleClassifier, RuleInfo, RuleKind};
pub use errors::{ValidationIssue, ValidationReport};
pub use group::GroupFilter;
