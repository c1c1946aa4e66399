use std::collections::BTreeSet;

use dtoforge_core::DEFAULT_GROUP;

/// Set of rule groups that take part in generation.
///
/// Starts with only the implicit default group. The first call to
/// [`GroupFilter::include`] replaces that set; later calls add to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFilter {
    included: BTreeSet<String>,
    default_replaced: bool,
}

impl Default for GroupFilter {
    fn default() -> Self {
        Self {
            included: BTreeSet::from([DEFAULT_GROUP.to_string()]),
            default_replaced: false,
        }
    }
}

impl GroupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.default_replaced {
            self.included.clear();
            self.default_replaced = true;
        }
        self.included.extend(names.into_iter().map(Into::into));
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.included.contains(name)
    }

    pub fn included(&self) -> impl Iterator<Item = &str> {
        self.included.iter().map(String::as_str)
    }
}
