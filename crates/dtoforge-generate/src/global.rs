//! Process-wide Global/Static configuration layer.
//!
//! This store outlives any build session and is shared by every thread in
//! the process. Test suites that touch it must take a snapshot first and
//! restore it afterwards; compositions read it once, when compiled.

use std::sync::{LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::config::PartialConfig;
use crate::errors::GenerationError;

static GLOBAL: LazyLock<RwLock<PartialConfig>> =
    LazyLock::new(|| RwLock::new(PartialConfig::default()));

/// Merge `config` into the global layer. Re-setting an attribute to a
/// different value is a conflict; reset or restore first to change it.
pub fn set_global(config: PartialConfig) -> Result<(), GenerationError> {
    let mut global = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    let conflicts = global.conflicts_with(&config);
    if !conflicts.is_empty() {
        return Err(GenerationError::ConfigurationConflict(format!(
            "global attribute(s) already set to a different value: {}",
            conflicts.join(", ")
        )));
    }
    global.overlay(&config);
    debug!("global configuration updated");
    Ok(())
}

pub fn global_snapshot() -> PartialConfig {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn restore_global(snapshot: PartialConfig) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
}

pub fn reset_global() {
    restore_global(PartialConfig::default());
}
