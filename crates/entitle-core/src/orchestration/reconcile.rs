//! Infers which services changed state from two snapshots.

use std::collections::BTreeSet;

/// Services that changed state between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub enabled: BTreeSet<String>,
    pub disabled: BTreeSet<String>,
}

impl StateDiff {
    /// `enabled = after - before`, `disabled = before - after`.
    pub fn between(before: &BTreeSet<String>, after: &BTreeSet<String>) -> Self {
        Self {
            enabled: after.difference(before).cloned().collect(),
            disabled: before.difference(after).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}
