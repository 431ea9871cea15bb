// src/core/byzantine.rs

//! Named Byzantine test-mode hooks. These select among deliberately
//! misbehaving message-send strategies for fault-injection testing; they do
//! not participate in, and cannot be relied on for, the safety argument
//! carried by RecSA/RecMA/JM.

use parking_lot::RwLock;
use std::sync::Arc;

/// A selectable misbehavior. `Silent` drops every outbound send; `Stale`
/// keeps resending a snapshot taken at activation time regardless of actual
/// state; `Duplicate` sends each message twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByzantineBehavior {
    None,
    Silent,
    Stale,
    Duplicate,
}

impl ByzantineBehavior {
    pub const ALL: &'static [ByzantineBehavior] = &[
        ByzantineBehavior::None,
        ByzantineBehavior::Silent,
        ByzantineBehavior::Stale,
        ByzantineBehavior::Duplicate,
    ];
}

/// Process-wide switch read by the transport layer before every send.
/// Exposed via `/set-byz-behavior` and `/byz-behaviors` (spec.md §6.4).
#[derive(Clone)]
pub struct ByzantineSwitch(Arc<RwLock<ByzantineBehavior>>);

impl ByzantineSwitch {
    pub fn new() -> Self {
        ByzantineSwitch(Arc::new(RwLock::new(ByzantineBehavior::None)))
    }

    pub fn current(&self) -> ByzantineBehavior {
        *self.0.read()
    }

    pub fn set(&self, behavior: ByzantineBehavior) {
        *self.0.write() = behavior;
    }
}

impl Default for ByzantineSwitch {
    fn default() -> Self {
        Self::new()
    }
}
