// src/core/recsa/state.rs

//! Data types and the coherent per-processor state bundle for RecSA.
//! Grounded on `warden::state::MasterState`: one struct holds every dynamic
//! field for the entity, guarded by a single lock, rather than a `DashMap`
//! per field.

use crate::core::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The value stored at `config[k]`: either a quorum set, an explicit
/// "not a participant" marker, or `BOTTOM` (no known value / mid-reset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigValue {
    Set(BTreeSet<NodeId>),
    NotParticipant,
    Bottom,
}

impl ConfigValue {
    pub fn as_set(&self) -> Option<&BTreeSet<NodeId>> {
        match self {
            ConfigValue::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, ConfigValue::Bottom)
    }

    pub fn is_not_participant(&self) -> bool {
        matches!(self, ConfigValue::NotParticipant)
    }
}

/// The set carried by a reconfiguration proposal, or `BOTTOM` for "none".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalSet {
    Bottom,
    Set(BTreeSet<NodeId>),
}

impl ProposalSet {
    pub fn as_set(&self) -> Option<&BTreeSet<NodeId>> {
        match self {
            ProposalSet::Set(s) => Some(s),
            ProposalSet::Bottom => None,
        }
    }
}

/// A `(phase, set)` pair: the local notification regarding an in-flight
/// configuration-replacement proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub phase: u8,
    pub set: ProposalSet,
}

impl Default for Notification {
    /// `DFLT_NTF = (0, BOTTOM)`.
    fn default() -> Self {
        Notification { phase: 0, set: ProposalSet::Bottom }
    }
}

/// `max_lex(s1, s2)`: the lexicographically-greater of two proposal sets,
/// where an absent side (`BOTTOM`) always loses. Ties among equal-length
/// sets resolve by comparing their sorted element vectors, matching
/// `original_source/modules/recsa/module.py`'s `max_lex`.
pub fn max_lex(s1: &ProposalSet, s2: &ProposalSet) -> ProposalSet {
    match (s1, s2) {
        (ProposalSet::Bottom, _) => s2.clone(),
        (_, ProposalSet::Bottom) => s1.clone(),
        (ProposalSet::Set(a), ProposalSet::Set(b)) => {
            let va: Vec<_> = a.iter().copied().collect();
            let vb: Vec<_> = b.iter().copied().collect();
            if va >= vb { s1.clone() } else { s2.clone() }
        }
    }
}

/// Everything RecSA tracks about every processor it has heard from,
/// including itself. One lock guards the whole bundle so that predicate
/// evaluation never observes a torn update from `receive_msg`.
#[derive(Debug, Clone)]
pub struct RecsaInner {
    pub config: BTreeMap<NodeId, ConfigValue>,
    pub fd: BTreeMap<NodeId, BTreeSet<NodeId>>,
    pub fd_part: BTreeMap<NodeId, BTreeSet<NodeId>>,
    pub echo_part: BTreeMap<NodeId, BTreeSet<NodeId>>,
    pub echo_prp: BTreeMap<NodeId, Notification>,
    pub echo_all: BTreeMap<NodeId, bool>,
    pub prp: BTreeMap<NodeId, Notification>,
    pub alll: BTreeMap<NodeId, bool>,
    pub all_seen: BTreeSet<NodeId>,
}

impl RecsaInner {
    /// `p_i` starts out believing it is not a participant, awaiting either
    /// an externally-injected initial configuration or admission via the
    /// Joining Mechanism.
    pub fn new(id: NodeId, self_trusted: BTreeSet<NodeId>) -> Self {
        let mut config = BTreeMap::new();
        config.insert(id, ConfigValue::Bottom);
        let mut fd = BTreeMap::new();
        fd.insert(id, self_trusted);
        let mut fd_part = BTreeMap::new();
        fd_part.insert(id, BTreeSet::new());
        RecsaInner {
            config,
            fd,
            fd_part,
            echo_part: BTreeMap::new(),
            echo_prp: BTreeMap::new(),
            echo_all: BTreeMap::new(),
            prp: BTreeMap::new(),
            alll: BTreeMap::new(),
            all_seen: BTreeSet::new(),
        }
    }

    /// An unknown `j` is reported as an empty quorum set, not `NotParticipant`
    /// — this matches `get_config_j`'s Python default (`[]`, not the
    /// `NOT_PARTICIPANT` sentinel), which a processor can observe for a peer
    /// it has seen in `fd` but not yet received a RecSA message from.
    pub fn get_config_j(&self, j: NodeId) -> ConfigValue {
        self.config
            .get(&j)
            .cloned()
            .unwrap_or_else(|| ConfigValue::Set(BTreeSet::new()))
    }

    pub fn get_fd_part_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        self.fd_part.get(&j).cloned().unwrap_or_default()
    }

    pub fn get_echo_part_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        self.echo_part.get(&j).cloned().unwrap_or_default()
    }

    pub fn get_prp_j(&self, j: NodeId) -> Notification {
        self.prp.get(&j).cloned().unwrap_or_default()
    }

    pub fn get_echo_prp_j(&self, j: NodeId) -> Notification {
        self.echo_prp.get(&j).cloned().unwrap_or_default()
    }

    pub fn get_all_j(&self, j: NodeId) -> bool {
        self.alll.get(&j).copied().unwrap_or(false)
    }

    pub fn get_echo_all_j(&self, j: NodeId) -> bool {
        self.echo_all.get(&j).copied().unwrap_or(false)
    }

    /// `config_set(val)`: resets `config[k]` to `val` for every `k` in
    /// `[0, n)` and clears every local notification.
    pub fn config_set(&mut self, n: u32, val: ConfigValue) {
        for k in 0..n {
            self.config.insert(k, val.clone());
            self.prp.insert(k, Notification::default());
        }
    }
}
