// src/core/capabilities.rs

//! Narrow, trait-based capability interfaces that replace a singleton
//! resolver/facade (see DESIGN.md §4.5). Every long-running module is
//! constructed with `Arc<dyn ...>` handles for exactly the collaborators it
//! needs, instead of holding a back-reference into a shared god-object.

use crate::core::NodeId;
use crate::core::recsa::ConfigValue;
use crate::core::wire::WireMessage;
use std::collections::BTreeSet;

/// What RecSA needs from the failure detector.
pub trait FailureDetectorView: Send + Sync {
    /// The set of processors currently vouched for as live, always including self.
    fn trusted(&self) -> BTreeSet<NodeId>;
    /// Resets the stability counter tracked for a given peer.
    fn reset_monitor(&self, peer: NodeId);
    /// True iff the monitor counter for `peer` has saturated, i.e. it has
    /// been observed stable for `MONITOR_MAX` consecutive rounds.
    fn stable_monitor(&self, peer: NodeId) -> bool;
}

/// What RecMA, the Joining Mechanism, and the ABD application need from RecSA.
pub trait ConfigurationView: Send + Sync {
    /// `get_config()` per spec.md §4.2.
    fn get_config(&self) -> ConfigValue;
    /// `get_config_app()` per spec.md §4.2 / §6.2.
    fn get_config_app(&self) -> BTreeSet<NodeId>;
    /// `allow_reco()` per spec.md §4.2.
    fn allow_reco(&self) -> bool;
    /// `estab(s)` per spec.md §4.2.
    fn estab(&self, proposed: BTreeSet<NodeId>);
    /// `participate()` per spec.md §4.2.
    fn participate(&self);
    /// `get_fd_j(j)` per spec.md §4.2.
    fn fd_j(&self, j: NodeId) -> BTreeSet<NodeId>;
    /// `get_fd_part_j(j)` per spec.md §4.2.
    fn fd_part_j(&self, j: NodeId) -> BTreeSet<NodeId>;
}

/// Outbound message delivery, implemented by the transport layer.
pub trait Transport: Send + Sync {
    /// Best-effort enqueue of a message to a peer's ordered per-peer queue.
    /// Never blocks: on a full queue the oldest pending message is dropped.
    fn send(&self, to: NodeId, msg: WireMessage);
}
