// src/core/wire.rs

//! The inter-node wire protocol (spec.md §6.3). Messages are self-describing
//! records tagged by `type`, mirroring `original_source/resolve/enums.py`'s
//! `MessageType` and the per-module payload shapes.

use crate::core::NodeId;
use crate::core::recsa::{ConfigValue, Notification};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The RecSA state packet a processor broadcasts to every trusted peer each
/// tick. Field names follow spec.md §4.2's "Broadcast" step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecsaPayload {
    pub fd: BTreeSet<NodeId>,
    pub fd_part: BTreeSet<NodeId>,
    pub config: ConfigValue,
    pub prp: Notification,
    pub alll: bool,
    pub echo_fd_part: BTreeSet<NodeId>,
    pub echo_prp: Notification,
    pub echo_all: bool,
}

/// The small `{no_maj, need_reconf}` echo RecMA exchanges with participants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecmaPayload {
    pub no_maj: bool,
    pub need_reconf: bool,
}

/// The Joining Mechanism's request/response payloads (spec.md §4.4 / §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JoinPayload {
    /// A non-participant's request to be admitted.
    Join,
    /// A participant's response to a join request.
    Response { pass: bool, state: Vec<u8> },
}

/// The ABD application's read/write coordination payloads (spec.md §6.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum AbdPayload {
    ReadRequest,
    ReadRequestAck { label: u64 },
    ReadConfirm { label: u64 },
    ReadConfirmAck,
    Write { label: u64 },
    WriteAck,
}

/// The closed union of every message kind routed by the dispatcher, tagged
/// by its `type` field exactly as spec.md §6.3 specifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    Recsa { sender: NodeId, data: RecsaPayload },
    Recma { sender: NodeId, data: RecmaPayload },
    FailureDetector { sender: NodeId },
    Joining { sender: NodeId, data: JoinPayload },
    Abd { sender: NodeId, data: AbdPayload },
}

impl WireMessage {
    pub fn sender(&self) -> NodeId {
        match self {
            WireMessage::Recsa { sender, .. }
            | WireMessage::Recma { sender, .. }
            | WireMessage::FailureDetector { sender }
            | WireMessage::Joining { sender, .. }
            | WireMessage::Abd { sender, .. } => *sender,
        }
    }
}
