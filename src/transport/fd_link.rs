// src/transport/fd_link.rs

//! Best-effort UDP channel carrying failure-detector tokens. Grounded on
//! `cluster::gossip`'s UDP send loop, simplified to the FD's one-field
//! payload (spec.md §6.3: "FD: token with empty payload").

use crate::core::failure_detector::FdSender;
use crate::core::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::warn;

/// A token carries only the sender's id; bincode-encoded to stay tiny and
/// match the teacher's choice of bincode for its UDP gossip payloads.
#[derive(Debug, Clone, Copy, bincode::Encode, bincode::Decode)]
struct Token {
    sender: u32,
}

pub fn decode_token(bytes: &[u8]) -> anyhow::Result<NodeId> {
    let (token, _): (Token, usize) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(token.sender)
}

fn encode_token(sender: NodeId) -> Vec<u8> {
    bincode::encode_to_vec(Token { sender }, bincode::config::standard()).unwrap_or_default()
}

pub struct FdLink {
    id: NodeId,
    peers: BTreeMap<NodeId, SocketAddr>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl FdLink {
    pub fn new(id: NodeId, peers: BTreeMap<NodeId, SocketAddr>) -> Self {
        FdLink { id, peers, socket: Mutex::new(None) }
    }

    /// Attaches the bound UDP socket shared across all outbound token
    /// sends for this process.
    pub fn attach(&self, socket: Arc<UdpSocket>) {
        *self.socket.lock() = Some(socket);
    }
}

impl FdSender for FdLink {
    fn send_token(&self, to: NodeId) {
        let Some(addr) = self.peers.get(&to).copied() else { return };
        let Some(socket) = self.socket.lock().clone() else { return };
        let id = self.id;
        let encoded = encode_token(id);
        tokio::spawn(async move {
            if let Err(e) = socket.send_to(&encoded, addr).await {
                warn!(peer = to, "failed to send FD token: {e}");
            }
        });
    }
}
