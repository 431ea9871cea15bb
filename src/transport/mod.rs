// src/transport/mod.rs

//! Point-to-point messaging: one persistent reliable TCP link per peer for
//! `WireMessage`s, plus a best-effort UDP channel for failure-detector
//! tokens (spec.md §6.3). Grounded on the teacher's
//! `warden::worker::run_pubsub_loop` (persistent reconnect-with-backoff
//! client) and `cluster::gossip::run` (UDP send/receive loop).

mod fd_link;
mod peer_link;
mod secure_envelope;

pub use fd_link::FdLink;
pub use peer_link::PeerLink;
pub use secure_envelope::SecureEnvelope;

use crate::config::NodeRecord;
use crate::core::byzantine::{ByzantineBehavior, ByzantineSwitch};
use crate::core::capabilities::Transport;
use crate::core::wire::WireMessage;
use crate::core::NodeId;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;
use tracing::warn;

/// Owns every outbound peer link and the inbound TCP/UDP listeners. One
/// instance per process; implements `Transport` for the control-plane
/// modules and is the single place that consults the Byzantine test-mode
/// switch before a send goes out.
pub struct TransportHandle {
    id: NodeId,
    links: DashMap<NodeId, Arc<PeerLink>>,
    fd_link: Arc<FdLink>,
    byzantine: ByzantineSwitch,
    shared_secret: Arc<Option<String>>,
}

/// Everything a `TransportHandle` needs to route an inbound message once
/// decoded, implemented by `server::dispatcher::Dispatcher`.
pub trait InboundRouter: Send + Sync {
    fn route(&self, msg: WireMessage);
    fn route_fd_token(&self, sender: NodeId);
}

impl TransportHandle {
    pub async fn bind(
        id: NodeId,
        listen_port: u16,
        fd_port: u16,
        peers: &BTreeMap<NodeId, NodeRecord>,
        byzantine: ByzantineSwitch,
        shared_secret: Option<String>,
    ) -> anyhow::Result<(Arc<Self>, TcpListener, Arc<UdpSocket>)> {
        let tcp = TcpListener::bind(("0.0.0.0", listen_port)).await?;
        let udp = Arc::new(UdpSocket::bind(("0.0.0.0", fd_port)).await?);
        let shared_secret = Arc::new(shared_secret);

        let links = DashMap::new();
        for (peer_id, record) in peers {
            if *peer_id == id {
                continue;
            }
            let addr = SocketAddr::new(record.ip, record.port);
            links.insert(*peer_id, PeerLink::spawn(*peer_id, addr, shared_secret.clone()));
        }
        let fd_link = FdLink::new(id, peers.iter().filter(|(k, _)| **k != id).map(|(k, v)| (*k, SocketAddr::new(v.ip, v.port))).collect());
        fd_link.attach(udp.clone());

        let handle = Arc::new(TransportHandle { id, links, fd_link: Arc::new(fd_link), byzantine, shared_secret });
        Ok((handle, tcp, udp))
    }

    /// Registers or replaces the outbound link for a newly-joined peer
    /// (triggered by `/publish_node`, spec.md §6.4).
    pub fn add_peer(&self, peer_id: NodeId, addr: SocketAddr) {
        if peer_id == self.id {
            return;
        }
        self.links.insert(peer_id, PeerLink::spawn(peer_id, addr, self.shared_secret.clone()));
    }

    pub fn fd_link(&self) -> Arc<FdLink> {
        self.fd_link.clone()
    }

    pub fn shared_secret(&self) -> Arc<Option<String>> {
        self.shared_secret.clone()
    }

    /// Runs the inbound TCP accept loop, decoding length-delimited JSON
    /// frames and handing them to `router`. One task per accepted
    /// connection, matching the teacher's `connection_loop` pattern of
    /// spawning a handler per accepted stream.
    pub async fn run_tcp_acceptor(
        listener: TcpListener,
        router: Arc<dyn InboundRouter>,
        shared_secret: Arc<Option<String>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let router = router.clone();
                            let shutdown_rx = shutdown.resubscribe();
                            let shared_secret = shared_secret.clone();
                            tokio::spawn(peer_link::run_inbound_connection(stream, addr, router, shutdown_rx, shared_secret));
                        }
                        Err(e) => warn!("accept() failed: {e}"),
                    }
                }
            }
        }
    }

    /// Runs the inbound UDP receive loop for failure-detector tokens.
    pub async fn run_udp_receiver(socket: Arc<UdpSocket>, router: Arc<dyn InboundRouter>, mut shutdown: broadcast::Receiver<()>) {
        let mut buf = [0u8; 16];
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((n, _addr)) => {
                            if let Ok(sender) = fd_link::decode_token(&buf[..n]) {
                                router.route_fd_token(sender);
                            }
                        }
                        Err(e) => warn!("UDP recv failed: {e}"),
                    }
                }
            }
        }
    }
}

impl Transport for TransportHandle {
    fn send(&self, to: NodeId, msg: WireMessage) {
        match self.byzantine.current() {
            ByzantineBehavior::Silent => return,
            ByzantineBehavior::Duplicate => {
                if let Some(link) = self.links.get(&to) {
                    link.enqueue(msg.clone());
                    link.enqueue(msg);
                }
                return;
            }
            _ => {}
        }
        if let Some(link) = self.links.get(&to) {
            link.enqueue(msg);
        }
    }
}
