// src/transport/peer_link.rs

//! A persistent, reconnecting TCP link to a single peer, carrying
//! length-delimited JSON-encoded `WireMessage`s. The reconnect loop follows
//! `warden::worker::run_pubsub_loop`'s exponential-backoff pattern; the
//! outbound queue is the bounded drop-oldest ring described in spec.md §5.

use super::secure_envelope::SecureEnvelope;
use super::InboundRouter;
use crate::core::constants::MAX_QUEUE_SIZE;
use crate::core::metrics::MESSAGES_DROPPED_TOTAL;
use crate::core::wire::WireMessage;
use crate::core::NodeId;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Notify};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{info, warn};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

struct Queue {
    items: VecDeque<WireMessage>,
}

/// The outbound side of a peer connection: a bounded queue plus the
/// background task that drains it over a reconnecting TCP stream.
pub struct PeerLink {
    peer: NodeId,
    queue: Mutex<Queue>,
    notify: Notify,
    shared_secret: Arc<Option<String>>,
}

impl PeerLink {
    pub fn spawn(peer: NodeId, addr: SocketAddr, shared_secret: Arc<Option<String>>) -> Arc<Self> {
        let link = Arc::new(PeerLink { peer, queue: Mutex::new(Queue { items: VecDeque::new() }), notify: Notify::new(), shared_secret });
        tokio::spawn(link.clone().run(addr));
        link
    }

    /// Enqueues a message for delivery; drops the oldest pending message on
    /// overflow rather than blocking or rejecting the newest (spec.md §5:
    /// "newest-wins is not required — the protocol self-heals").
    pub fn enqueue(&self, msg: WireMessage) {
        let mut q = self.queue.lock();
        if q.items.len() >= MAX_QUEUE_SIZE {
            q.items.pop_front();
            MESSAGES_DROPPED_TOTAL.with_label_values(&[&self.peer.to_string()]).inc();
        }
        q.items.push_back(msg);
        drop(q);
        self.notify.notify_one();
    }

    async fn run(self: Arc<Self>, addr: SocketAddr) {
        let mut reconnect_delay = INITIAL_RECONNECT_DELAY;
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    info!(peer = self.peer, %addr, "connected to peer");
                    reconnect_delay = INITIAL_RECONNECT_DELAY;
                    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
                    if let Err(e) = self.drain_queue(&mut framed).await {
                        warn!(peer = self.peer, "connection to peer lost: {e}");
                    }
                }
                Err(e) => {
                    warn!(peer = self.peer, %addr, "connect failed: {e}, retrying in {:?}", reconnect_delay);
                }
            }
            tokio::time::sleep(reconnect_delay).await;
            reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn drain_queue(&self, framed: &mut Framed<TcpStream, LengthDelimitedCodec>) -> anyhow::Result<()> {
        loop {
            let next = {
                let mut q = self.queue.lock();
                q.items.pop_front()
            };
            match next {
                Some(msg) => {
                    let envelope = SecureEnvelope::seal(msg, &self.shared_secret)?;
                    let encoded = serde_json::to_vec(&envelope)?;
                    framed.send(Bytes::from(encoded)).await?;
                }
                None => {
                    self.notify.notified().await;
                }
            }
        }
    }
}

/// Handles one accepted inbound TCP connection: decodes each length-
/// delimited frame as a `WireMessage` and routes it, until the peer
/// disconnects or shutdown fires.
pub async fn run_inbound_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Arc<dyn InboundRouter>,
    mut shutdown: broadcast::Receiver<()>,
    shared_secret: Arc<Option<String>>,
) {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            frame = framed.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        if let Err(e) = decode_and_route(&bytes, &router, &shared_secret) {
                            warn!(%addr, "dropping malformed or unauthenticated inbound message: {e}");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(%addr, "inbound connection error: {e}");
                        return;
                    }
                    None => return,
                }
            }
        }
    }
}

fn decode_and_route(bytes: &BytesMut, router: &Arc<dyn InboundRouter>, shared_secret: &Option<String>) -> anyhow::Result<()> {
    let envelope: SecureEnvelope = serde_json::from_slice(bytes)?;
    let msg = envelope.open(shared_secret).ok_or_else(|| anyhow::anyhow!("HMAC verification failed"))?;
    router.route(msg);
    Ok(())
}
