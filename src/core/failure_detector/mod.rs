// src/core/failure_detector/mod.rs

//! The `(N, Theta)` failure detector (spec.md §4.1): an all-to-all token
//! exchange where receiving a token from `j` both vouches for `j` and, via
//! the `beat` counters, ages out every other processor not recently heard
//! from transitively.

use crate::core::capabilities::FailureDetectorView;
use crate::core::constants::{BEAT_THRESHOLD, FD_SLEEP, MONITOR_MAX};
use crate::core::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Sends a best-effort FD token to a peer over the UDP-style channel
/// described in spec.md §6.3; implemented by `transport::FdLink`.
pub trait FdSender: Send + Sync {
    fn send_token(&self, to: NodeId);
}

struct FdInner {
    beat: Vec<u32>,
    monitor: Vec<u32>,
    fd_set: BTreeSet<NodeId>,
}

impl FdInner {
    fn new(n: u32, id: NodeId) -> Self {
        let mut fd_set = BTreeSet::new();
        fd_set.insert(id);
        FdInner { beat: vec![0; n as usize], monitor: vec![0; n as usize], fd_set }
    }
}

pub struct FailureDetectorModule {
    id: NodeId,
    n: u32,
    inner: Mutex<FdInner>,
    sender: Arc<dyn FdSender>,
    inbound_tx: mpsc::UnboundedSender<NodeId>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<NodeId>>,
}

impl FailureDetectorModule {
    pub fn new(id: NodeId, n: u32, sender: Arc<dyn FdSender>) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(FailureDetectorModule {
            id,
            n,
            inner: Mutex::new(FdInner::new(n, id)),
            sender,
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
        })
    }

    /// Called by the transport receive path when a token arrives from `j`.
    pub fn receive_msg(&self, sender: NodeId) {
        let _ = self.inbound_tx.send(sender);
    }

    /// `upon_token_from_pj`: a token from `j` resets `beat[j]`/`beat[i]`,
    /// bumps both stability counters (saturating at `MONITOR_MAX`), and ages
    /// every third-party `beat` counter, recomputing `fd_set` as every
    /// processor whose beat counter has not yet crossed `BEAT_THRESHOLD`.
    fn upon_token_from_pj(&self, processor_j: NodeId) {
        let mut inner = self.inner.lock();
        let j = processor_j as usize;
        let i = self.id as usize;
        inner.beat[j] = 0;
        inner.beat[i] = 0;
        inner.monitor[j] = (inner.monitor[j] + 1).min(MONITOR_MAX);
        inner.monitor[i] = (inner.monitor[j] + 1).min(MONITOR_MAX);

        let mut new_fd_set = BTreeSet::new();
        new_fd_set.insert(processor_j);
        new_fd_set.insert(self.id);
        for other in 0..self.n {
            if other == self.id || other == processor_j {
                continue;
            }
            inner.beat[other as usize] += 1;
            if inner.beat[other as usize] < BEAT_THRESHOLD {
                new_fd_set.insert(other);
            }
        }
        inner.fd_set = new_fd_set;
    }

    /// Exercises `upon_token_from_pj` directly, so tests can drive a single
    /// token delivery deterministically instead of going through `run`'s
    /// channel-polling loop.
    pub fn deliver_token(&self, processor_j: NodeId) {
        self.upon_token_from_pj(processor_j);
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(node = self.id, "Failure detector loop starting");
        // Kicks off the all-to-all exchange: every other node only ever
        // replies to a token it receives, so somebody has to send first.
        for peer in 0..self.n {
            if peer != self.id {
                self.sender.send_token(peer);
            }
        }
        loop {
            let next = {
                let mut rx = self.inbound_rx.lock();
                rx.try_recv().ok()
            };
            if let Some(processor_j) = next {
                self.upon_token_from_pj(processor_j);
                self.sender.send_token(processor_j);
                continue;
            }
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(node = self.id, "Failure detector loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(FD_SLEEP) => {}
            }
        }
    }

    pub fn get_data(&self) -> serde_json::Value {
        let inner = self.inner.lock();
        serde_json::json!({
            "beat": inner.beat,
            "monitor": inner.monitor,
            "fd_set": inner.fd_set,
        })
    }
}

impl FailureDetectorView for FailureDetectorModule {
    fn trusted(&self) -> BTreeSet<NodeId> {
        self.inner.lock().fd_set.clone()
    }

    fn reset_monitor(&self, peer: NodeId) {
        self.inner.lock().monitor[peer as usize] = 0;
    }

    fn stable_monitor(&self, peer: NodeId) -> bool {
        self.inner.lock().monitor[peer as usize] == MONITOR_MAX
    }
}
