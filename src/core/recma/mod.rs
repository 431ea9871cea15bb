// src/core/recma/mod.rs

//! Reconfiguration Management (Algorithm 3.2). Watches the active
//! configuration and decides when and what to reconfigure via RecSA's
//! `estab` interface.

use crate::core::capabilities::{ConfigurationView, Transport};
use crate::core::constants::RUN_SLEEP;
use crate::core::metrics::MESSAGES_SENT_TOTAL;
use crate::core::wire::{RecmaPayload, WireMessage};
use crate::core::recsa::ConfigValue;
use crate::core::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Default)]
struct RecmaInner {
    need_reconf: BTreeMap<NodeId, bool>,
    no_maj: BTreeMap<NodeId, bool>,
    prev_config: Option<Vec<NodeId>>,
}

pub struct RecmaModule {
    id: NodeId,
    n: u32,
    quorum_size: u32,
    recsa: Arc<dyn ConfigurationView>,
    transport: Arc<dyn Transport>,
    inner: Mutex<RecmaInner>,
    msgs_sent: AtomicU64,
}

impl RecmaModule {
    pub fn new(id: NodeId, n: u32, recsa: Arc<dyn ConfigurationView>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_quorum_size(id, n, recsa, transport, (n).div_ceil(2))
    }

    /// Exposed separately so tests can exercise non-default quorum sizes.
    pub fn with_quorum_size(
        id: NodeId,
        n: u32,
        recsa: Arc<dyn ConfigurationView>,
        transport: Arc<dyn Transport>,
        quorum_size: u32,
    ) -> Arc<Self> {
        Arc::new(RecmaModule {
            id,
            n,
            quorum_size,
            recsa,
            transport,
            inner: Mutex::new(RecmaInner::default()),
            msgs_sent: AtomicU64::new(0),
        })
    }

    fn get_need_reconf_j(&self, inner: &RecmaInner, j: NodeId) -> bool {
        inner.need_reconf.get(&j).copied().unwrap_or(false)
    }

    fn get_no_maj_j(&self, inner: &RecmaInner, j: NodeId) -> bool {
        inner.no_maj.get(&j).copied().unwrap_or(false)
    }

    /// `flush_flags`: clears `need_reconf`/`no_maj` for every processor
    /// currently trusted by the failure detector.
    fn flush_flags(&self, inner: &mut RecmaInner) {
        for j in self.recsa.fd_j(self.id) {
            inner.need_reconf.insert(j, false);
            inner.no_maj.insert(j, false);
        }
    }

    /// Exercises `flush_flags` on demand, so tests can drive it the same
    /// way `tick()` is already exposed for deterministic single-step runs.
    pub fn flush_flags_now(&self) {
        let mut inner = self.inner.lock();
        self.flush_flags(&mut inner);
    }

    /// `core()`: the intersection of `fd_part_j` across every member of
    /// `fd_part_i`, i.e. the set of processors every currently-trusted
    /// participant itself trusts.
    pub fn core(&self) -> Vec<NodeId> {
        let fd_i_part = self.recsa.fd_part_j(self.id);
        let mut it = fd_i_part.iter();
        let Some(&first) = it.next() else { return Vec::new() };
        let mut core_set = self.recsa.fd_part_j(first);
        for &j in it {
            let fd_j_part = self.recsa.fd_part_j(j);
            core_set = core_set.intersection(&fd_j_part).copied().collect();
        }
        core_set.into_iter().collect()
    }

    /// `eval_config(conf)`: suggests reconfiguration when under three
    /// quarters of the configuration, or fewer than `quorum_size` of it,
    /// is currently trusted.
    pub fn eval_config(&self, conf: &[NodeId]) -> bool {
        let fd_i = self.recsa.fd_j(self.id);
        let num_trusted = conf.iter().filter(|j| fd_i.contains(j)).count() as u32;
        let num_members = conf.len() as u32;
        num_trusted * 4 < 3 * num_members || num_trusted < self.quorum_size
    }

    fn send_state(&self, inner: &RecmaInner, receiver: NodeId) {
        if receiver == self.id {
            return;
        }
        let payload = RecmaPayload {
            no_maj: self.get_no_maj_j(inner, self.id),
            need_reconf: self.get_need_reconf_j(inner, self.id),
        };
        self.transport.send(receiver, WireMessage::Recma { sender: self.id, data: payload });
        self.msgs_sent.fetch_add(1, Ordering::Relaxed);
        MESSAGES_SENT_TOTAL.with_label_values(&["recma"]).inc();
    }

    pub fn receive_msg(&self, sender: NodeId, data: RecmaPayload) {
        let mut inner = self.inner.lock();
        inner.no_maj.insert(sender, data.no_maj);
        inner.need_reconf.insert(sender, data.need_reconf);
    }

    /// One pass of Algorithm 3.2's do-forever body.
    pub fn tick(&self) {
        if !self.recsa.fd_part_j(self.id).contains(&self.id) {
            debug!(node = self.id, "RecMA skipping tick, not a participant");
            return;
        }
        let mut inner = self.inner.lock();

        let cur_config = match self.recsa.get_config() {
            ConfigValue::Set(s) => s.into_iter().collect::<Vec<_>>(),
            _ => Vec::new(),
        };

        inner.need_reconf.insert(self.id, false);
        inner.no_maj.insert(self.id, false);

        let prev_differs = inner.prev_config.as_ref().map(|p| {
            let prev: std::collections::BTreeSet<_> = p.iter().copied().collect();
            let cur: std::collections::BTreeSet<_> = cur_config.iter().copied().collect();
            prev != cur
        }).unwrap_or(false);
        if prev_differs {
            self.flush_flags(&mut inner);
        }

        if self.recsa.allow_reco() {
            inner.prev_config = Some(cur_config.clone());

            let fd_i = self.recsa.fd_j(self.id);
            let trusted_members = cur_config.iter().filter(|j| fd_i.contains(j)).count() as u32;
            let no_maj = trusted_members < (cur_config.len() as u32 / 2) + 1;
            inner.no_maj.insert(self.id, no_maj);
            if no_maj {
                debug!(node = self.id, "no_maj detected");
            }

            let core = self.core();
            let core_no_maj = core.iter().any(|k| self.get_no_maj_j(&inner, *k));
            if self.get_no_maj_j(&inner, self.id) && core.len() > 1 && core_no_maj {
                let proposed = self.recsa.fd_part_j(self.id);
                self.recsa.estab(proposed);
                self.flush_flags(&mut inner);
            } else {
                let need = self.eval_config(&cur_config);
                inner.need_reconf.insert(self.id, need);
                if need {
                    debug!(node = self.id, "need_reconf detected");
                }
                let agreeing = cur_config
                    .iter()
                    .filter(|j| fd_i.contains(j) && self.get_need_reconf_j(&inner, **j))
                    .count() as u32;
                if self.get_need_reconf_j(&inner, self.id) && agreeing > (cur_config.len() as u32 / 2) {
                    let proposed = self.recsa.fd_part_j(self.id);
                    self.recsa.estab(proposed);
                    self.flush_flags(&mut inner);
                }
            }
        }

        for j in self.recsa.fd_part_j(self.id) {
            self.send_state(&inner, j);
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(node = self.id, "RecMA loop starting");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(node = self.id, "RecMA loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(RUN_SLEEP) => {
                    self.tick();
                }
            }
        }
    }

    pub fn get_data(&self) -> serde_json::Value {
        let inner = self.inner.lock();
        serde_json::json!({ "need_reconf": inner.need_reconf, "no_maj": inner.no_maj })
    }
}
