// src/core/joining/mod.rs

//! Joining Mechanism (Algorithm 3.3): lets a non-participant processor be
//! admitted into the current configuration by majority consent from its
//! trusted members.

use crate::core::capabilities::{ConfigurationView, Transport};
use crate::core::constants::RUN_SLEEP;
use crate::core::metrics::MESSAGES_SENT_TOTAL;
use crate::core::recsa::ConfigValue;
use crate::core::wire::{JoinPayload, WireMessage};
use crate::core::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Opaque application state exchanged between a joining processor and an
/// existing member; the ABD register layer is the primary consumer.
pub type AppState = Vec<u8>;

#[derive(Default)]
struct JoiningInner {
    pass: BTreeMap<NodeId, bool>,
    state: BTreeMap<NodeId, AppState>,
}

pub struct JoiningModule {
    id: NodeId,
    recsa: Arc<dyn ConfigurationView>,
    transport: Arc<dyn Transport>,
    inner: Mutex<JoiningInner>,
    my_state: Mutex<AppState>,
    pass_query: Box<dyn Fn() -> bool + Send + Sync>,
    msgs_sent: AtomicU64,
}

impl JoiningModule {
    pub fn new(id: NodeId, recsa: Arc<dyn ConfigurationView>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_pass_query(id, recsa, transport, || true)
    }

    /// `pass_query` is pluggable per spec.md §4.4; defaults to always-true.
    pub fn with_pass_query(
        id: NodeId,
        recsa: Arc<dyn ConfigurationView>,
        transport: Arc<dyn Transport>,
        pass_query: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(JoiningModule {
            id,
            recsa,
            transport,
            inner: Mutex::new(JoiningInner::default()),
            my_state: Mutex::new(Vec::new()),
            pass_query: Box::new(pass_query),
            msgs_sent: AtomicU64::new(0),
        })
    }

    pub fn set_local_state(&self, state: AppState) {
        *self.my_state.lock() = state;
    }

    /// `flush_arrays`: clears `pass`/`state` for every peer trusted by the
    /// failure detector, matching the more complete of the two variants
    /// named in this crate's design notes.
    fn flush_arrays(&self, inner: &mut JoiningInner) {
        inner.pass.clear();
        inner.state.clear();
        for j in self.recsa.fd_j(self.id) {
            inner.pass.insert(j, false);
        }
    }

    fn send_join_request(&self, receiver: NodeId) {
        if receiver == self.id {
            return;
        }
        self.transport.send(
            receiver,
            WireMessage::Joining { sender: self.id, data: JoinPayload::Join },
        );
        self.msgs_sent.fetch_add(1, Ordering::Relaxed);
        MESSAGES_SENT_TOTAL.with_label_values(&["joining"]).inc();
    }

    fn send_response(&self, receiver: NodeId) {
        let state = self.my_state.lock().clone();
        self.transport.send(
            receiver,
            WireMessage::Joining {
                sender: self.id,
                data: JoinPayload::Response { pass: (self.pass_query)(), state },
            },
        );
        self.msgs_sent.fetch_add(1, Ordering::Relaxed);
        MESSAGES_SENT_TOTAL.with_label_values(&["joining"]).inc();
    }

    fn receive_join_request(&self, sender: NodeId) {
        if !self.recsa.fd_j(self.id).contains(&sender) {
            return;
        }
        if self.recsa.fd_part_j(self.id).contains(&sender) {
            return;
        }
        let cur = self.recsa.get_config();
        let i_am_member = matches!(&cur, ConfigValue::Set(s) if s.contains(&self.id));
        if i_am_member && self.recsa.allow_reco() {
            self.send_response(sender);
        }
    }

    fn receive_response(&self, sender: NodeId, pass: bool, state: AppState) {
        let mut inner = self.inner.lock();
        inner.pass.insert(sender, pass);
        inner.state.insert(sender, state);
    }

    pub fn receive_msg(&self, sender: NodeId, data: JoinPayload) {
        match data {
            JoinPayload::Join => self.receive_join_request(sender),
            JoinPayload::Response { pass, state } => self.receive_response(sender, pass, state),
        }
    }

    /// `init_vars(state)`: seeds application state from the collected
    /// responses once majority consent is reached. The default
    /// implementation picks an arbitrary responding member's state; callers
    /// needing deterministic merge semantics should subclass via composition.
    fn init_vars(&self, inner: &JoiningInner) {
        if let Some((_, state)) = inner.state.iter().next() {
            *self.my_state.lock() = state.clone();
        }
    }

    /// One pass of Algorithm 3.3's do-forever body.
    pub fn tick(&self) {
        if self.recsa.fd_part_j(self.id).contains(&self.id) {
            return;
        }
        let cur = self.recsa.get_config();
        let com_conf: Vec<NodeId> = match cur {
            ConfigValue::Set(s) => s.into_iter().collect(),
            ConfigValue::Bottom | ConfigValue::NotParticipant => Vec::new(),
        };

        let fd_i = self.recsa.fd_j(self.id);
        let (passing, allow) = {
            let inner = self.inner.lock();
            let passing = com_conf
                .iter()
                .filter(|j| fd_i.contains(j) && inner.pass.get(j).copied().unwrap_or(false))
                .count();
            (passing, self.recsa.allow_reco())
        };

        if allow && (passing as u32) * 2 > com_conf.len() as u32 {
            {
                let inner = self.inner.lock();
                self.init_vars(&inner);
            }
            info!(node = self.id, "Calling participate()");
            self.recsa.participate();
        } else if !allow {
            let mut inner = self.inner.lock();
            self.flush_arrays(&mut inner);
        }

        for j in com_conf {
            self.send_join_request(j);
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(node = self.id, "Joining Mechanism loop starting");
        {
            let mut inner = self.inner.lock();
            self.flush_arrays(&mut inner);
        }
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(node = self.id, "Joining Mechanism loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(RUN_SLEEP) => {
                    if !self.recsa.fd_part_j(self.id).contains(&self.id) {
                        self.tick();
                    } else {
                        debug!(node = self.id, "already a participant, JM idle");
                    }
                }
            }
        }
    }

    pub fn get_data(&self) -> serde_json::Value {
        let inner = self.inner.lock();
        serde_json::json!({
            "pass": inner.pass,
            "state_known_for": inner.state.keys().collect::<Vec<_>>(),
        })
    }
}
