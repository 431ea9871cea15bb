// src/core/recsa/mod.rs

//! Reconfiguration Stability Assurance (Algorithm 3.1). Keeps every
//! processor's view of the current quorum configuration self-stabilizing
//! in the presence of crashes and stale gossip.

pub mod predicates;
pub mod state;

use self::predicates::View;
pub use self::state::{ConfigValue, Notification, ProposalSet, RecsaInner};

use crate::core::capabilities::{ConfigurationView, FailureDetectorView, Transport};
use crate::core::constants::RUN_SLEEP;
use crate::core::metrics::{CONFIG_SIZE, CURRENT_PHASE, ESTAB_CALLS_TOTAL, MESSAGES_SENT_TOTAL, STALE_RESETS_TOTAL, TRUSTED_COUNT};
use crate::core::wire::{RecsaPayload, WireMessage};
use crate::core::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct RecsaModule {
    id: NodeId,
    n: u32,
    inner: Mutex<RecsaInner>,
    fd: Arc<dyn FailureDetectorView>,
    transport: Arc<dyn Transport>,
    msgs_sent: AtomicU64,
}

impl RecsaModule {
    pub fn new(id: NodeId, n: u32, fd: Arc<dyn FailureDetectorView>, transport: Arc<dyn Transport>) -> Arc<Self> {
        let trusted = fd.trusted();
        Arc::new(RecsaModule {
            id,
            n,
            inner: Mutex::new(RecsaInner::new(id, trusted)),
            fd,
            transport,
            msgs_sent: AtomicU64::new(0),
        })
    }

    /// Seeds `config[i]` directly; used by process bootstrap when a node is
    /// being launched as a founding member rather than joining via the JM.
    pub fn inject_initial_config(&self, s: BTreeSet<NodeId>) {
        let mut inner = self.inner.lock();
        inner.config.insert(self.id, ConfigValue::Set(s));
    }

    /// Used by the HTTP `/inject_conf` debugging surface (spec.md §6.4).
    pub fn inject_conf(&self, s: ConfigValue) {
        let mut inner = self.inner.lock();
        inner.config.insert(self.id, s);
    }

    /// Used by the HTTP `/inject_prp` debugging surface (spec.md §6.4).
    pub fn inject_prp(&self, n: Notification) {
        let mut inner = self.inner.lock();
        inner.prp.insert(self.id, n);
    }

    fn view<'a>(&self, inner: &'a RecsaInner) -> View<'a> {
        View { id: self.id, n: self.n, inner, fd_i: self.fd.trusted() }
    }

    /// `receive_msg`: folds an inbound peer's RecSA payload into our state.
    pub fn receive_msg(&self, sender: NodeId, data: RecsaPayload) {
        let mut inner = self.inner.lock();
        inner.fd.insert(self.id, self.fd.trusted());
        inner.fd.insert(sender, data.fd);
        inner.fd_part.insert(sender, data.fd_part);
        inner.config.insert(sender, data.config);
        inner.prp.insert(sender, data.prp);
        inner.alll.insert(sender, data.alll);
        inner.echo_part.insert(sender, data.echo_fd_part);
        inner.echo_prp.insert(sender, data.echo_prp);
        inner.echo_all.insert(sender, data.echo_all);
    }

    fn send_state(&self, inner: &RecsaInner, receiver: NodeId) {
        let view = self.view(inner);
        let payload = RecsaPayload {
            fd: view.get_fd_j(self.id),
            fd_part: view.get_fd_part_j(self.id),
            config: view.get_config_j(self.id),
            prp: view.get_prp_j(self.id),
            alll: view.my_alll(self.id),
            echo_fd_part: view.get_fd_part_j(receiver),
            echo_prp: view.get_prp_j(receiver),
            echo_all: view.get_all_j(receiver),
        };
        self.transport.send(receiver, WireMessage::Recsa { sender: self.id, data: payload });
        self.msgs_sent.fetch_add(1, Ordering::Relaxed);
        MESSAGES_SENT_TOTAL.with_label_values(&["recsa"]).inc();
    }

    /// Data exposed to the HTTP introspection surface (`/data`, spec.md §6.4).
    pub fn get_data(&self) -> serde_json::Value {
        let inner = self.inner.lock();
        let view = self.view(&inner);
        serde_json::json!({
            "fd": view.get_fd_j(self.id),
            "fd_part": view.get_fd_part_j(self.id),
            "config": format!("{:?}", inner.config),
            "prp": view.get_prp_j(self.id),
            "alll": view.my_alll(self.id),
            "msgs_sent": self.msgs_sent.load(Ordering::Relaxed),
        })
    }

    /// One pass of Algorithm 3.1's do-forever body. Split out of `run` so
    /// tests can drive individual iterations deterministically.
    pub fn tick(&self) {
        let mut inner = self.inner.lock();
        let trusted_now = self.fd.trusted();
        inner.fd.insert(self.id, trusted_now);

        // line 22: drop non-participants from the locally-tracked config.
        let trusted: BTreeSet<NodeId> = {
            let view = self.view(&inner);
            view.get_fd_part_j(self.id)
        };
        for k in 0..self.n {
            if !trusted.contains(&k) {
                inner.config.insert(k, ConfigValue::NotParticipant);
                inner.prp.insert(k, Notification::default());
            }
        }

        // line 23: adopt the majority notification among fd_part_i.
        let mut all_seen = inner.all_seen.clone();
        let new_prp = {
            let mut view = self.view(&inner);
            view.max_ntf(&mut all_seen)
        };
        inner.prp.insert(self.id, new_prp);
        inner.all_seen = all_seen;

        // line 25: whether every fd_part_i member echoes p_i's own values.
        let all_no_all = {
            let view = self.view(&inner);
            view.get_fd_part_j(self.id).iter().all(|k| view.echo_no_all(*k))
        };
        inner.alll.insert(self.id, all_no_all);

        // line 26: record which fd_part_i members have finished the phase.
        let finished: Vec<NodeId> = {
            let view = self.view(&inner);
            view.get_fd_part_j(self.id).into_iter().filter(|k| view.get_all_j(*k)).collect()
        };
        inner.all_seen.extend(finished);

        // line 24: any stale-info condition forces a brute-force reset.
        let stale = {
            let view = self.view(&inner);
            view.stale_info_type_1()
                || view.stale_info_type_2()
                || view.stale_info_type_3()
                || view.stale_info_type_4()
        };
        if stale {
            debug!(node = self.id, "stale info detected, resetting config");
            inner.config_set(self.n, ConfigValue::Bottom);
            STALE_RESETS_TOTAL.with_label_values(&["stale_info"]).inc();
        }

        // lines 27-32: normal progress, or recovery from a reset.
        let no_ntf = {
            let view = self.view(&inner);
            view.no_ntf_arrived()
        };
        if no_ntf {
            let conflict = {
                let view = self.view(&inner);
                view.config_conflict()
            };
            if conflict {
                debug!(node = self.id, "config conflict found, resetting config");
                inner.config_set(self.n, ConfigValue::Bottom);
                STALE_RESETS_TOTAL.with_label_values(&["config_conflict"]).inc();
            }
            let (is_bottom, stabilized) = {
                let view = self.view(&inner);
                (view.get_config_j(self.id).is_bottom(), view.fds_stabilized())
            };
            if is_bottom && stabilized {
                let fd_i = inner.fd.get(&self.id).cloned().unwrap_or_default();
                // Open question (resolved from original_source): config_set
                // is handed the raw fd[i] trusted set, not a filtered one.
                inner.config_set(self.n, ConfigValue::Set(fd_i));
            }
        } else {
            let prp_i = inner.get_prp_j(self.id);
            if prp_i.phase == 2 && inner.get_all_j(self.id) {
                if let ProposalSet::Set(s) = prp_i.set.clone() {
                    inner.config.insert(self.id, ConfigValue::Set(s));
                }
            }
            let all_seen_now = {
                let view = self.view(&inner);
                view.all_seen_fun()
            };
            if all_seen_now {
                let echo_fun_all = {
                    let view = self.view(&inner);
                    view.get_fd_part_j(self.id).iter().all(|k| view.echo_fun(*k))
                };
                if echo_fun_all {
                    let prp_i = inner.get_prp_j(self.id);
                    let (next_prp, next_all) = {
                        let view = self.view(&inner);
                        view.increment(prp_i)
                    };
                    inner.prp.insert(self.id, next_prp);
                    inner.alll.insert(self.id, next_all);
                    inner.all_seen.clear();
                }
            }
        }

        // line 33: broadcast our state to every trusted peer, unless we have
        // withdrawn from participation entirely.
        if !inner.get_config_j(self.id).is_not_participant() {
            let peers = inner.fd.get(&self.id).cloned().unwrap_or_default();
            for j in peers {
                self.send_state(&inner, j);
            }
        } else {
            debug!(node = self.id, "not a participant, skipping broadcast");
        }

        CURRENT_PHASE.set(inner.get_prp_j(self.id).phase as f64);
        CONFIG_SIZE.set(inner.get_config_j(self.id).as_set().map(|s| s.len()).unwrap_or(0) as f64);
        TRUSTED_COUNT.set(inner.fd.get(&self.id).map(|s| s.len()).unwrap_or(0) as f64);
    }

    /// The main RecSA loop: `tick()` once per `RUN_SLEEP`, forever, until
    /// shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(node = self.id, "RecSA loop starting");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(node = self.id, "RecSA loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(RUN_SLEEP) => {
                    self.tick();
                }
            }
        }
    }
}

impl ConfigurationView for RecsaModule {
    fn get_config(&self) -> ConfigValue {
        let inner = self.inner.lock();
        let view = self.view(&inner);
        if view.allow_reco() { view.chs_config() } else { view.get_config_j(self.id) }
    }

    fn get_config_app(&self) -> BTreeSet<NodeId> {
        let inner = self.inner.lock();
        let view = self.view(&inner);
        let degree = view.degree(self.id);
        let base = view.get_config_j(self.id);
        let base_set = base.as_set().cloned().unwrap_or_default();
        if degree <= 2 {
            base_set
        } else {
            let mut u = base_set;
            if let ProposalSet::Set(s) = view.get_prp_j(self.id).set {
                u.extend(s);
            }
            u
        }
    }

    fn allow_reco(&self) -> bool {
        let inner = self.inner.lock();
        self.view(&inner).allow_reco()
    }

    fn estab(&self, proposed: BTreeSet<NodeId>) {
        let mut inner = self.inner.lock();
        let (allow, current) = {
            let view = self.view(&inner);
            (view.allow_reco(), view.get_config_j(self.id))
        };
        let current_set = current.as_set().cloned().unwrap_or_default();
        if allow && !proposed.is_empty() && proposed != current_set {
            info!(node = self.id, proposed = ?proposed, "estab() accepted");
            inner.prp.insert(self.id, Notification { phase: 1, set: ProposalSet::Set(proposed) });
            inner.alll.insert(self.id, false);
            inner.all_seen.clear();
            ESTAB_CALLS_TOTAL.inc();
        }
    }

    fn participate(&self) {
        let mut inner = self.inner.lock();
        let (allow, chosen) = {
            let view = self.view(&inner);
            (view.allow_reco(), view.chs_config())
        };
        if allow {
            inner.config.insert(self.id, chosen);
        }
    }

    fn fd_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        let inner = self.inner.lock();
        self.view(&inner).get_fd_j(j)
    }

    fn fd_part_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        let inner = self.inner.lock();
        self.view(&inner).get_fd_part_j(j)
    }
}
