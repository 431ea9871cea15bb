// src/core/abd/mod.rs

//! Single-writer/multi-reader atomic register (Attiya, Bar-Noy & Dolev),
//! layered over RecSA's `get_config_app()` as its quorum. Ported from
//! `original_source/modules/abd/module.py`; its `time.sleep` busy-wait
//! inside `communicate` is replaced with a `tokio::sync::Notify`, signalled
//! from the receive path, per this crate's design notes.

use crate::core::capabilities::{ConfigurationView, Transport};
use crate::core::metrics::MESSAGES_SENT_TOTAL;
use crate::core::wire::{AbdPayload, WireMessage};
use crate::core::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckStatus {
    NotAcked,
    Acked,
}

#[derive(Default)]
struct CommunicateState {
    status: BTreeMap<NodeId, AckStatus>,
    info: BTreeMap<NodeId, i64>,
    no_acks: u32,
    quorum: u32,
}

pub struct AbdModule {
    id: NodeId,
    recsa: Arc<dyn ConfigurationView>,
    transport: Arc<dyn Transport>,
    label: AtomicI64,
    communicating: AtomicBool,
    comm: Mutex<CommunicateState>,
    ack_notify: Notify,
}

impl AbdModule {
    pub fn new(id: NodeId, recsa: Arc<dyn ConfigurationView>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(AbdModule {
            id,
            recsa,
            transport,
            label: AtomicI64::new(0),
            communicating: AtomicBool::new(false),
            comm: Mutex::new(CommunicateState::default()),
            ack_notify: Notify::new(),
        })
    }

    fn send(&self, j: NodeId, data: AbdPayload) {
        self.transport.send(j, WireMessage::Abd { sender: self.id, data });
        MESSAGES_SENT_TOTAL.with_label_values(&["abd"]).inc();
    }

    /// `communicate`: fans `msg` out to every quorum member and blocks,
    /// without spinning, until a strict majority of acks arrive.
    async fn communicate(&self, mut on_member: impl FnMut(&Self, NodeId)) {
        let members = self.recsa.get_config_app();
        let quorum = (members.len() as u32 + 1) / 2;
        {
            let mut comm = self.comm.lock();
            comm.status.clear();
            comm.info.clear();
            comm.no_acks = 0;
            comm.quorum = quorum;
            for &j in &members {
                comm.status.insert(j, AckStatus::NotAcked);
                comm.info.insert(j, -1);
            }
        }
        self.communicating.store(true, Ordering::SeqCst);
        for &j in &members {
            on_member(self, j);
        }
        loop {
            // Register as a waiter *before* checking the condition: if we
            // checked first, an ack delivered between the check and the
            // `.notified()` call would fire `notify_waiters()` with nobody
            // registered yet and be lost forever, hanging this task.
            let notified = self.ack_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.comm.lock().no_acks >= quorum {
                break;
            }
            notified.await;
        }
        self.communicating.store(false, Ordering::SeqCst);
    }

    /// `read()`: requests every quorum member's label, adopts the maximum
    /// observed, then confirms that choice with a second quorum round.
    pub async fn read(&self) -> (i64, i64) {
        self.communicate(|this, j| this.send(j, AbdPayload::ReadRequest)).await;

        let label = {
            let comm = self.comm.lock();
            self.recsa
                .get_config_app()
                .iter()
                .filter_map(|j| comm.info.get(j).copied())
                .max()
                .unwrap_or(-1)
        };
        self.label.store(label, Ordering::SeqCst);

        self.communicate(|this, j| this.send(j, AbdPayload::ReadConfirm { label: label as u64 })).await;

        info!(node = self.id, label, "read value/label in register");
        (label, label)
    }

    /// `write()`: increments the local label and broadcasts it to a quorum.
    pub async fn write(&self) -> (i64, i64) {
        let label = self.label.fetch_add(1, Ordering::SeqCst) + 1;
        self.communicate(|this, j| this.send(j, AbdPayload::Write { label: label as u64 })).await;
        info!(node = self.id, label, "wrote value/label to register");
        (label, label)
    }

    pub fn receive_msg(&self, sender: NodeId, data: AbdPayload) {
        if !self.recsa.get_config_app().contains(&sender) {
            return;
        }
        match data {
            AbdPayload::Write { label } => {
                self.label.fetch_max(label as i64, Ordering::SeqCst);
                self.send(sender, AbdPayload::WriteAck);
            }
            AbdPayload::ReadRequest => {
                let label = self.label.load(Ordering::SeqCst);
                self.send(sender, AbdPayload::ReadRequestAck { label: label as u64 });
            }
            AbdPayload::ReadConfirm { label } => {
                self.label.fetch_max(label as i64, Ordering::SeqCst);
                self.send(sender, AbdPayload::ReadConfirmAck);
            }
            _ => {}
        }

        if self.communicating.load(Ordering::SeqCst) {
            if let AbdPayload::ReadRequestAck { label } = data {
                let mut comm = self.comm.lock();
                if comm.status.get(&sender) == Some(&AckStatus::NotAcked) {
                    comm.status.insert(sender, AckStatus::Acked);
                    comm.info.insert(sender, label as i64);
                }
            }
            if matches!(data, AbdPayload::WriteAck | AbdPayload::ReadConfirmAck | AbdPayload::ReadRequestAck { .. }) {
                self.comm.lock().no_acks += 1;
                self.ack_notify.notify_waiters();
            }
        }
    }

    pub fn get_data(&self) -> serde_json::Value {
        let comm = self.comm.lock();
        serde_json::json!({
            "is_writer": self.id == 0,
            "value": self.label.load(Ordering::SeqCst),
            "label": self.label.load(Ordering::SeqCst),
            "info": comm.info,
        })
    }
}
