// src/server/dispatcher.rs

//! The one place that holds every module together (spec.md §4.5 / §9): it
//! tag-dispatches inbound `WireMessage`s to the right module's
//! `receive_msg` and answers introspection queries. Modules themselves
//! never hold a reference back to this struct.

use crate::core::abd::AbdModule;
use crate::core::byzantine::ByzantineSwitch;
use crate::core::failure_detector::FailureDetectorModule;
use crate::core::joining::JoiningModule;
use crate::core::recma::RecmaModule;
use crate::core::recsa::RecsaModule;
use crate::core::wire::WireMessage;
use crate::core::NodeId;
use crate::transport::InboundRouter;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Booting,
    Ready,
    Running,
}

pub struct Dispatcher {
    pub id: NodeId,
    pub recsa: Arc<RecsaModule>,
    pub recma: Arc<RecmaModule>,
    pub joining: Arc<JoiningModule>,
    pub fd: Arc<FailureDetectorModule>,
    pub abd: Arc<AbdModule>,
    pub byzantine: ByzantineSwitch,
    status: AtomicU8,
}

impl Dispatcher {
    pub fn new(
        id: NodeId,
        recsa: Arc<RecsaModule>,
        recma: Arc<RecmaModule>,
        joining: Arc<JoiningModule>,
        fd: Arc<FailureDetectorModule>,
        abd: Arc<AbdModule>,
        byzantine: ByzantineSwitch,
    ) -> Arc<Self> {
        Arc::new(Dispatcher { id, recsa, recma, joining, fd, abd, byzantine, status: AtomicU8::new(0) })
    }

    pub fn status(&self) -> SystemStatus {
        match self.status.load(Ordering::SeqCst) {
            1 => SystemStatus::Ready,
            2 => SystemStatus::Running,
            _ => SystemStatus::Booting,
        }
    }

    pub fn set_ready(&self) {
        self.status.store(1, Ordering::SeqCst);
    }

    pub fn set_running(&self) {
        self.status.store(2, Ordering::SeqCst);
    }

    /// `/data` introspection snapshot (spec.md §6.4).
    pub fn data_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "recsa": self.recsa.get_data(),
            "recma": self.recma.get_data(),
            "joining": self.joining.get_data(),
            "fd": self.fd.get_data(),
            "abd": self.abd.get_data(),
        })
    }
}

impl InboundRouter for Dispatcher {
    fn route(&self, msg: WireMessage) {
        match msg {
            WireMessage::Recsa { sender, data } => self.recsa.receive_msg(sender, data),
            WireMessage::Recma { sender, data } => self.recma.receive_msg(sender, data),
            WireMessage::Joining { sender, data } => self.joining.receive_msg(sender, data),
            WireMessage::FailureDetector { sender } => self.fd.receive_msg(sender),
            WireMessage::Abd { sender, data } => self.abd.receive_msg(sender, data),
        }
    }

    fn route_fd_token(&self, sender: NodeId) {
        self.fd.receive_msg(sender);
    }
}
