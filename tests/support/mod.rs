//! Shared fakes for driving the control-plane modules without a real
//! transport or failure detector, following the teacher's
//! `tests/integration/test_helpers.rs` convention of one fixtures module
//! imported by every test file that needs it.

use quorumd::core::capabilities::{ConfigurationView, FailureDetectorView, Transport};
use quorumd::core::failure_detector::FdSender;
use quorumd::core::recsa::ConfigValue;
use quorumd::core::wire::WireMessage;
use quorumd::core::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// A `Transport` that records every send instead of delivering it anywhere.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(NodeId, WireMessage)>>,
}

impl Transport for RecordingTransport {
    fn send(&self, to: NodeId, msg: WireMessage) {
        self.sent.lock().unwrap().push((to, msg));
    }
}

impl RecordingTransport {
    pub fn sent_to(&self, peer: NodeId) -> Vec<WireMessage> {
        self.sent.lock().unwrap().iter().filter(|(to, _)| *to == peer).map(|(_, m)| m.clone()).collect()
    }
}

/// A `FailureDetectorView` with a fixed trusted set, for tests that don't
/// care about the FD's own convergence behaviour.
pub struct FixedFd {
    pub trusted: BTreeSet<NodeId>,
    pub monitor: Mutex<BTreeMap<NodeId, bool>>,
}

impl FixedFd {
    pub fn new(trusted: impl IntoIterator<Item = NodeId>) -> Self {
        FixedFd { trusted: trusted.into_iter().collect(), monitor: Mutex::new(BTreeMap::new()) }
    }
}

impl FailureDetectorView for FixedFd {
    fn trusted(&self) -> BTreeSet<NodeId> {
        self.trusted.clone()
    }

    fn reset_monitor(&self, peer: NodeId) {
        self.monitor.lock().unwrap().insert(peer, false);
    }

    fn stable_monitor(&self, peer: NodeId) -> bool {
        self.monitor.lock().unwrap().get(&peer).copied().unwrap_or(false)
    }
}

/// A `ConfigurationView` whose every answer is pre-scripted per-peer, for
/// exercising RecMA/JM/ABD in isolation from RecSA's actual state machine.
#[derive(Default)]
pub struct ScriptedConfig {
    pub config: Mutex<ConfigValue>,
    pub config_app: Mutex<BTreeSet<NodeId>>,
    pub allow: Mutex<bool>,
    pub fd: Mutex<BTreeMap<NodeId, BTreeSet<NodeId>>>,
    pub fd_part: Mutex<BTreeMap<NodeId, BTreeSet<NodeId>>>,
    pub estab_calls: Mutex<Vec<BTreeSet<NodeId>>>,
    pub participate_calls: Mutex<u32>,
}

impl ScriptedConfig {
    pub fn new() -> Self {
        Self { config: Mutex::new(ConfigValue::Bottom), ..Default::default() }
    }

    pub fn with_fd_j(self, j: NodeId, set: impl IntoIterator<Item = NodeId>) -> Self {
        self.fd.lock().unwrap().insert(j, set.into_iter().collect());
        self
    }

    pub fn with_fd_part_j(self, j: NodeId, set: impl IntoIterator<Item = NodeId>) -> Self {
        self.fd_part.lock().unwrap().insert(j, set.into_iter().collect());
        self
    }

    pub fn with_allow(self, allow: bool) -> Self {
        *self.allow.lock().unwrap() = allow;
        self
    }

    pub fn with_config(self, config: ConfigValue) -> Self {
        *self.config.lock().unwrap() = config;
        self
    }

    pub fn with_config_app(self, members: impl IntoIterator<Item = NodeId>) -> Self {
        *self.config_app.lock().unwrap() = members.into_iter().collect();
        self
    }
}

impl ConfigurationView for ScriptedConfig {
    fn get_config(&self) -> ConfigValue {
        self.config.lock().unwrap().clone()
    }

    fn get_config_app(&self) -> BTreeSet<NodeId> {
        self.config_app.lock().unwrap().clone()
    }

    fn allow_reco(&self) -> bool {
        *self.allow.lock().unwrap()
    }

    fn estab(&self, proposed: BTreeSet<NodeId>) {
        self.estab_calls.lock().unwrap().push(proposed);
    }

    fn participate(&self) {
        *self.participate_calls.lock().unwrap() += 1;
    }

    fn fd_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        self.fd.lock().unwrap().get(&j).cloned().unwrap_or_default()
    }

    fn fd_part_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        self.fd_part.lock().unwrap().get(&j).cloned().unwrap_or_default()
    }
}

/// An `FdSender` that records every token sent instead of putting it on the
/// wire, for driving `FailureDetectorModule` without real UDP sockets.
#[derive(Default)]
pub struct RecordingFdSender {
    pub sent: Mutex<Vec<NodeId>>,
}

impl FdSender for RecordingFdSender {
    fn send_token(&self, to: NodeId) {
        self.sent.lock().unwrap().push(to);
    }
}
