mod support;

use quorumd::core::joining::JoiningModule;
use quorumd::core::recsa::ConfigValue;
use quorumd::core::wire::{JoinPayload, WireMessage};
use std::collections::BTreeSet;
use std::sync::Arc;
use support::{RecordingTransport, ScriptedConfig};

#[test]
fn receive_join_request_responds_when_member_and_allowed() {
    let recsa = Arc::new(
        ScriptedConfig::new()
            .with_fd_j(0, [0, 1])
            .with_allow(true)
            .with_config(ConfigValue::Set(BTreeSet::from([0, 1]))),
    );
    let transport = Arc::new(RecordingTransport::default());
    let joining = JoiningModule::new(0, recsa, transport.clone());

    joining.receive_msg(1, JoinPayload::Join);

    let sent = transport.sent_to(1);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        WireMessage::Joining { sender, data: JoinPayload::Response { pass, .. } } => {
            assert_eq!(*sender, 0);
            assert!(*pass);
        }
        other => panic!("expected a Joining response, got {other:?}"),
    }
}

#[test]
fn receive_join_request_ignored_when_sender_not_trusted() {
    let recsa = Arc::new(ScriptedConfig::new().with_allow(true).with_config(ConfigValue::Set(BTreeSet::from([0]))));
    let transport = Arc::new(RecordingTransport::default());
    let joining = JoiningModule::new(0, recsa, transport.clone());

    joining.receive_msg(1, JoinPayload::Join);

    assert!(transport.sent_to(1).is_empty());
}

#[test]
fn receive_join_request_ignored_when_sender_already_a_participant() {
    let recsa = Arc::new(
        ScriptedConfig::new()
            .with_fd_j(0, [0, 1])
            .with_fd_part_j(0, [0, 1])
            .with_allow(true)
            .with_config(ConfigValue::Set(BTreeSet::from([0, 1]))),
    );
    let transport = Arc::new(RecordingTransport::default());
    let joining = JoiningModule::new(0, recsa, transport.clone());

    joining.receive_msg(1, JoinPayload::Join);

    assert!(transport.sent_to(1).is_empty());
}

/// Scenario: once a strict majority of trusted members answer `pass: true`,
/// `tick()` calls `participate()`.
#[test]
fn tick_calls_participate_once_majority_passes() {
    let recsa = Arc::new(
        ScriptedConfig::new()
            .with_fd_j(0, [0, 1, 2])
            .with_allow(true)
            .with_config(ConfigValue::Set(BTreeSet::from([0, 1, 2]))),
    );
    let transport = Arc::new(RecordingTransport::default());
    let joining = JoiningModule::new(0, recsa.clone(), transport);

    joining.receive_msg(1, JoinPayload::Response { pass: true, state: vec![] });
    joining.receive_msg(2, JoinPayload::Response { pass: true, state: vec![9] });

    joining.tick();

    assert_eq!(*recsa.participate_calls.lock().unwrap(), 1);
}

#[test]
fn tick_does_not_participate_without_majority() {
    let recsa = Arc::new(
        ScriptedConfig::new()
            .with_fd_j(0, [0, 1, 2])
            .with_allow(true)
            .with_config(ConfigValue::Set(BTreeSet::from([0, 1, 2]))),
    );
    let transport = Arc::new(RecordingTransport::default());
    let joining = JoiningModule::new(0, recsa.clone(), transport);

    joining.receive_msg(1, JoinPayload::Response { pass: true, state: vec![] });
    joining.receive_msg(2, JoinPayload::Response { pass: false, state: vec![] });

    joining.tick();

    assert_eq!(*recsa.participate_calls.lock().unwrap(), 0);
}

/// When reconfiguration isn't currently allowed, `tick()` flushes the
/// pass/state arrays instead of evaluating majority consent.
#[test]
fn tick_flushes_arrays_when_reconfig_not_allowed() {
    let recsa = Arc::new(
        ScriptedConfig::new()
            .with_fd_j(0, [0, 1])
            .with_allow(false)
            .with_config(ConfigValue::Set(BTreeSet::from([0, 1]))),
    );
    let transport = Arc::new(RecordingTransport::default());
    let joining = JoiningModule::new(0, recsa, transport);

    joining.receive_msg(1, JoinPayload::Response { pass: true, state: vec![1] });
    joining.tick();

    let data = joining.get_data();
    assert_eq!(data["pass"]["0"], false);
    assert_eq!(data["pass"]["1"], false);
    assert_eq!(data["state_known_for"].as_array().unwrap().len(), 0);
}
