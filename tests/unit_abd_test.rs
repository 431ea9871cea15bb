mod support;

use quorumd::core::abd::AbdModule;
use quorumd::core::wire::{AbdPayload, WireMessage};
use std::sync::Arc;
use support::{RecordingTransport, ScriptedConfig};

/// `write()` broadcasts the incremented label to every quorum member and
/// only returns once a strict majority has acked.
#[tokio::test]
async fn write_completes_once_quorum_acks_arrive() {
    let recsa = Arc::new(ScriptedConfig::new().with_config_app([1, 2, 3]));
    let transport = Arc::new(RecordingTransport::default());
    let abd = AbdModule::new(0, recsa, transport.clone());

    let abd2 = abd.clone();
    let handle = tokio::spawn(async move { abd2.write().await });

    tokio::task::yield_now().await;
    abd.receive_msg(1, AbdPayload::WriteAck);
    abd.receive_msg(2, AbdPayload::WriteAck);

    let (value, label) = handle.await.unwrap();
    assert_eq!(value, 1);
    assert_eq!(label, 1);

    let sent = transport.sent_to(1);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        WireMessage::Abd { data: AbdPayload::Write { label }, .. } => assert_eq!(*label, 1),
        other => panic!("expected an Abd Write payload, got {other:?}"),
    }
}

/// `read()` adopts the maximum label observed across the first quorum round,
/// then confirms it with a second round, without ever busy-waiting.
#[tokio::test]
async fn read_adopts_the_maximum_observed_label() {
    let recsa = Arc::new(ScriptedConfig::new().with_config_app([1, 2, 3]));
    let transport = Arc::new(RecordingTransport::default());
    let abd = AbdModule::new(0, recsa, transport);

    let abd2 = abd.clone();
    let handle = tokio::spawn(async move { abd2.read().await });

    tokio::task::yield_now().await;
    abd.receive_msg(1, AbdPayload::ReadRequestAck { label: 3 });
    abd.receive_msg(2, AbdPayload::ReadRequestAck { label: 7 });

    tokio::task::yield_now().await;
    abd.receive_msg(1, AbdPayload::ReadConfirmAck);
    abd.receive_msg(2, AbdPayload::ReadConfirmAck);

    let (value, label) = handle.await.unwrap();
    assert_eq!(value, 7);
    assert_eq!(label, 7);
}

/// Messages from a sender outside the current quorum membership are ignored.
#[tokio::test]
async fn receive_msg_ignores_senders_outside_config_app() {
    let recsa = Arc::new(ScriptedConfig::new().with_config_app([1, 2]));
    let transport = Arc::new(RecordingTransport::default());
    let abd = AbdModule::new(0, recsa, transport.clone());

    abd.receive_msg(9, AbdPayload::Write { label: 42 });

    assert_eq!(abd.get_data()["label"], 0);
    assert!(transport.sent_to(9).is_empty());
}
