mod support;

use quorumd::core::recma::RecmaModule;
use std::sync::Arc;
use support::{RecordingTransport, ScriptedConfig};

/// Scenario 1 from the testable-properties list: `core()` is the
/// intersection of `fd_part_j` across every member of `fd_part_i`.
#[test]
fn core_is_the_intersection_of_fd_part_across_fd_part_i() {
    let recsa = Arc::new(
        ScriptedConfig::new()
            .with_fd_part_j(0, [1, 2, 3, 0])
            .with_fd_part_j(1, [1, 2, 3])
            .with_fd_part_j(2, [1, 2, 3])
            .with_fd_part_j(3, [1, 2, 4]),
    );
    let transport = Arc::new(RecordingTransport::default());
    let recma = RecmaModule::new(0, 6, recsa, transport);

    assert_eq!(recma.core(), vec![1, 2]);
}

/// Scenario 2: `flush_flags` resets every trusted peer's flags to `false`,
/// leaving the caller's own slot untouched.
#[test]
fn flush_flags_resets_every_trusted_peer() {
    let recsa = Arc::new(ScriptedConfig::new().with_fd_j(0, [1, 2, 3]));
    let transport = Arc::new(RecordingTransport::default());
    let recma = RecmaModule::new(0, 6, recsa, transport);

    recma.receive_msg(0, quorumd::core::wire::RecmaPayload { no_maj: true, need_reconf: true });
    recma.receive_msg(1, quorumd::core::wire::RecmaPayload { no_maj: true, need_reconf: true });

    recma.flush_flags_now();

    let data = recma.get_data();
    assert_eq!(data["need_reconf"]["0"], true);
    assert_eq!(data["need_reconf"]["1"], false);
    assert_eq!(data["need_reconf"]["2"], false);
    assert_eq!(data["need_reconf"]["3"], false);
    assert_eq!(data["no_maj"]["1"], false);
}

#[test]
fn eval_config_flags_when_below_three_quarters_trusted() {
    let recsa = Arc::new(ScriptedConfig::new().with_fd_j(0, [0, 1]));
    let transport = Arc::new(RecordingTransport::default());
    let recma = RecmaModule::new(0, 4, recsa, transport);

    assert!(recma.eval_config(&[0, 1, 2, 3]));
}

#[test]
fn eval_config_is_quiet_when_fully_trusted() {
    let recsa = Arc::new(ScriptedConfig::new().with_fd_j(0, [0, 1, 2, 3]));
    let transport = Arc::new(RecordingTransport::default());
    let recma = RecmaModule::with_quorum_size(0, 4, recsa, transport, 3);

    assert!(!recma.eval_config(&[0, 1, 2, 3]));
}

/// `tick()` is a no-op while this node isn't itself a participant of its
/// own `fd_part_i`.
#[test]
fn tick_skips_when_not_a_participant() {
    let recsa = Arc::new(ScriptedConfig::new().with_fd_part_j(0, [1, 2]));
    let transport = Arc::new(RecordingTransport::default());
    let recma = RecmaModule::new(0, 4, recsa, transport.clone());

    recma.tick();

    assert!(transport.sent.lock().unwrap().is_empty());
}
