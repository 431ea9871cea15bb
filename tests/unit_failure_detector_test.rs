mod support;

use quorumd::core::capabilities::FailureDetectorView;
use quorumd::core::constants::{BEAT_THRESHOLD, MONITOR_MAX};
use quorumd::core::failure_detector::FailureDetectorModule;
use std::sync::Arc;
use support::RecordingFdSender;

#[test]
fn starts_out_trusting_only_self() {
    let sender = Arc::new(RecordingFdSender::default());
    let fd = FailureDetectorModule::new(0, 4, sender);
    assert_eq!(fd.trusted(), std::collections::BTreeSet::from([0]));
}

/// A token from `j` vouches for `j` alongside self, and every third-party
/// processor's beat counter is aged by one step without yet crossing the
/// liveness threshold.
#[test]
fn token_from_peer_adds_it_to_the_trusted_set_and_ages_others() {
    let sender = Arc::new(RecordingFdSender::default());
    let fd = FailureDetectorModule::new(0, 4, sender);

    fd.deliver_token(1);

    let trusted = fd.trusted();
    assert!(trusted.contains(&0));
    assert!(trusted.contains(&1));
    let data = fd.get_data();
    assert_eq!(data["beat"][1], 0);
    assert_eq!(data["beat"][0], 0);
    assert_eq!(data["beat"][2], 1);
    assert_eq!(data["beat"][3], 1);
}

/// A peer that never sends a token ages out once its neighbour's repeated
/// tokens push its `beat` counter across `BEAT_THRESHOLD`.
#[test]
fn peer_is_dropped_once_beat_threshold_is_crossed() {
    let sender = Arc::new(RecordingFdSender::default());
    let fd = FailureDetectorModule::new(0, 3, sender);

    for _ in 0..BEAT_THRESHOLD {
        fd.deliver_token(1);
    }

    let trusted = fd.trusted();
    assert!(trusted.contains(&1));
    assert!(!trusted.contains(&2));
}

#[test]
fn monitor_counter_increments_on_each_token_and_saturates() {
    let sender = Arc::new(RecordingFdSender::default());
    let fd = FailureDetectorModule::new(0, 3, sender);

    for _ in 0..(MONITOR_MAX + 5) {
        fd.deliver_token(1);
    }

    assert!(fd.stable_monitor(1));
    let data = fd.get_data();
    assert_eq!(data["monitor"][1], MONITOR_MAX);
}

#[test]
fn reset_monitor_clears_the_counter() {
    let sender = Arc::new(RecordingFdSender::default());
    let fd = FailureDetectorModule::new(0, 3, sender);

    fd.deliver_token(1);
    assert!(fd.get_data()["monitor"][1] != 0);

    fd.reset_monitor(1);
    assert_eq!(fd.get_data()["monitor"][1], 0);
    assert!(!fd.stable_monitor(1));
}
