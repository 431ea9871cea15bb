// src/core/metrics.rs

//! Process-wide Prometheus metrics, following the teacher's
//! `lazy_static! { ... register_*!(...).unwrap() }` convention
//! (`core::metrics` in the teacher repo).

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, Encoder, Gauge, IntCounter,
    IntCounterVec, TextEncoder,
};

lazy_static! {
    // --- Reconfiguration gauges ---
    pub static ref CURRENT_PHASE: Gauge =
        register_gauge!("quorumd_recsa_phase", "Current RecSA notification phase for this node").unwrap();
    pub static ref CONFIG_SIZE: Gauge =
        register_gauge!("quorumd_config_size", "Number of members in the current configuration").unwrap();
    pub static ref TRUSTED_COUNT: Gauge =
        register_gauge!("quorumd_trusted_count", "Number of processors currently trusted by the failure detector").unwrap();

    // --- Counters ---
    pub static ref STALE_RESETS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quorumd_stale_resets_total",
        "Brute-force config_set(BOTTOM) resets triggered, by stale-info type",
        &["stale_type"]
    )
    .unwrap();
    pub static ref ESTAB_CALLS_TOTAL: IntCounter =
        register_int_counter!("quorumd_estab_calls_total", "Times estab() was accepted").unwrap();
    pub static ref MESSAGES_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quorumd_messages_sent_total",
        "Wire messages sent, by module",
        &["module"]
    )
    .unwrap();
    pub static ref MESSAGES_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quorumd_messages_dropped_total",
        "Outbound messages dropped due to a full per-peer queue",
        &["peer"]
    )
    .unwrap();
}

/// Renders the current metric registry as Prometheus text exposition
/// format, for the `/metrics` HTTP endpoint.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
