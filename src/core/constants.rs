// src/core/constants.rs

//! Timing and threshold constants shared across modules.

use std::time::Duration;

/// Period of the RecSA / RecMA / Joining Mechanism main loops.
pub const RUN_SLEEP: Duration = Duration::from_secs(1);
/// Faster loop period used by integration tests to keep convergence bounded.
pub const INTEGRATION_RUN_SLEEP: Duration = Duration::from_millis(50);
/// Period of the failure detector's token exchange.
pub const FD_SLEEP: Duration = Duration::from_millis(250);
/// Round-trip timeout for a single failure-detector token.
pub const FD_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on each per-peer outbound queue; oldest message is dropped on overflow.
pub const MAX_QUEUE_SIZE: usize = 10;

/// Liveness threshold for the `(N, Theta)` failure detector's `beat` counter.
pub const BEAT_THRESHOLD: u32 = 30;
/// Saturation point of the failure detector's `monitor` stability counter.
pub const MONITOR_MAX: u32 = 3;
