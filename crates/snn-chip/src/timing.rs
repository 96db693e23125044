//! Clocking constants observed during bring-up.
//!
//! All protocol timing is expressed in clock edges; the period only matters
//! to whatever drives the external clock.

/// Clock period used by the bring-up testbenches (µs).
pub const CLOCK_PERIOD_US: u64 = 10;

/// Minimum number of edges reset must be held before release.
pub const RESET_CYCLES: u32 = 10;

/// Minimum idle edges between the last SETUP cycle and the first EXECUTE cycle.
pub const MIN_SETTLE_CYCLES: u32 = 1;

/// Execute window captured by the reference scenarios.
pub const DEFAULT_EXECUTE_CYCLES: u32 = 32;

/// Edges allowed between reset release and the device reporting ready.
pub const DEFAULT_READY_TIMEOUT_CYCLES: u32 = 16;
