//! Library-wide circulation policy knobs.

use serde::{Deserialize, Serialize};

/// Policy values that are library-wide rather than per-role.
///
/// Everything time-based is expressed in days; the engines turn them into
/// concrete deadlines using the injected clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirculationPolicy {
    /// Fine rate per overdue day, in currency units.
    pub fine_per_day: f64,

    /// How long a Pending reservation waits before expiring.
    pub reservation_expiry_days: i64,

    /// Pickup window once a reservation turns Ready (shorter than the wait).
    pub pickup_deadline_days: i64,

    /// Whether an outstanding reservation queue blocks renewal.
    pub block_renewal_when_reserved: bool,

    /// Batch size for sweeper scans, to keep each pass bounded.
    pub sweep_page_size: usize,
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        Self {
            fine_per_day: 0.50,
            reservation_expiry_days: 7,
            pickup_deadline_days: 2,
            block_renewal_when_reserved: true,
            sweep_page_size: 100,
        }
    }
}
