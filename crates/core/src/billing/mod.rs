//! Per-connection billing.
//!
//! This module implements the charging rules for a connected session:
//! - Minimum charge reserved when a session starts
//! - Accumulation of billable seconds while the clock runs
//! - Conversion to whole minutes and the decision when to flush
//! - The clock abstraction every decision is taken against

pub mod clock;
pub mod meter;

#[cfg(test)]
mod meter_props;

pub use clock::{Clock, ManualClock, SystemClock};
pub use meter::{FLUSH_INTERVAL_SECS, Flush, MINIMUM_CHARGE, Meter, SECONDS_PER_MINUTE};
