//! Data structures exchanged with the feeder.

pub mod alarms;
pub mod clock;

pub use alarms::{AlarmSetting, MAX_ALARM_INDEX};
pub use clock::{compute_drift, ClockDrift, ClockSyncResult, ClockSynchronizer};
