//! Clock drift measurement and time push.
//!
//! The feeder reports its real-time clock without a timezone. Reports are
//! read at a fixed UTC-08:00 offset regardless of where the host is; the
//! protocol has no field to do better. After every clock report the host
//! overwrites the device clock with its own time, independent of the drift
//! that was measured.

use chrono::{DateTime, Duration, FixedOffset, Local, TimeZone, Utc};
use std::fmt;

use crate::config::EpochZone;
use crate::protocol::Command;

/// Offset west of UTC at which device clock reports are interpreted.
pub const DEVICE_OFFSET_WEST_SECONDS: i32 = 8 * 3600;

/// The fixed offset device clock reports are read at.
pub fn device_offset() -> Option<FixedOffset> {
    FixedOffset::west_opt(DEVICE_OFFSET_WEST_SECONDS)
}

/// Direction of the device clock relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClockDrift {
    /// Device clock is ahead of the host.
    Fast,
    /// Device clock is behind the host.
    Slow,
    /// Clocks agree.
    Matched,
}

/// Result of comparing a device clock report with host time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSyncResult {
    /// Device time minus host time.
    pub drift: Duration,
    /// Sign of `drift`.
    pub classification: ClockDrift,
}

impl ClockSyncResult {
    /// Absolute drift in seconds, with millisecond precision.
    pub fn drift_seconds(&self) -> f64 {
        self.drift.num_milliseconds().abs() as f64 / 1000.0
    }
}

impl fmt::Display for ClockSyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classification {
            ClockDrift::Fast => write!(f, "Hungry Cat clock was fast: {}s", self.drift_seconds()),
            ClockDrift::Slow => write!(f, "Hungry Cat clock was slow: {}s", self.drift_seconds()),
            ClockDrift::Matched => f.write_str("Hungry Cat clock matched host time."),
        }
    }
}

/// Compare a device clock report against host time.
pub fn compute_drift<Tz: TimeZone>(device_time: DateTime<Tz>, host_time: DateTime<Utc>) -> ClockSyncResult {
    let drift = device_time.with_timezone(&Utc) - host_time;

    let classification = if drift > Duration::zero() {
        ClockDrift::Fast
    } else if drift < Duration::zero() {
        ClockDrift::Slow
    } else {
        ClockDrift::Matched
    };

    ClockSyncResult {
        drift,
        classification,
    }
}

/// Midnight on 2000-01-01 in the given zone, falling back to UTC when the
/// zone has no unambiguous midnight that day.
fn y2k_in<Tz: TimeZone>(zone: &Tz) -> DateTime<Utc> {
    match zone.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).earliest() {
        Some(epoch) => epoch.with_timezone(&Utc),
        None => Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).single().unwrap_or_default(),
    }
}

/// Seconds from 2000-01-01 00:00 in `zone` to `host_time`, rounded to the
/// nearest second.
pub fn seconds_since_y2k<Tz: TimeZone>(host_time: DateTime<Utc>, zone: &Tz) -> i64 {
    let millis = (host_time - y2k_in(zone)).num_milliseconds();
    (millis + 500).div_euclid(1000)
}

/// Computes drift and builds the clock push command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSynchronizer {
    epoch_zone: EpochZone,
}

impl ClockSynchronizer {
    /// Create a synchronizer with the given epoch zone.
    pub fn new(epoch_zone: EpochZone) -> Self {
        Self { epoch_zone }
    }

    /// Compare a device clock report against host time.
    pub fn compute_drift(
        &self,
        device_time: DateTime<FixedOffset>,
        host_time: DateTime<Utc>,
    ) -> ClockSyncResult {
        compute_drift(device_time, host_time)
    }

    /// Build the `now <seconds>` command for `host_time`.
    pub fn build_time_push_command(&self, host_time: DateTime<Utc>) -> Command {
        let seconds = match self.epoch_zone {
            EpochZone::Local => seconds_since_y2k(host_time, &Local),
            EpochZone::Fixed { offset_seconds } => match FixedOffset::east_opt(offset_seconds) {
                Some(offset) => seconds_since_y2k(host_time, &offset),
                None => seconds_since_y2k(host_time, &Utc),
            },
        };

        Command::Now(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn device_time(text: &str) -> DateTime<FixedOffset> {
        let naive = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").unwrap();
        device_offset()
            .unwrap()
            .from_local_datetime(&naive)
            .single()
            .unwrap()
    }

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_matched() {
        let result = compute_drift(device_time("2020-02-02T10:55:50"), utc("2020-02-02T18:55:50Z"));
        assert_eq!(result.drift, Duration::zero());
        assert_eq!(result.classification, ClockDrift::Matched);
        assert_eq!(result.to_string(), "Hungry Cat clock matched host time.");
    }

    #[test]
    fn test_device_behind_host_is_slow() {
        let result = compute_drift(device_time("2020-02-02T10:55:50"), utc("2020-02-02T18:55:51Z"));
        assert_eq!(result.drift, Duration::seconds(-1));
        assert_eq!(result.classification, ClockDrift::Slow);
        assert_eq!(result.to_string(), "Hungry Cat clock was slow: 1s");
    }

    #[test]
    fn test_device_ahead_of_host_is_fast() {
        let result = compute_drift(
            device_time("2020-02-02T10:55:50"),
            utc("2020-02-02T18:55:47.500Z"),
        );
        assert_eq!(result.drift, Duration::milliseconds(2500));
        assert_eq!(result.classification, ClockDrift::Fast);
        assert_eq!(result.to_string(), "Hungry Cat clock was fast: 2.5s");
    }

    #[test]
    fn test_seconds_since_y2k_utc() {
        assert_eq!(seconds_since_y2k(utc("2000-01-01T00:00:00Z"), &Utc), 0);
        assert_eq!(seconds_since_y2k(utc("2000-01-02T00:00:00Z"), &Utc), 86_400);
        assert_eq!(seconds_since_y2k(utc("2000-01-01T00:00:01.600Z"), &Utc), 2);
    }

    #[test]
    fn test_push_command_with_fixed_epoch_zone() {
        let sync = ClockSynchronizer::new(EpochZone::Fixed {
            offset_seconds: -8 * 3600,
        });
        // Local midnight at -08:00 is 08:00 UTC.
        let command = sync.build_time_push_command(utc("2000-01-01T08:01:00Z"));
        assert_eq!(command, Command::Now(60));
        assert_eq!(command.to_string(), "now 60");
    }
}
