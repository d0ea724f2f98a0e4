//! Parsing of report lines sent by the feeder.
//!
//! The feeder answers `list` (and prints on its own) with free-form lines.
//! Two kinds are recognized:
//!
//! - alarm reports such as `alarm 2 18:30 1`
//! - clock reports containing a timestamp such as `2020-02-02T10:55:50`
//!
//! Matchers are tried in order and the first hit wins, so a single line never
//! yields more than one report. Lines matching neither are
//! [`Incoming::Unrecognized`], which is not an error.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use regex::Regex;
use tracing::warn;

use crate::data::clock::device_offset;
use crate::data::AlarmSetting;

const ALARM_PATTERN: &str = r"alarm ([0-9]) ([0-9]+):([0-9]+) ([0-9])";
const CLOCK_PATTERN: &str = r"([0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2})";
const CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Clock value reported by the feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReport {
    /// Device time, interpreted at the fixed device offset.
    pub device_time: DateTime<FixedOffset>,
}

/// A parsed incoming line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Current setting of one alarm.
    Alarm(AlarmSetting),
    /// Current device clock.
    Clock(ClockReport),
    /// Anything else.
    Unrecognized,
}

type Matcher = fn(&str) -> Option<Incoming>;

/// Matchers in precedence order.
const MATCHERS: &[Matcher] = &[match_alarm, match_clock];

/// Parse one incoming line.
pub fn parse_incoming(text: &str) -> Incoming {
    MATCHERS
        .iter()
        .find_map(|matcher| matcher(text))
        .unwrap_or(Incoming::Unrecognized)
}

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("report pattern is a valid regex"))
}

fn match_alarm(text: &str) -> Option<Incoming> {
    static ALARM: OnceLock<Regex> = OnceLock::new();

    let caps = pattern(&ALARM, ALARM_PATTERN).captures(text)?;

    let parsed = (|| -> Option<AlarmSetting> {
        let index: u8 = caps[1].parse().ok()?;
        let hour: u8 = caps[2].parse().ok()?;
        let minute: u8 = caps[3].parse().ok()?;
        let enabled = &caps[4] != "0";
        AlarmSetting::new(index, hour, minute, enabled).ok()
    })();

    // The alarm branch owns this line even when the fields are out of range.
    match parsed {
        Some(alarm) => Some(Incoming::Alarm(alarm)),
        None => {
            warn!("Ignoring malformed alarm report: {:?}", text);
            Some(Incoming::Unrecognized)
        }
    }
}

fn match_clock(text: &str) -> Option<Incoming> {
    static CLOCK: OnceLock<Regex> = OnceLock::new();

    let caps = pattern(&CLOCK, CLOCK_PATTERN).captures(text)?;

    let naive = match NaiveDateTime::parse_from_str(&caps[1], CLOCK_FORMAT) {
        Ok(naive) => naive,
        Err(e) => {
            warn!("Ignoring invalid clock report {:?}: {}", &caps[1], e);
            return Some(Incoming::Unrecognized);
        }
    };

    let device_time = device_offset()?.from_local_datetime(&naive).single()?;

    Some(Incoming::Clock(ClockReport { device_time }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alarm_report() {
        let expected = AlarmSetting {
            index: 2,
            hour: 18,
            minute: 30,
            enabled: true,
        };
        assert_eq!(parse_incoming("alarm 2 18:30 1"), Incoming::Alarm(expected));

        match parse_incoming("alarm 2 18:30 1") {
            Incoming::Alarm(alarm) => assert_eq!(alarm.display_time(), "18:30"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_alarm_report_unpadded_fields() {
        assert_eq!(
            parse_incoming("alarm 1 7:5 0"),
            Incoming::Alarm(AlarmSetting {
                index: 1,
                hour: 7,
                minute: 5,
                enabled: false,
            })
        );
    }

    #[test]
    fn test_alarm_report_inside_longer_line() {
        assert!(matches!(
            parse_incoming("> alarm 3 06:15 1\r"),
            Incoming::Alarm(AlarmSetting { index: 3, .. })
        ));
    }

    #[test]
    fn test_clock_report_uses_fixed_offset() {
        let Incoming::Clock(report) = parse_incoming("rtc 2020-02-02T10:55:50") else {
            panic!("expected clock report");
        };
        let utc = report.device_time.with_timezone(&Utc);
        assert_eq!(utc.to_rfc3339(), "2020-02-02T18:55:50+00:00");
    }

    #[test]
    fn test_alarm_wins_over_clock() {
        let line = "alarm 1 06:00 1 2020-02-02T10:55:50";
        assert!(matches!(parse_incoming(line), Incoming::Alarm(_)));
    }

    #[test]
    fn test_out_of_range_alarm_does_not_fall_through() {
        let line = "alarm 1 99:00 1 2020-02-02T10:55:50";
        assert_eq!(parse_incoming(line), Incoming::Unrecognized);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(parse_incoming("ok"), Incoming::Unrecognized);
        assert_eq!(parse_incoming(""), Incoming::Unrecognized);
        assert_eq!(parse_incoming("alarm x"), Incoming::Unrecognized);
        assert_eq!(parse_incoming("2020-13-45T10:55:50"), Incoming::Unrecognized);
    }
}
