//! Feeder alarm data structures.

use std::fmt;

use crate::error::{Error, Result};

/// Highest alarm index the report format can carry (a single digit).
pub const MAX_ALARM_INDEX: u8 = 9;

/// One feeding alarm as reported by, or sent to, the feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlarmSetting {
    /// Alarm slot on the device.
    pub index: u8,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Whether the alarm is armed.
    pub enabled: bool,
}

impl AlarmSetting {
    /// Create an alarm setting, validating the ranges.
    pub fn new(index: u8, hour: u8, minute: u8, enabled: bool) -> Result<Self> {
        if index > MAX_ALARM_INDEX {
            return Err(Error::InvalidParameter {
                name: "index".to_string(),
                value: index.to_string(),
            });
        }
        if hour > 23 {
            return Err(Error::InvalidParameter {
                name: "hour".to_string(),
                value: hour.to_string(),
            });
        }
        if minute > 59 {
            return Err(Error::InvalidParameter {
                name: "minute".to_string(),
                value: minute.to_string(),
            });
        }

        Ok(Self {
            index,
            hour,
            minute,
            enabled,
        })
    }

    /// Time of day as shown in a time field, zero padded: `"07:05"`.
    pub fn display_time(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

impl fmt::Display for AlarmSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alarm {} at {} ({})",
            self.index,
            self.display_time(),
            if self.enabled { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_time_is_zero_padded() {
        let alarm = AlarmSetting::new(1, 7, 5, true).unwrap();
        assert_eq!(alarm.display_time(), "07:05");
    }

    #[test]
    fn test_range_validation() {
        assert!(AlarmSetting::new(2, 23, 59, false).is_ok());
        assert!(matches!(
            AlarmSetting::new(2, 24, 0, true),
            Err(Error::InvalidParameter { ref name, .. }) if name == "hour"
        ));
        assert!(matches!(
            AlarmSetting::new(2, 0, 60, true),
            Err(Error::InvalidParameter { ref name, .. }) if name == "minute"
        ));
        assert!(AlarmSetting::new(10, 0, 0, true).is_err());
    }
}
