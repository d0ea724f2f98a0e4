//! Command construction.
//!
//! Every command is a single line of space-separated tokens without a
//! trailing terminator.

use std::fmt;

use crate::data::AlarmSetting;

/// A command understood by the feeder firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set an alarm: `<index> <HH:MM> <0|1>`.
    Alarm(AlarmSetting),
    /// Overwrite the device clock: `now <secondsSince2000>`.
    Now(i64),
    /// Ask the device to report every alarm and its clock: `list`.
    List,
    /// Move the feeder left by some steps: `left <steps>`.
    Left(i32),
    /// Move the feeder right by some steps: `right <steps>`.
    Right(i32),
    /// Store the left feeder position: `setleft <steps>`.
    SetLeft(i32),
    /// Store the right feeder position: `setright <steps>`.
    SetRight(i32),
    /// Free-form text sent unchanged.
    Raw(String),
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alarm(_) => "alarm",
            Self::Now(_) => "now",
            Self::List => "list",
            Self::Left(_) => "left",
            Self::Right(_) => "right",
            Self::SetLeft(_) => "setleft",
            Self::SetRight(_) => "setright",
            Self::Raw(_) => "raw",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alarm(alarm) => write!(
                f,
                "{} {} {}",
                alarm.index,
                alarm.display_time(),
                u8::from(alarm.enabled)
            ),
            Self::Now(seconds) => write!(f, "now {}", seconds),
            Self::List => f.write_str("list"),
            Self::Left(steps) => write!(f, "left {}", steps),
            Self::Right(steps) => write!(f, "right {}", steps),
            Self::SetLeft(steps) => write!(f, "setleft {}", steps),
            Self::SetRight(steps) => write!(f, "setright {}", steps),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

impl From<AlarmSetting> for Command {
    fn from(alarm: AlarmSetting) -> Self {
        Self::Alarm(alarm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_text() {
        let alarm = AlarmSetting::new(2, 8, 5, true).unwrap();
        assert_eq!(Command::from(alarm).to_string(), "2 08:05 1");

        let off = AlarmSetting::new(3, 18, 30, false).unwrap();
        assert_eq!(Command::Alarm(off).to_string(), "3 18:30 0");

        assert_eq!(Command::Now(633_787_650).to_string(), "now 633787650");
        assert_eq!(Command::List.to_string(), "list");
        assert_eq!(Command::Left(20).to_string(), "left 20");
        assert_eq!(Command::Right(5).to_string(), "right 5");
        assert_eq!(Command::SetLeft(120).to_string(), "setleft 120");
        assert_eq!(Command::SetRight(-4).to_string(), "setright -4");
        assert_eq!(Command::Raw("status".into()).to_string(), "status");
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::List.name(), "list");
        assert_eq!(Command::SetRight(1).name(), "setright");
    }
}
