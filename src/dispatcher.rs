//! Command dispatch.
//!
//! All outgoing traffic goes through [`ConnectionStateMachine::send`], which
//! only writes while the lifecycle is `Ready`. Commands are fire-and-forget:
//! replies arrive later as notifications and are matched by pattern only.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::ble::transport::Transport;
use crate::data::AlarmSetting;
use crate::error::{Error, Result};
use crate::lifecycle::ConnectionStateMachine;
use crate::presenter::Presenter;
use crate::protocol::{codec, Command};

impl<T: Transport, P: Presenter> ConnectionStateMachine<T, P> {
    /// Send a command to the feeder.
    ///
    /// When not `Ready`, nothing is written and the connection is torn down
    /// with [`Error::NotConnected`]. A failed write tears it down with
    /// [`Error::WriteFailed`].
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        debug!("Sending {} command", command.name());
        self.send_text(&command.to_string()).await
    }

    /// Send raw command text to the feeder.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        let connection = match self.active.clone() {
            Some(connection) if self.state().is_ready() => connection,
            _ => return Err(self.fail(Error::NotConnected).await),
        };

        let payload = codec::encode(text);

        if let Err(e) = self
            .transport
            .write_characteristic(
                &connection.device.address,
                connection.write_characteristic,
                &payload,
            )
            .await
        {
            return Err(self
                .fail(Error::WriteFailed {
                    reason: e.to_string(),
                })
                .await);
        }

        debug!("Sent {:?}", text);

        Ok(())
    }

    /// Set one alarm.
    pub async fn set_alarm(&mut self, index: u8, hour: u8, minute: u8, enabled: bool) -> Result<()> {
        let alarm = AlarmSetting::new(index, hour, minute, enabled)?;
        self.send(&Command::Alarm(alarm)).await
    }

    /// Ask the feeder to report all alarms and its clock.
    pub async fn request_listing(&mut self) -> Result<()> {
        self.send(&Command::List).await
    }

    /// Overwrite the feeder clock with current host time.
    pub async fn push_time(&mut self) -> Result<()> {
        let now = (self.host_clock)();
        self.push_time_at(now).await
    }

    /// Overwrite the feeder clock with `host_time`.
    pub async fn push_time_at(&mut self, host_time: DateTime<Utc>) -> Result<()> {
        let command = self.clock.build_time_push_command(host_time);
        self.send(&command).await
    }

    /// Move the feeder left.
    pub async fn nudge_left(&mut self, steps: i32) -> Result<()> {
        self.send(&Command::Left(steps)).await
    }

    /// Move the feeder right.
    pub async fn nudge_right(&mut self, steps: i32) -> Result<()> {
        self.send(&Command::Right(steps)).await
    }

    /// Store the left feeder position.
    pub async fn set_left(&mut self, steps: i32) -> Result<()> {
        self.send(&Command::SetLeft(steps)).await
    }

    /// Store the right feeder position.
    pub async fn set_right(&mut self, steps: i32) -> Result<()> {
        self.send(&Command::SetRight(steps)).await
    }
}
