//! Connection lifecycle state machine.
//!
//! Sequences discovery, connection, service discovery and notification setup:
//!
//! ```text
//! Idle -> Scanning -> Connecting -> DiscoveringServices -> ConfiguringNotifications -> Ready
//! ```
//!
//! `Disconnecting` is reachable from every state except `Idle` and always ends
//! in `Idle`. Every fatal failure funnels into that single teardown path, which
//! resets all connection state and surfaces one error message. Nothing is
//! retried; the user has to scan again.
//!
//! The machine is driven through `&mut self`, so the state, the active
//! connection and the device list each have exactly one writer. Transport
//! steps have no timeouts: a transport that never completes leaves the machine
//! parked in the state that issued the step.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{DiscoveredDevice, Transport};
use crate::ble::uuids::*;
use crate::config::FeederConfig;
use crate::data::{AlarmSetting, ClockSynchronizer};
use crate::error::{Error, Result};
use crate::presenter::{PresentationEvent, Presenter};
use crate::protocol::{codec, parse_incoming, Command, Incoming};

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Discovering devices.
    Scanning,
    /// Opening the low-level connection.
    Connecting,
    /// Looking for the feeder service.
    DiscoveringServices,
    /// Enabling notifications on the notify characteristic.
    ConfiguringNotifications,
    /// Commands may be sent.
    Ready,
    /// Tearing everything down.
    Disconnecting,
}

impl ConnectionState {
    /// Whether commands may be sent.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether an [`ActiveConnection`] exists in this state.
    pub fn has_connection(&self) -> bool {
        matches!(
            self,
            Self::DiscoveringServices | Self::ConfiguringNotifications | Self::Ready
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (*self, next) {
            (Idle, Scanning)
            | (Scanning, Connecting)
            | (Connecting, DiscoveringServices)
            | (DiscoveringServices, ConfiguringNotifications)
            | (ConfiguringNotifications, Ready)
            | (Disconnecting, Idle) => true,
            (from, Disconnecting) => !matches!(from, Idle | Disconnecting),
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::DiscoveringServices => write!(f, "DiscoveringServices"),
            Self::ConfiguringNotifications => write!(f, "ConfiguringNotifications"),
            Self::Ready => write!(f, "Ready"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// The connected feeder and the characteristics used to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    /// The connected device.
    pub device: DiscoveredDevice,
    /// Characteristic commands are written to.
    pub write_characteristic: Uuid,
    /// Characteristic reports arrive on.
    pub notify_characteristic: Uuid,
}

impl ActiveConnection {
    fn new(device: DiscoveredDevice) -> Self {
        Self {
            device,
            write_characteristic: FEEDER_WRITE_UUID,
            notify_characteristic: FEEDER_NOTIFY_UUID,
        }
    }
}

type HostClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the connection state and drives the transport through the lifecycle.
pub struct ConnectionStateMachine<T: Transport, P: Presenter> {
    pub(crate) transport: T,
    pub(crate) presenter: P,
    pub(crate) config: FeederConfig,
    pub(crate) clock: ClockSynchronizer,
    pub(crate) host_clock: HostClock,
    state: ConnectionState,
    devices: HashMap<String, DiscoveredDevice>,
    /// Device being connected to, before the connection is established.
    target: Option<DiscoveredDevice>,
    pub(crate) active: Option<ActiveConnection>,
    alarms: HashMap<u8, AlarmSetting>,
}

impl<T: Transport, P: Presenter> ConnectionStateMachine<T, P> {
    /// Create an idle state machine.
    pub fn new(transport: T, presenter: P, config: FeederConfig) -> Self {
        Self {
            transport,
            presenter,
            clock: ClockSynchronizer::new(config.epoch_zone),
            config,
            host_clock: Arc::new(Utc::now),
            state: ConnectionState::Idle,
            devices: HashMap::new(),
            target: None,
            active: None,
            alarms: HashMap::new(),
        }
    }

    /// Replace the source of host time.
    pub fn with_host_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.host_clock = Arc::new(clock);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The active connection, if any.
    pub fn active_connection(&self) -> Option<&ActiveConnection> {
        self.active.as_ref()
    }

    /// Devices found during the current scan, by address.
    pub fn devices(&self) -> &HashMap<String, DiscoveredDevice> {
        &self.devices
    }

    /// Latest reported setting of an alarm.
    pub fn alarm(&self, index: u8) -> Option<&AlarmSetting> {
        self.alarms.get(&index)
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Move to `next`. The only writer of `state`.
    fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        debug!("Connection state changed: {} -> {}", self.state, next);
        self.state = next;
        self.presenter.present(PresentationEvent::StateChanged(next));

        Ok(())
    }

    fn status(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.presenter.present(PresentationEvent::Status(text));
    }

    /// Start a fresh scan, tearing down whatever is in progress first.
    pub async fn start_scan(&mut self) -> Result<()> {
        if self.state != ConnectionState::Idle {
            self.teardown(None).await;
        }

        self.devices.clear();
        self.transition(ConnectionState::Scanning)?;
        self.status("Scanning...");

        if let Err(e) = self.transport.start_scan().await {
            return Err(self
                .fail(Error::DiscoveryFailed {
                    reason: e.to_string(),
                })
                .await);
        }

        Ok(())
    }

    /// Record a device reported by the scan. Unnamed devices are skipped, and
    /// each address is presented once per scan unless its name changes.
    pub fn on_device_found(&mut self, device: DiscoveredDevice) {
        if self.state != ConnectionState::Scanning {
            trace!("Ignoring device {} outside of a scan", device.address);
            return;
        }

        if !device.has_name() {
            trace!("Ignoring unnamed device {}", device.address);
            return;
        }

        debug!(
            "Found: {}, {}, {:?}",
            device.display_name(),
            device.address,
            device.rssi
        );

        let is_feeder = self.config.is_feeder_name(device.name.as_deref());
        let previous = self.devices.insert(device.address.clone(), device.clone());
        if previous.is_some_and(|p| p.name == device.name) {
            return;
        }

        self.presenter
            .present(PresentationEvent::DeviceFound { device, is_feeder });
    }

    /// Handle the transport aborting the scan.
    pub async fn on_scan_failed(&mut self, reason: String) {
        self.fail(Error::DiscoveryFailed { reason }).await;
    }

    /// Connect to a device found by the current scan and bring the link up.
    ///
    /// On success the machine is `Ready` and the device has been asked for
    /// its alarms and clock.
    pub async fn connect(&mut self, address: &str) -> Result<()> {
        if self.state != ConnectionState::Scanning {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: ConnectionState::Connecting,
            });
        }

        let device = self
            .devices
            .get(address)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                address: address.to_string(),
            })?;

        // The transport cannot scan and connect at the same time.
        if let Err(e) = self.transport.stop_scan().await {
            warn!("Failed to stop scan before connecting: {}", e);
        }

        self.transition(ConnectionState::Connecting)?;
        self.target = Some(device.clone());
        self.status(format!("Trying to connect to {}", device.display_name()));

        if let Err(e) = self.transport.connect(address).await {
            return Err(self
                .fail(Error::ConnectFailed {
                    reason: e.to_string(),
                })
                .await);
        }

        self.target = None;
        self.active = Some(ActiveConnection::new(device.clone()));
        self.transition(ConnectionState::DiscoveringServices)?;
        self.status("Identifying services...");

        if let Err(e) = self
            .transport
            .discover_services(address, &[FEEDER_SERVICE_UUID])
            .await
        {
            return Err(self
                .fail(Error::ServiceDiscoveryFailed {
                    reason: e.to_string(),
                })
                .await);
        }

        self.transition(ConnectionState::ConfiguringNotifications)?;

        let transport = &self.transport;
        let (descriptor, notification) = tokio::join!(
            transport.write_descriptor(
                address,
                FEEDER_NOTIFY_UUID,
                CLIENT_CHARACTERISTIC_CONFIG_UUID,
                &NOTIFICATION_ENABLE,
            ),
            transport.enable_notification(address, FEEDER_NOTIFY_UUID),
        );

        if let Err(e) = descriptor {
            return Err(self
                .fail(Error::DescriptorWriteFailed {
                    reason: e.to_string(),
                })
                .await);
        }

        // Registration failure alone leaves the link up; reports may never arrive.
        if let Err(e) = notification {
            self.fail(Error::NotificationRegistrationFailed {
                reason: e.to_string(),
            })
            .await;
        }

        self.transition(ConnectionState::Ready)?;
        self.status(format!("Connected to {}", device.display_name()));

        if self.config.request_listing_on_ready {
            self.send(&Command::List).await?;
        }

        Ok(())
    }

    /// User-initiated disconnect. No error is surfaced.
    pub async fn disconnect(&mut self) {
        self.teardown(None).await;
    }

    /// Tear down because of `error`, surface it, and hand it back to the caller.
    /// Non-fatal errors are only logged.
    pub(crate) async fn fail(&mut self, error: Error) -> Error {
        if !error.is_fatal() {
            warn!("{}", error);
            return error;
        }
        if self.state != ConnectionState::Idle {
            error!("{}", error);
        }
        self.teardown(Some(&error)).await;
        error
    }

    /// The `Disconnecting -> Idle` path. A no-op while idle.
    async fn teardown(&mut self, error: Option<&Error>) {
        if self.state == ConnectionState::Idle {
            return;
        }

        let _ = self.transition(ConnectionState::Disconnecting);

        if let Err(e) = self.transport.stop_scan().await {
            debug!("Stop scan during teardown failed: {}", e);
        }

        let address = self
            .active
            .take()
            .map(|c| c.device.address)
            .or_else(|| self.target.take().map(|d| d.address));
        self.target = None;

        if let Some(address) = address {
            if let Err(e) = self.transport.close(&address).await {
                debug!("Close during teardown failed: {}", e);
            }
        }

        self.devices.clear();
        self.alarms.clear();

        let _ = self.transition(ConnectionState::Idle);
        info!("Disconnected");

        if let Some(error) = error {
            self.presenter
                .present(PresentationEvent::Error(error.user_message()));
        }
    }

    /// Handle a notification payload from the feeder.
    pub async fn on_notification(&mut self, payload: &[u8]) -> Result<()> {
        if self.active.is_none() || !self.state.has_connection() {
            if self.state == ConnectionState::Idle {
                trace!("Dropping notification received while idle");
                return Ok(());
            }
            return Err(self.fail(Error::NotConnected).await);
        }

        let text = codec::decode(payload);
        debug!("Message received: {:?}", text);
        self.presenter
            .present(PresentationEvent::MessageReceived(text.clone()));

        match parse_incoming(&text) {
            Incoming::Alarm(alarm) => {
                debug!("Found {}", alarm);
                self.alarms.insert(alarm.index, alarm);
                self.presenter.present(PresentationEvent::AlarmUpdated {
                    index: alarm.index,
                    time: alarm.display_time(),
                    enabled: alarm.enabled,
                });
            }
            Incoming::Clock(report) => {
                debug!("Found device clock {}", report.device_time);
                let host_time = (self.host_clock)();
                let result = self.clock.compute_drift(report.device_time, host_time);
                info!("{}", result);

                self.presenter
                    .present(PresentationEvent::ClockSynced(result));
                self.push_time_at(host_time).await?;
            }
            Incoming::Unrecognized => {
                trace!("Unrecognized message: {:?}", text);
            }
        }

        Ok(())
    }
}
