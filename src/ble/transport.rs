//! The narrow transport interface the connection lifecycle drives.
//!
//! Every operation completes asynchronously and reports success or failure
//! through its `Result`. Events that are not replies to a request (discovered
//! devices, scan aborts, notification payloads) are delivered as
//! [`TransportEvent`]s on a channel owned by the transport implementation.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::Result;

/// A device reported by the transport while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    /// Opaque transport address, unique per session.
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// Create a discovered device record.
    pub fn new(address: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
        }
    }

    /// Whether the device advertises a non-empty name.
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Name to show in status text, falling back to the address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.address,
        }
    }
}

/// Unsolicited events from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A device was seen during scanning. May repeat for the same address.
    DeviceFound(DiscoveredDevice),
    /// Scanning stopped because of a transport error.
    ScanFailed(String),
    /// Payload received on the notify characteristic.
    Notification(Bytes),
}

/// Operations the lifecycle needs from a BLE central.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start device discovery. Results arrive as [`TransportEvent::DeviceFound`].
    async fn start_scan(&self) -> Result<()>;

    /// Stop device discovery.
    async fn stop_scan(&self) -> Result<()>;

    /// Open a low-level connection to a discovered device.
    async fn connect(&self, address: &str) -> Result<()>;

    /// Close the connection to a device.
    async fn close(&self, address: &str) -> Result<()>;

    /// Discover services, failing unless all of `services` are present.
    async fn discover_services(&self, address: &str, services: &[Uuid]) -> Result<()>;

    /// Write a value to a characteristic.
    async fn write_characteristic(
        &self,
        address: &str,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<()>;

    /// Write a value to a descriptor of a characteristic.
    async fn write_descriptor(
        &self,
        address: &str,
        characteristic: Uuid,
        descriptor: Uuid,
        data: &[u8],
    ) -> Result<()>;

    /// Register for notifications from a characteristic. Payloads arrive as
    /// [`TransportEvent::Notification`].
    async fn enable_notification(&self, address: &str, characteristic: Uuid) -> Result<()>;
}
