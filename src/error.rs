//! Error types for the hungry-cat-ble crate.

use thiserror::Error;

use crate::lifecycle::ConnectionState;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Device discovery could not be started or was aborted by the transport.
    #[error("Device discovery failed: {reason}")]
    DiscoveryFailed {
        /// Description of why discovery failed.
        reason: String,
    },

    /// The low-level connection to the feeder could not be established.
    #[error("Connection failed: {reason}")]
    ConnectFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The connected device does not expose the feeder service.
    #[error("Service discovery failed: {reason}")]
    ServiceDiscoveryFailed {
        /// Description of why service discovery failed.
        reason: String,
    },

    /// Writing the notification-enable configuration descriptor failed.
    #[error("Descriptor write failed: {reason}")]
    DescriptorWriteFailed {
        /// Description of why the descriptor write failed.
        reason: String,
    },

    /// Registering for notifications failed. Not fatal on its own.
    #[error("Notification registration failed: {reason}")]
    NotificationRegistrationFailed {
        /// Description of why registration failed.
        reason: String,
    },

    /// Writing a command to the feeder failed.
    #[error("Command write failed: {reason}")]
    WriteFailed {
        /// Description of why the write failed.
        reason: String,
    },

    /// Operation requires a ready connection but the feeder is not connected.
    #[error("Feeder not connected")]
    NotConnected,

    /// No device with this address was seen during the current scan.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was looked up.
        address: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Descriptor not found under the characteristic.
    #[error("Descriptor {descriptor} not found on characteristic {characteristic}")]
    DescriptorNotFound {
        /// The characteristic that was searched.
        characteristic: String,
        /// The descriptor UUID that was not found.
        descriptor: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// The requested lifecycle transition is not allowed from the current state.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State the machine was in.
        from: ConnectionState,
        /// State that was requested.
        to: ConnectionState,
    },

    /// The controller task is no longer running.
    #[error("Controller stopped")]
    ControllerStopped,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short message shown to the user when this error tears the connection down.
    pub fn user_message(&self) -> String {
        match self {
            Self::DiscoveryFailed { .. } | Self::BluetoothUnavailable => {
                "Failed to scan for devices.".to_string()
            }
            Self::ConnectFailed { .. } => "Disconnected from device".to_string(),
            Self::ServiceDiscoveryFailed { .. } => "Device is not a HungryCat feeder".to_string(),
            Self::DescriptorWriteFailed { .. } => "Failed to set descriptor.".to_string(),
            Self::NotConnected | Self::WriteFailed { .. } => "Disconnected".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error forces a full disconnect.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotificationRegistrationFailed { .. })
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
