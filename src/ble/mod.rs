//! BLE communication module.
//!
//! This module defines the transport interface the connection lifecycle
//! drives, and its btleplug implementation.

pub mod characteristics;
pub mod connection;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use connection::BleTransport;
pub use scanner::BleScanner;
pub use transport::{DiscoveredDevice, Transport, TransportEvent};
pub use uuids::*;
