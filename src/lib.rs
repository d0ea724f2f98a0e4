// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # hungry-cat-ble
//!
//! A Rust library for controlling the HungryCat mechanical cat feeder over
//! Bluetooth Low Energy.
//!
//! The feeder sits behind a RedBearLab BLE shield and speaks a line-oriented
//! ASCII protocol: the host writes short commands (`list`, `2 18:30 1`,
//! `left 20`, `now 633984950`) and the feeder answers with report lines on a
//! notify characteristic.
//!
//! ## Features
//!
//! - **Discovery**: Scan for nearby devices, flagging feeders by name
//! - **Connection lifecycle**: Connect, find the feeder service, enable notifications
//! - **Alarms**: Read and set the feeder's feeding alarms
//! - **Feeder position**: Nudge or store the left/right positions
//! - **Clock sync**: Measure the feeder clock drift and push host time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hungry_cat_ble::{
//!     BleTransport, ConnectionStateMachine, EventPresenter, FeederConfig, FeederController,
//!     Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FeederConfig::default();
//!     let (transport, transport_events) = BleTransport::new().await?;
//!     let presenter = EventPresenter::new(config.event_capacity);
//!     let mut events = presenter.subscribe();
//!
//!     let machine = ConnectionStateMachine::new(transport, presenter, config);
//!     let feeder = FeederController::spawn(machine, transport_events);
//!
//!     feeder.start_scan()?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     feeder.shutdown().await
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod config;
pub mod controller;
pub mod data;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod presenter;
pub mod protocol;

// Re-exports for convenience
pub use ble::{BleTransport, DiscoveredDevice, Transport, TransportEvent};
pub use config::{EpochZone, FeederConfig};
pub use controller::{FeederController, FeederHandle, Intent};
pub use data::{AlarmSetting, ClockDrift, ClockSyncResult, ClockSynchronizer};
pub use error::{Error, Result};
pub use lifecycle::{ActiveConnection, ConnectionState, ConnectionStateMachine};
pub use presenter::{EventPresenter, PresentationEvent, Presenter};
pub use protocol::{Command, Incoming};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let _ = std::any::TypeId::of::<FeederHandle>();
        let _ = std::any::TypeId::of::<BleTransport>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<AlarmSetting>();
        let _ = std::any::TypeId::of::<ClockSyncResult>();
        let _ = std::any::TypeId::of::<PresentationEvent>();
    }
}
