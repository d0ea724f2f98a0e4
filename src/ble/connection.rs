//! btleplug-backed implementation of [`Transport`].
//!
//! Combines the scanner (for peripheral lookup by address) with one
//! [`CharacteristicHandler`] per open connection.

use async_trait::async_trait;
use btleplug::api::Peripheral as _;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::characteristics::CharacteristicHandler;
use crate::ble::scanner::BleScanner;
use crate::ble::transport::{Transport, TransportEvent};
use crate::error::{Error, Result};

/// BLE transport on the host's first Bluetooth adapter.
pub struct BleTransport {
    /// Scanner, also the registry of peripherals seen while scanning.
    scanner: BleScanner,
    /// Open connections by address.
    connections: RwLock<HashMap<String, Arc<CharacteristicHandler>>>,
    /// Sender shared with scanner and notification listeners.
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl BleTransport {
    /// Create the transport and the receiver for its unsolicited events.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let scanner = BleScanner::new(event_tx.clone()).await?;

        Ok((
            Self {
                scanner,
                connections: RwLock::new(HashMap::new()),
                event_tx,
            },
            event_rx,
        ))
    }

    fn handler(&self, address: &str) -> Result<Arc<CharacteristicHandler>> {
        self.connections
            .read()
            .get(address)
            .cloned()
            .ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn start_scan(&self) -> Result<()> {
        self.scanner.start_scanning().await
    }

    async fn stop_scan(&self) -> Result<()> {
        self.scanner.stop_scanning().await
    }

    async fn connect(&self, address: &str) -> Result<()> {
        let peripheral = self
            .scanner
            .peripheral(address)
            .ok_or_else(|| Error::DeviceNotFound {
                address: address.to_string(),
            })?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral.connect().await.map_err(Error::Bluetooth)?;
        }

        info!("Connected to {}", address);

        let handler = Arc::new(CharacteristicHandler::new(peripheral, self.event_tx.clone()));
        self.connections
            .write()
            .insert(address.to_string(), handler);

        Ok(())
    }

    async fn close(&self, address: &str) -> Result<()> {
        let handler = self.connections.write().remove(address);

        let Some(handler) = handler else {
            debug!("No open connection to {}", address);
            return Ok(());
        };

        handler.stop_notifications();

        match handler.peripheral().disconnect().await {
            Ok(()) => {
                info!("Disconnected from {}", address);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to disconnect from {}: {}", address, e);
                Err(Error::Bluetooth(e))
            }
        }
    }

    async fn discover_services(&self, address: &str, services: &[Uuid]) -> Result<()> {
        self.handler(address)?.discover(services).await
    }

    async fn write_characteristic(
        &self,
        address: &str,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<()> {
        self.handler(address)?.write(&characteristic, data).await
    }

    async fn write_descriptor(
        &self,
        address: &str,
        characteristic: Uuid,
        descriptor: Uuid,
        data: &[u8],
    ) -> Result<()> {
        self.handler(address)?
            .write_descriptor(&characteristic, &descriptor, data)
            .await
    }

    async fn enable_notification(&self, address: &str, characteristic: Uuid) -> Result<()> {
        self.handler(address)?.subscribe(&characteristic).await
    }
}
