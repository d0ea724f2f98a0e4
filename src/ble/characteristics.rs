//! GATT characteristic handling.
//!
//! Provides writing, descriptor configuration and notification forwarding
//! for a connected feeder.

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use bytes::Bytes;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::ble::transport::TransportEvent;
use crate::error::{Error, Result};

/// Handler for GATT characteristics on a connected peripheral.
pub struct CharacteristicHandler {
    /// The peripheral to communicate with.
    peripheral: Peripheral,
    /// Cached characteristics by UUID.
    characteristics: Arc<RwLock<HashMap<Uuid, Characteristic>>>,
    /// Channel notifications are forwarded to.
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    /// Handle to the notification listener task.
    listener_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl CharacteristicHandler {
    /// Create a new characteristic handler for a connected peripheral.
    pub fn new(peripheral: Peripheral, event_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            peripheral,
            characteristics: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            listener_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Discover services, cache their characteristics and check that every
    /// required service is present.
    pub async fn discover(&self, required: &[Uuid]) -> Result<()> {
        self.peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        let services = self.peripheral.services();

        for uuid in required {
            if !services.iter().any(|s| s.uuid == *uuid) {
                return Err(Error::ServiceNotFound {
                    uuid: uuid.to_string(),
                });
            }
        }

        let mut chars = self.characteristics.write();
        chars.clear();

        for service in services {
            for characteristic in service.characteristics {
                debug!(
                    "Found characteristic: {} in service {}",
                    characteristic.uuid, service.uuid
                );
                chars.insert(characteristic.uuid, characteristic);
            }
        }

        debug!("Discovered {} characteristics", chars.len());

        Ok(())
    }

    /// Get a characteristic by UUID.
    pub fn get_characteristic(&self, uuid: &Uuid) -> Result<Characteristic> {
        self.characteristics
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Write to a characteristic.
    pub async fn write(&self, uuid: &Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.get_characteristic(uuid)?;

        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(Error::Bluetooth)?;

        trace!("Wrote {} bytes to characteristic {}", data.len(), uuid);

        Ok(())
    }

    /// Write to a descriptor of a characteristic.
    pub async fn write_descriptor(&self, uuid: &Uuid, descriptor: &Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.get_characteristic(uuid)?;

        let target = characteristic
            .descriptors
            .iter()
            .find(|d| d.uuid == *descriptor)
            .cloned()
            .ok_or_else(|| Error::DescriptorNotFound {
                characteristic: uuid.to_string(),
                descriptor: descriptor.to_string(),
            })?;

        self.peripheral
            .write_descriptor(&target, data)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Wrote descriptor {} on {}: {:02X?}", descriptor, uuid, data);

        Ok(())
    }

    /// Subscribe to a characteristic and forward its notifications.
    pub async fn subscribe(&self, uuid: &Uuid) -> Result<()> {
        let characteristic = self.get_characteristic(uuid)?;

        debug!(
            "Found characteristic {}, properties: {:?}",
            uuid, characteristic.properties
        );

        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Subscribed to notifications from {}", uuid);

        self.start_listener(*uuid).await
    }

    /// Spawn the task that forwards notifications of `uuid` to the event channel.
    async fn start_listener(&self, uuid: Uuid) -> Result<()> {
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;

        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }

                trace!(
                    "Notification from {}: {} bytes",
                    notification.uuid,
                    notification.value.len()
                );

                let event = TransportEvent::Notification(Bytes::from(notification.value));
                if event_tx.send(event).is_err() {
                    error!("Notification receiver dropped");
                    break;
                }
            }

            debug!("Notification listener stopped");
        });

        let previous = self.listener_handle.write().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }

        Ok(())
    }

    /// Stop forwarding notifications.
    pub fn stop_notifications(&self) {
        if let Some(handle) = self.listener_handle.write().take() {
            handle.abort();
        }
    }
}

impl Drop for CharacteristicHandler {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}
