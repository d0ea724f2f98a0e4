//! BLE Service, Characteristic and Descriptor UUIDs.
//!
//! The feeder runs on a RedBearLab BLE shield. These identifiers must match
//! the shield firmware exactly.

use uuid::Uuid;

/// RedBearLab UART-style service UUID.
pub const FEEDER_SERVICE_UUID: Uuid = Uuid::from_u128(0x713d_0000_503e_4c75_ba94_3148f18d941e);

/// Notify characteristic UUID (device to host, "TX" on the shield).
pub const FEEDER_NOTIFY_UUID: Uuid = Uuid::from_u128(0x713d_0002_503e_4c75_ba94_3148f18d941e);

/// Write characteristic UUID (host to device, "RX" on the shield).
pub const FEEDER_WRITE_UUID: Uuid = Uuid::from_u128(0x713d_0003_503e_4c75_ba94_3148f18d941e);

/// Standard Client Characteristic Configuration Descriptor UUID.
pub const CLIENT_CHARACTERISTIC_CONFIG_UUID: Uuid =
    Uuid::from_u128(0x0000_2902_0000_1000_8000_00805f9b34fb);

/// CCCD value that turns notifications on.
pub const NOTIFICATION_ENABLE: [u8; 2] = [1, 0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            FEEDER_SERVICE_UUID.to_string(),
            "713d0000-503e-4c75-ba94-3148f18d941e"
        );
        assert_eq!(
            FEEDER_NOTIFY_UUID.to_string(),
            "713d0002-503e-4c75-ba94-3148f18d941e"
        );
        assert_eq!(
            FEEDER_WRITE_UUID.to_string(),
            "713d0003-503e-4c75-ba94-3148f18d941e"
        );
        assert_eq!(
            CLIENT_CHARACTERISTIC_CONFIG_UUID.to_string(),
            "00002902-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_characteristics_share_service_base() {
        const BASE: u128 = 0xffff_0000_ffff_ffff_ffff_ffff_ffff_ffff;
        let service = FEEDER_SERVICE_UUID.as_u128() & BASE;
        assert_eq!(FEEDER_WRITE_UUID.as_u128() & BASE, service);
        assert_eq!(FEEDER_NOTIFY_UUID.as_u128() & BASE, service);
        assert_eq!(NOTIFICATION_ENABLE, [1, 0]);
    }
}
