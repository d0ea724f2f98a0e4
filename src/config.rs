//! Controller configuration.

/// Zone whose 2000-01-01 midnight is the epoch of the `now` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EpochZone {
    /// The host's local timezone.
    #[default]
    Local,
    /// A fixed offset east of UTC, in seconds.
    Fixed {
        /// Offset east of UTC in seconds.
        offset_seconds: i32,
    },
}

/// Configuration for the feeder controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeederConfig {
    /// Advertised name of feeder devices.
    pub feeder_name: String,
    /// Epoch zone for clock pushes.
    pub epoch_zone: EpochZone,
    /// Capacity of the presentation event broadcast channel.
    pub event_capacity: usize,
    /// Send `list` as soon as the connection is ready.
    pub request_listing_on_ready: bool,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            feeder_name: "HungryCat".to_string(),
            epoch_zone: EpochZone::Local,
            event_capacity: 64,
            request_listing_on_ready: true,
        }
    }
}

impl FeederConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised feeder name.
    pub fn with_feeder_name(mut self, name: impl Into<String>) -> Self {
        self.feeder_name = name.into();
        self
    }

    /// Set the epoch zone for clock pushes.
    pub fn with_epoch_zone(mut self, zone: EpochZone) -> Self {
        self.epoch_zone = zone;
        self
    }

    /// Set the presentation event channel capacity (at least 1).
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Enable or disable the `list` request on connect.
    pub fn with_request_listing_on_ready(mut self, enabled: bool) -> Self {
        self.request_listing_on_ready = enabled;
        self
    }

    /// Whether an advertised name belongs to a feeder.
    pub fn is_feeder_name(&self, name: Option<&str>) -> bool {
        name == Some(self.feeder_name.as_str())
    }
}
