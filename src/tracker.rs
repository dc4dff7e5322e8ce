//! Device liveness tracking.
//!
//! [`LivenessTracker`] owns the [`DeviceRegistry`] and turns every decoded
//! reading into a short list of [`LifecycleEvent`]s for the publisher. The
//! periodic timeout sweep runs through the same value so registry access is
//! always single-writer.

use crate::mac_address::MacAddress;
use crate::reading::Reading;
use crate::registry::DeviceRegistry;
use crate::sweeper::TimeoutSweeper;
use std::time::{Duration, SystemTime};

/// Default battery percentage at or below which a device is flagged low.
pub const DEFAULT_BATTERY_LOW_THRESHOLD: u8 = 20;

/// RSSI mapped to 100% link quality.
const RSSI_EXCELLENT: i16 = -30;
/// RSSI mapped to 0% link quality.
const RSSI_UNUSABLE: i16 = -90;

/// Map RSSI (dBm) linearly onto 0..=100.
///
/// ```
/// use jaalee_listener::tracker::link_quality;
///
/// assert_eq!(link_quality(-30), 100);
/// assert_eq!(link_quality(-60), 50);
/// assert_eq!(link_quality(-90), 0);
/// ```
pub fn link_quality(rssi: i16) -> u8 {
    let range = f64::from(RSSI_EXCELLENT - RSSI_UNUSABLE);
    let quality = f64::from(i32::from(rssi) - i32::from(RSSI_UNUSABLE)) * 100.0 / range;
    quality.clamp(0.0, 100.0).round() as u8
}

/// Per-reading diagnostics derived from the tracking record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Link quality in percent
    pub link_quality: u8,
    /// Battery at or below the configured threshold
    pub battery_low: bool,
    /// Whole seconds since the previous reading from this device (0 for a new device)
    pub data_age: u64,
    /// Time this reading was observed
    pub last_seen: SystemTime,
}

/// Events emitted for downstream publication.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// First reading since the device was unknown; announce it.
    FirstSeen(MacAddress),
    Online(MacAddress),
    Data {
        address: MacAddress,
        reading: Reading,
        rssi: i16,
        diagnostics: Diagnostics,
    },
    Offline(MacAddress),
}

impl LifecycleEvent {
    pub fn address(&self) -> MacAddress {
        match self {
            LifecycleEvent::FirstSeen(address)
            | LifecycleEvent::Online(address)
            | LifecycleEvent::Offline(address) => *address,
            LifecycleEvent::Data { address, .. } => *address,
        }
    }

    /// Availability payload for status events.
    pub fn status(&self) -> Option<&'static str> {
        match self {
            LifecycleEvent::Online(_) => Some("online"),
            LifecycleEvent::Offline(_) => Some("offline"),
            _ => None,
        }
    }
}

/// Tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub battery_low_threshold: u8,
    pub sensor_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let sweeper = TimeoutSweeper::default();
        Self {
            battery_low_threshold: DEFAULT_BATTERY_LOW_THRESHOLD,
            sensor_timeout: sweeper.timeout,
            sweep_interval: sweeper.interval,
        }
    }
}

#[derive(Debug)]
pub struct LivenessTracker {
    registry: DeviceRegistry,
    sweeper: TimeoutSweeper,
    battery_low_threshold: u8,
}

impl LivenessTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            sweeper: TimeoutSweeper::new(config.sweep_interval, config.sensor_timeout),
            battery_low_threshold: config.battery_low_threshold,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweeper.interval
    }

    /// Record a decoded reading from `address` observed at `now`.
    ///
    /// An unknown device yields `[FirstSeen, Online, Data]`, a tracked one
    /// yields `[Data]`.
    pub fn observe(
        &mut self,
        address: MacAddress,
        reading: Reading,
        rssi: i16,
        now: SystemTime,
    ) -> Vec<LifecycleEvent> {
        let mut events = Vec::with_capacity(3);

        let data_age = self
            .registry
            .get(&address)
            .and_then(|record| now.duration_since(record.last_data_at).ok())
            .map_or(0, |age| age.as_secs());

        if self.registry.insert_new(address, now) {
            log::info!("New Jaalee JHT device: {address}");
            events.push(LifecycleEvent::FirstSeen(address));
            events.push(LifecycleEvent::Online(address));
        } else {
            self.registry.touch(&address, now);
        }

        events.push(LifecycleEvent::Data {
            address,
            reading,
            rssi,
            diagnostics: Diagnostics {
                link_quality: link_quality(rssi),
                battery_low: reading.battery() <= self.battery_low_threshold,
                data_age,
                last_seen: now,
            },
        });

        events
    }

    /// Run one timeout sweep at `now`.
    pub fn sweep(&mut self, now: SystemTime) -> Vec<LifecycleEvent> {
        self.sweeper.sweep(&mut self.registry, now)
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
