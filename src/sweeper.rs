//! Periodic timeout sweep over the device registry.

use crate::registry::DeviceRegistry;
use crate::tracker::LifecycleEvent;
use std::time::{Duration, SystemTime};

/// Default period between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);
/// Default silence after which a device is considered offline.
pub const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(300);

/// Forgets devices that have been silent for longer than `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSweeper {
    /// How often the event loop should call [`TimeoutSweeper::sweep`]
    pub interval: Duration,
    /// Silence threshold, exclusive
    pub timeout: Duration,
}

impl Default for TimeoutSweeper {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            timeout: DEFAULT_SENSOR_TIMEOUT,
        }
    }
}

impl TimeoutSweeper {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Remove every record silent for more than `timeout` and emit `Offline` for each.
    ///
    /// A record whose `last_seen_at` lies in the future (clock stepped back) is kept.
    pub fn sweep(&self, registry: &mut DeviceRegistry, now: SystemTime) -> Vec<LifecycleEvent> {
        let timeout = self.timeout;
        registry
            .remove_where(|record| {
                now.duration_since(record.last_seen_at)
                    .is_ok_and(|silent| silent > timeout)
            })
            .into_iter()
            .map(|(address, record)| {
                let silent = now
                    .duration_since(record.last_seen_at)
                    .unwrap_or_default()
                    .as_secs();
                log::warn!("Sensor timeout: {address} (no data for {silent}s)");
                LifecycleEvent::Offline(address)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac_address::MacAddress;
    use crate::test_utils::{TEST_MAC, t0};

    fn registry_with(entries: &[(MacAddress, SystemTime)]) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        for (address, at) in entries {
            registry.insert_new(*address, *at);
        }
        registry
    }

    #[test]
    fn test_defaults() {
        let sweeper = TimeoutSweeper::default();
        assert_eq!(sweeper.interval, Duration::from_secs(120));
        assert_eq!(sweeper.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_exactly_at_timeout_is_kept() {
        let sweeper = TimeoutSweeper::default();
        let mut registry = registry_with(&[(TEST_MAC, t0())]);

        let events = sweeper.sweep(&mut registry, t0() + Duration::from_secs(300));
        assert!(events.is_empty());
        assert!(registry.contains(&TEST_MAC));
    }

    #[test]
    fn test_past_timeout_goes_offline_and_is_forgotten() {
        let sweeper = TimeoutSweeper::default();
        let mut registry = registry_with(&[(TEST_MAC, t0())]);

        let events = sweeper.sweep(&mut registry, t0() + Duration::from_secs(301));
        assert_eq!(events, vec![LifecycleEvent::Offline(TEST_MAC)]);
        assert!(registry.is_empty());

        // Nothing left to time out on the next pass
        let events = sweeper.sweep(&mut registry, t0() + Duration::from_secs(600));
        assert!(events.is_empty());
    }

    #[test]
    fn test_each_device_judged_on_its_own_record() {
        let sweeper = TimeoutSweeper::new(Duration::from_secs(10), Duration::from_secs(60));
        let fresh = MacAddress([1, 2, 3, 4, 5, 6]);
        let mut registry = registry_with(&[
            (TEST_MAC, t0()),
            (fresh, t0() + Duration::from_secs(50)),
        ]);

        let events = sweeper.sweep(&mut registry, t0() + Duration::from_secs(61));
        assert_eq!(events, vec![LifecycleEvent::Offline(TEST_MAC)]);
        assert!(registry.contains(&fresh));
    }

    #[test]
    fn test_clock_going_backwards_keeps_record() {
        let sweeper = TimeoutSweeper::default();
        let mut registry = registry_with(&[(TEST_MAC, t0())]);

        let events = sweeper.sweep(&mut registry, t0() - Duration::from_secs(1000));
        assert!(events.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
