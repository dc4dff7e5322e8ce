//! In-memory tracking state per device.
//!
//! Presence of a record means the device has been announced and has not timed
//! out since. There is no separate offline flag: the sweeper deletes records,
//! so a device that comes back looks exactly like a new one.

use crate::mac_address::MacAddress;
use std::collections::HashMap;
use std::time::SystemTime;

/// Tracking record for one device.
///
/// Holding a record is what marks the device as announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Time of the most recent successful decode
    pub last_seen_at: SystemTime,
    /// Time the most recent reading was handed downstream
    pub last_data_at: SystemTime,
}

impl DeviceRecord {
    fn new(now: SystemTime) -> Self {
        Self {
            last_seen_at: now,
            last_data_at: now,
        }
    }
}

/// Map of hardware address to tracking record.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: HashMap<MacAddress, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &MacAddress) -> Option<&DeviceRecord> {
        self.records.get(address)
    }

    /// Insert a fresh record for `address` unless one exists.
    ///
    /// Returns `true` when the record was created.
    pub fn insert_new(&mut self, address: MacAddress, now: SystemTime) -> bool {
        if self.records.contains_key(&address) {
            return false;
        }
        self.records.insert(address, DeviceRecord::new(now));
        true
    }

    /// Refresh both timestamps of an existing record.
    pub fn touch(&mut self, address: &MacAddress, now: SystemTime) {
        if let Some(record) = self.records.get_mut(address) {
            record.last_seen_at = now;
            record.last_data_at = now;
        }
    }

    /// Remove every record matching `predicate`, returning the removed entries.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<(MacAddress, DeviceRecord)>
    where
        F: FnMut(&DeviceRecord) -> bool,
    {
        let expired: Vec<MacAddress> = self
            .records
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(address, _)| *address)
            .collect();

        expired
            .into_iter()
            .filter_map(|address| self.records.remove(&address).map(|r| (address, r)))
            .collect()
    }

    pub fn contains(&self, address: &MacAddress) -> bool {
        self.records.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_MAC, t0};
    use std::time::Duration;

    #[test]
    fn test_insert_new_only_once() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.insert_new(TEST_MAC, t0()));
        assert!(!registry.insert_new(TEST_MAC, t0() + Duration::from_secs(5)));

        let record = registry.get(&TEST_MAC).unwrap();
        assert_eq!(record.last_seen_at, t0());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_touch_refreshes_timestamps() {
        let mut registry = DeviceRegistry::new();
        registry.insert_new(TEST_MAC, t0());
        let later = t0() + Duration::from_secs(30);
        registry.touch(&TEST_MAC, later);

        let record = registry.get(&TEST_MAC).unwrap();
        assert_eq!(record.last_seen_at, later);
        assert_eq!(record.last_data_at, later);
    }

    #[test]
    fn test_touch_unknown_address_is_noop() {
        let mut registry = DeviceRegistry::new();
        registry.touch(&TEST_MAC, t0());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_where() {
        let mut registry = DeviceRegistry::new();
        let other = MacAddress([1, 2, 3, 4, 5, 6]);
        registry.insert_new(TEST_MAC, t0());
        registry.insert_new(other, t0() + Duration::from_secs(100));

        let removed = registry.remove_where(|r| r.last_seen_at < t0() + Duration::from_secs(50));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, TEST_MAC);
        assert!(!registry.contains(&TEST_MAC));
        assert!(registry.contains(&other));
    }

    #[test]
    fn test_addresses_compared_bytewise() {
        let mut registry = DeviceRegistry::new();
        let parsed: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        registry.insert_new(TEST_MAC, t0());
        assert!(registry.contains(&parsed));
    }
}
