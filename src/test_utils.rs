use crate::mac_address::MacAddress;
use crate::reading::{FrameFormat, Reading};
use std::time::{Duration, SystemTime};

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Fixed wall-clock origin so tests never depend on the real clock.
pub fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000)
}

/// Build a 24-byte long frame with the vendor marker at `offset`.
pub fn long_frame_with_marker_at(
    offset: usize,
    temperature_raw: u16,
    humidity_raw: u16,
    battery: u8,
) -> Vec<u8> {
    let mut frame = vec![0u8; 24];
    frame[0] = 0x02;
    frame[1] = 0x15;
    frame[offset] = 0xF5;
    frame[offset + 1] = 0x25;
    frame[18..20].copy_from_slice(&temperature_raw.to_be_bytes());
    frame[20..22].copy_from_slice(&humidity_raw.to_be_bytes());
    frame[22] = 0xC5; // tx power
    frame[23] = battery;
    frame
}

/// Build a long frame with the marker where current firmware puts it (end of the UUID).
pub fn long_frame(temperature_raw: u16, humidity_raw: u16, battery: u8) -> Vec<u8> {
    long_frame_with_marker_at(16, temperature_raw, humidity_raw, battery)
}

/// Build a short frame of `len` (15 or 16) bytes embedding `mac` reversed.
pub fn short_frame(
    len: usize,
    mac: MacAddress,
    temperature_raw: u16,
    humidity_raw: u16,
    battery: u8,
) -> Vec<u8> {
    let mut frame = vec![0u8; len];
    frame[0..4].copy_from_slice(&[0x02, 0x01, 0x06, 0x0B]);
    frame[4] = battery;
    for (i, octet) in mac.0.iter().rev().enumerate() {
        frame[5 + i] = *octet;
    }
    frame[len - 4..len - 2].copy_from_slice(&temperature_raw.to_be_bytes());
    frame[len - 2..].copy_from_slice(&humidity_raw.to_be_bytes());
    frame
}

/// A plausible reading for tracker and formatter tests.
pub fn reading(battery: u8) -> Reading {
    Reading::new(21.5, 45.25, battery, FrameFormat::LongFrame).unwrap()
}
