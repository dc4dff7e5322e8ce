//! Jaalee JHT advertisement decoder.
//!
//! Two wire encodings carry the same sensor payload and are told apart by
//! length alone:
//!
//! - **Long frame** (24 bytes): iBeacon layout. `02 15` header, a 16 byte UUID
//!   containing the `F5 25` vendor marker somewhere in it, then big-endian
//!   temperature (major) and humidity (minor), tx power and battery.
//! - **Short frame** (15 or 16 bytes): battery at byte 4, the device address
//!   reversed at bytes 5..=10, temperature and humidity in the last four bytes.
//!
//! Every rejection is a normal outcome. [`DecodeError`] only says why a frame
//! was not recognized.

use crate::mac_address::MacAddress;
use crate::reading::{FrameFormat, Reading, round2};
use thiserror::Error;

/// Length of the iBeacon style frame.
pub const LONG_FRAME_LEN: usize = 24;
/// Accepted lengths of the compact frame.
pub const SHORT_FRAME_LENS: [usize; 2] = [15, 16];

/// iBeacon type/length header.
const LONG_FRAME_HEADER: [u8; 2] = [0x02, 0x15];
/// Vendor marker inside the UUID. Firmware revisions move it around.
const JAALEE_MARKER: [u8; 2] = [0xF5, 0x25];
/// Marker start offsets scanned in a long frame (inclusive).
const MARKER_SCAN_START: usize = 2;
const MARKER_SCAN_END: usize = 16;

const LONG_TEMPERATURE_OFFSET: usize = 18;
const LONG_HUMIDITY_OFFSET: usize = 20;
const LONG_BATTERY_OFFSET: usize = 23;

const SHORT_BATTERY_OFFSET: usize = 4;
const SHORT_ADDRESS_OFFSET: usize = 5;

const TEMPERATURE_SCALE: f64 = 175.0;
const TEMPERATURE_OFFSET: f64 = -45.0;
const HUMIDITY_SCALE: f64 = 100.0;
const ADC_MAX: f64 = 65535.0;

/// Reasons a frame was not recognized as a Jaalee reading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Unsupported frame length: {0} bytes")]
    UnsupportedLength(usize),
    #[error("Invalid header: expected 02 15, got {:02X} {:02X}", .0[0], .0[1])]
    InvalidHeader([u8; 2]),
    #[error("Jaalee marker F5 25 not found")]
    MissingMarker,
    #[error("Address mismatch: sender {sender}, frame carries {embedded}")]
    AddressMismatch {
        sender: MacAddress,
        embedded: MacAddress,
    },
    #[error("Implausible values: temperature {temperature}°C, humidity {humidity}%")]
    Implausible { temperature: f64, humidity: f64 },
}

/// Calibrate a raw temperature sample to °C.
#[inline]
pub fn calibrate_temperature(raw: u16) -> f64 {
    round2(TEMPERATURE_SCALE * f64::from(raw) / ADC_MAX + TEMPERATURE_OFFSET)
}

/// Calibrate a raw humidity sample to percent.
#[inline]
pub fn calibrate_humidity(raw: u16) -> f64 {
    round2(HUMIDITY_SCALE * f64::from(raw) / ADC_MAX)
}

fn u16_be(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Decode manufacturer data into a [`Reading`].
///
/// # Arguments
/// * `data` - The manufacturer-specific payload (company ID already stripped)
/// * `sender` - Address the advertisement was received from, if known. Short
///   frames are only accepted when their embedded address matches it.
pub fn decode(data: &[u8], sender: Option<MacAddress>) -> Result<Reading, DecodeError> {
    match data.len() {
        LONG_FRAME_LEN => decode_long_frame(data),
        n if SHORT_FRAME_LENS.contains(&n) => decode_short_frame(data, sender),
        n => Err(DecodeError::UnsupportedLength(n)),
    }
}

fn has_marker(data: &[u8]) -> bool {
    (MARKER_SCAN_START..=MARKER_SCAN_END)
        .any(|i| data[i] == JAALEE_MARKER[0] && data[i + 1] == JAALEE_MARKER[1])
}

fn decode_long_frame(data: &[u8]) -> Result<Reading, DecodeError> {
    let header = [data[0], data[1]];
    if header != LONG_FRAME_HEADER {
        return Err(DecodeError::InvalidHeader(header));
    }

    if !has_marker(data) {
        return Err(DecodeError::MissingMarker);
    }

    calibrated(
        u16_be(data, LONG_TEMPERATURE_OFFSET),
        u16_be(data, LONG_HUMIDITY_OFFSET),
        data[LONG_BATTERY_OFFSET],
        FrameFormat::LongFrame,
    )
}

fn decode_short_frame(data: &[u8], sender: Option<MacAddress>) -> Result<Reading, DecodeError> {
    let mut address = [0u8; 6];
    address.copy_from_slice(&data[SHORT_ADDRESS_OFFSET..SHORT_ADDRESS_OFFSET + 6]);
    let embedded = MacAddress::from_reversed(address);

    if let Some(sender) = sender
        && sender != embedded
    {
        return Err(DecodeError::AddressMismatch { sender, embedded });
    }

    let len = data.len();
    calibrated(
        u16_be(data, len - 4),
        u16_be(data, len - 2),
        data[SHORT_BATTERY_OFFSET],
        FrameFormat::ShortFrame,
    )
}

fn calibrated(
    temperature_raw: u16,
    humidity_raw: u16,
    battery: u8,
    format: FrameFormat,
) -> Result<Reading, DecodeError> {
    let temperature = calibrate_temperature(temperature_raw);
    let humidity = calibrate_humidity(humidity_raw);

    Reading::new(temperature, humidity, battery, format).ok_or_else(|| {
        log::debug!("Sensor data validation failed ({format}): {temperature}°C, {humidity}%");
        DecodeError::Implausible {
            temperature,
            humidity,
        }
    })
}
