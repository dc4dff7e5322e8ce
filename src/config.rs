//! Command-line configuration helpers.

use clap::Args;
use std::time::Duration;

/// Optional fields added to state payloads (and their discovery descriptors).
#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishFields {
    /// Publish signal strength (RSSI in dBm)
    #[arg(long = "publish-rssi")]
    pub rssi: bool,

    /// Publish an ISO-8601 timestamp of the last reading
    #[arg(long = "publish-last-seen")]
    pub last_seen: bool,

    /// Publish link quality (0-100%) derived from RSSI
    #[arg(long = "publish-link-quality")]
    pub link_quality: bool,

    /// Publish a low battery binary sensor
    #[arg(long = "publish-battery-low")]
    pub battery_low: bool,

    /// Publish seconds since the previous reading
    #[arg(long = "publish-data-age")]
    pub data_age: bool,
}

impl PublishFields {
    /// Every optional field enabled.
    pub fn all() -> Self {
        Self {
            rssi: true,
            last_seen: true,
            link_quality: true,
            battery_low: true,
            data_age: true,
        }
    }

    /// Human-readable names of the enabled fields, for the startup log.
    pub fn enabled_names(&self) -> Vec<&'static str> {
        [
            (self.rssi, "RSSI"),
            (self.last_seen, "Last Seen"),
            (self.link_quality, "Link Quality"),
            (self.battery_low, "Battery Low"),
            (self.data_age, "Data Age"),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .collect()
    }
}

/// Parse a battery percentage threshold (0-100).
pub fn parse_percentage(src: &str) -> Result<u8, String> {
    let value: u8 = src
        .trim()
        .parse()
        .map_err(|_| format!("invalid percentage: {src}"))?;
    if value > 100 {
        return Err(format!("percentage out of range: {value}"));
    }
    Ok(value)
}

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// # Examples
/// ```
/// use jaalee_listener::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("300").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let parse = |num: &str, unit: &str| -> Result<u64, String> {
        num.trim()
            .parse()
            .map_err(|_| format!("invalid {unit}: {num}"))
    };

    if let Some(num) = src.strip_suffix("ms") {
        return Ok(Duration::from_millis(parse(num, "milliseconds")?));
    }
    let scaled = |value: u64, factor: u64| -> Result<Duration, String> {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| "duration too large".to_string())
    };

    if let Some(num) = src.strip_suffix('h') {
        return scaled(parse(num, "hours")?, 3600);
    }
    if let Some(num) = src.strip_suffix('m') {
        return scaled(parse(num, "minutes")?, 60);
    }
    if let Some(num) = src.strip_suffix('s') {
        return Ok(Duration::from_secs(parse(num, "seconds")?));
    }

    Ok(Duration::from_secs(parse(src, "duration")?))
}

/// Like [`parse_duration`] but rejects zero, for periodic timers.
pub fn parse_nonzero_duration(src: &str) -> Result<Duration, String> {
    let duration = parse_duration(src)?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
