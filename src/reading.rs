//! Decoded Jaalee sensor reading.

use std::fmt;

/// Lowest temperature (°C) the sensor can physically report.
pub const TEMPERATURE_MIN: f64 = -40.0;
/// Highest temperature (°C) the sensor can physically report.
pub const TEMPERATURE_MAX: f64 = 80.0;
/// Relative humidity bounds in percent.
pub const HUMIDITY_MIN: f64 = 0.0;
pub const HUMIDITY_MAX: f64 = 100.0;

/// Round to two decimal places.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Wire encoding a reading was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 24-byte iBeacon style frame.
    LongFrame,
    /// 15 or 16 byte frame carrying the device address.
    ShortFrame,
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFormat::LongFrame => write!(f, "ibeacon-24"),
            FrameFormat::ShortFrame => write!(f, "short"),
        }
    }
}

/// A calibrated, plausibility-checked reading from a Jaalee JHT sensor.
///
/// Values are always in range: temperature within
/// [`TEMPERATURE_MIN`]..=[`TEMPERATURE_MAX`] °C and humidity within
/// [`HUMIDITY_MIN`]..=[`HUMIDITY_MAX`] %. Obtain one from [`crate::decoder::decode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    temperature: f64,
    humidity: f64,
    battery: u8,
    format: FrameFormat,
}

impl Reading {
    /// Build a reading, or `None` when the values are outside the sensor's range.
    pub(crate) fn new(
        temperature: f64,
        humidity: f64,
        battery: u8,
        format: FrameFormat,
    ) -> Option<Self> {
        Self::is_plausible(temperature, humidity).then_some(Self {
            temperature,
            humidity,
            battery,
            format,
        })
    }

    /// Whether the given values satisfy the physical bounds of the sensor.
    pub fn is_plausible(temperature: f64, humidity: f64) -> bool {
        (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&temperature)
            && (HUMIDITY_MIN..=HUMIDITY_MAX).contains(&humidity)
    }

    /// Temperature in Celsius, two decimals
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity in percent, two decimals
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Battery level in percent as reported by the device
    pub fn battery(&self) -> u8 {
        self.battery
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }
}

/// Presentation unit for temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a validated Celsius value into this unit.
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => round2(celsius * 9.0 / 5.0 + 32.0),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}
