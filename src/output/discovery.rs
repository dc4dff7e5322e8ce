//! Home Assistant MQTT discovery descriptors.
//!
//! Each entity a Jaalee device exposes is a [`SensorKind`]; the descriptor
//! template for a kind is fixed and only the per-device parts (ids, topics,
//! device block) are filled in.

use crate::config::PublishFields;
use crate::reading::TemperatureUnit;
use serde::Serialize;

pub const MODEL: &str = "Jaalee JHT";
pub const MANUFACTURER: &str = "Jaalee";
pub const PAYLOAD_AVAILABLE: &str = "online";
pub const PAYLOAD_NOT_AVAILABLE: &str = "offline";
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

/// Entities published for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Battery,
    Rssi,
    LastSeen,
    LinkQuality,
    DataAge,
    BatteryLow,
}

/// Fixed part of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub unit_of_measurement: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub entity_category: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub enabled_by_default: bool,
}

const MEASUREMENT: Option<&str> = Some("measurement");
const DIAGNOSTIC: Option<&str> = Some("diagnostic");

impl SensorKind {
    /// Entity key, used in unique ids, topics and value templates.
    pub fn key(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Battery => "battery",
            SensorKind::Rssi => "rssi",
            SensorKind::LastSeen => "last_seen",
            SensorKind::LinkQuality => "link_quality",
            SensorKind::DataAge => "data_age",
            SensorKind::BatteryLow => "battery_low",
        }
    }

    /// Home Assistant component the entity belongs to.
    pub fn component(self) -> &'static str {
        match self {
            SensorKind::BatteryLow => "binary_sensor",
            _ => "sensor",
        }
    }

    pub fn template(self, unit: TemperatureUnit) -> Template {
        match self {
            SensorKind::Temperature => Template {
                name: "Temperature",
                unit_of_measurement: Some(unit.symbol()),
                device_class: Some("temperature"),
                state_class: MEASUREMENT,
                entity_category: None,
                icon: None,
                enabled_by_default: true,
            },
            SensorKind::Humidity => Template {
                name: "Humidity",
                unit_of_measurement: Some("%"),
                device_class: Some("humidity"),
                state_class: MEASUREMENT,
                entity_category: None,
                icon: None,
                enabled_by_default: true,
            },
            SensorKind::Battery => Template {
                name: "Battery",
                unit_of_measurement: Some("%"),
                device_class: Some("battery"),
                state_class: MEASUREMENT,
                entity_category: DIAGNOSTIC,
                icon: None,
                enabled_by_default: true,
            },
            SensorKind::Rssi => Template {
                name: "Signal Strength",
                unit_of_measurement: Some("dBm"),
                device_class: Some("signal_strength"),
                state_class: MEASUREMENT,
                entity_category: DIAGNOSTIC,
                icon: None,
                enabled_by_default: false,
            },
            SensorKind::LastSeen => Template {
                name: "Last Seen",
                unit_of_measurement: None,
                device_class: Some("timestamp"),
                state_class: None,
                entity_category: DIAGNOSTIC,
                icon: None,
                enabled_by_default: false,
            },
            SensorKind::LinkQuality => Template {
                name: "Link Quality",
                unit_of_measurement: Some("%"),
                device_class: None,
                state_class: MEASUREMENT,
                entity_category: DIAGNOSTIC,
                icon: Some("mdi:wifi"),
                enabled_by_default: false,
            },
            SensorKind::DataAge => Template {
                name: "Data Age",
                unit_of_measurement: Some("s"),
                device_class: None,
                state_class: MEASUREMENT,
                entity_category: DIAGNOSTIC,
                icon: Some("mdi:clock-outline"),
                enabled_by_default: false,
            },
            SensorKind::BatteryLow => Template {
                name: "Battery Low",
                unit_of_measurement: None,
                device_class: Some("battery"),
                state_class: None,
                entity_category: DIAGNOSTIC,
                icon: None,
                enabled_by_default: false,
            },
        }
    }

    /// Kinds to announce: the three primary sensors, then enabled optional ones.
    pub fn announced(fields: &PublishFields) -> Vec<SensorKind> {
        let mut kinds = vec![
            SensorKind::Temperature,
            SensorKind::Humidity,
            SensorKind::Battery,
        ];
        let optional = [
            (fields.rssi, SensorKind::Rssi),
            (fields.last_seen, SensorKind::LastSeen),
            (fields.link_quality, SensorKind::LinkQuality),
            (fields.data_age, SensorKind::DataAge),
            (fields.battery_low, SensorKind::BatteryLow),
        ];
        kinds.extend(
            optional
                .into_iter()
                .filter_map(|(enabled, kind)| enabled.then_some(kind)),
        );
        kinds
    }
}

/// Device block shared by all entities of one sensor.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub model: &'static str,
    pub manufacturer: &'static str,
    pub sw_version: &'static str,
}

impl DeviceInfo {
    pub fn new(device_id: &str, name: &str) -> Self {
        Self {
            identifiers: vec![device_id.to_string()],
            name: name.to_string(),
            model: MODEL,
            manufacturer: MANUFACTURER,
            sw_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Full discovery config payload for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct Descriptor<'a> {
    pub name: &'static str,
    pub unique_id: String,
    pub state_topic: &'a str,
    pub value_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,
    pub enabled_by_default: bool,
    pub availability_topic: &'a str,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    pub device: &'a DeviceInfo,
}

impl<'a> Descriptor<'a> {
    pub fn new(
        kind: SensorKind,
        unit: TemperatureUnit,
        device_id: &str,
        state_topic: &'a str,
        availability_topic: &'a str,
        device: &'a DeviceInfo,
    ) -> Self {
        let template = kind.template(unit);
        let binary = kind.component() == "binary_sensor";
        Self {
            name: template.name,
            unique_id: format!("{device_id}_{}", kind.key()),
            state_topic,
            value_template: format!("{{{{ value_json.{} }}}}", kind.key()),
            unit_of_measurement: template.unit_of_measurement,
            device_class: template.device_class,
            state_class: template.state_class,
            entity_category: template.entity_category,
            icon: template.icon,
            payload_on: binary.then_some(PAYLOAD_ON),
            payload_off: binary.then_some(PAYLOAD_OFF),
            enabled_by_default: template.enabled_by_default,
            availability_topic,
            payload_available: PAYLOAD_AVAILABLE,
            payload_not_available: PAYLOAD_NOT_AVAILABLE,
            device,
        }
    }
}
