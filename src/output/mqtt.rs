//! MQTT topic and payload formatter.
//!
//! Topic layout, with `{mac}` the lowercase address without separators:
//!
//! - `{device_prefix}/{mac}/status`: retained `online` / `offline`
//! - `{device_prefix}/{mac}/state`: JSON state payload
//! - `{discovery_prefix}/{component}/{device_prefix}_{mac}_{key}/config`:
//!   retained discovery descriptors, published once per announcement

use crate::config::PublishFields;
use crate::mac_address::MacAddress;
use crate::output::discovery::{Descriptor, DeviceInfo, PAYLOAD_OFF, PAYLOAD_ON, SensorKind};
use crate::output::{Message, OutputError, OutputFormatter};
use crate::reading::{Reading, TemperatureUnit};
use crate::tracker::{Diagnostics, LifecycleEvent};
use serde::Serialize;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::macros::format_description;

pub const DEFAULT_DEVICE_PREFIX: &str = "jaalee";
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Format a wall-clock time for the `last_seen` field.
///
/// ISO-8601 UTC with millisecond precision, e.g. `2001-09-09T01:46:40.000Z`.
pub fn format_timestamp(time: SystemTime) -> Result<String, time::error::Format> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    OffsetDateTime::from(time).format(format)
}

/// JSON body of a state message. Optional fields are omitted when disabled.
#[derive(Debug, Serialize, PartialEq)]
struct StatePayload {
    temperature: f64,
    humidity: f64,
    battery: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    rssi: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link_quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_low: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_age: Option<u64>,
}

/// Formats lifecycle events as MQTT messages with Home Assistant discovery.
#[derive(Debug, Clone)]
pub struct MqttFormatter {
    device_prefix: String,
    discovery_prefix: String,
    unit: TemperatureUnit,
    fields: PublishFields,
}

impl MqttFormatter {
    pub fn new(
        device_prefix: String,
        discovery_prefix: String,
        unit: TemperatureUnit,
        fields: PublishFields,
    ) -> Self {
        Self {
            device_prefix,
            discovery_prefix,
            unit,
            fields,
        }
    }

    fn device_id(&self, mac: &MacAddress) -> String {
        format!("{}_{}", self.device_prefix, mac.topic_id())
    }

    pub fn status_topic(&self, mac: &MacAddress) -> String {
        format!("{}/{}/status", self.device_prefix, mac.topic_id())
    }

    pub fn state_topic(&self, mac: &MacAddress) -> String {
        format!("{}/{}/state", self.device_prefix, mac.topic_id())
    }

    fn discovery(&self, mac: &MacAddress, name: &str) -> Result<Vec<Message>, OutputError> {
        let device_id = self.device_id(mac);
        let state_topic = self.state_topic(mac);
        let availability_topic = self.status_topic(mac);
        let device = DeviceInfo::new(&device_id, name);

        SensorKind::announced(&self.fields)
            .into_iter()
            .map(|kind| {
                let descriptor = Descriptor::new(
                    kind,
                    self.unit,
                    &device_id,
                    &state_topic,
                    &availability_topic,
                    &device,
                );
                Ok(Message {
                    topic: format!(
                        "{}/{}/{}_{}/config",
                        self.discovery_prefix,
                        kind.component(),
                        device_id,
                        kind.key()
                    ),
                    payload: serde_json::to_string(&descriptor)?,
                    retain: true,
                })
            })
            .collect()
    }

    fn status(&self, mac: &MacAddress, status: &str) -> Message {
        Message {
            topic: self.status_topic(mac),
            payload: status.to_string(),
            retain: true,
        }
    }

    fn state(
        &self,
        mac: &MacAddress,
        reading: &Reading,
        rssi: i16,
        diagnostics: &Diagnostics,
    ) -> Result<Message, OutputError> {
        let fields = &self.fields;
        let last_seen = if fields.last_seen {
            Some(format_timestamp(diagnostics.last_seen)?)
        } else {
            None
        };

        let payload = StatePayload {
            temperature: self.unit.convert(reading.temperature()),
            humidity: reading.humidity(),
            battery: reading.battery(),
            rssi: fields.rssi.then_some(rssi),
            last_seen,
            link_quality: fields.link_quality.then_some(diagnostics.link_quality),
            battery_low: fields.battery_low.then_some(if diagnostics.battery_low {
                PAYLOAD_ON
            } else {
                PAYLOAD_OFF
            }),
            data_age: fields.data_age.then_some(diagnostics.data_age),
        };

        Ok(Message {
            topic: self.state_topic(mac),
            payload: serde_json::to_string(&payload)?,
            retain: false,
        })
    }
}

impl Default for MqttFormatter {
    fn default() -> Self {
        Self::new(
            DEFAULT_DEVICE_PREFIX.to_string(),
            DEFAULT_DISCOVERY_PREFIX.to_string(),
            TemperatureUnit::default(),
            PublishFields::default(),
        )
    }
}

impl OutputFormatter for MqttFormatter {
    fn format(&self, event: &LifecycleEvent, name: &str) -> Result<Vec<Message>, OutputError> {
        match event {
            LifecycleEvent::FirstSeen(mac) => self.discovery(mac, name),
            LifecycleEvent::Online(mac) | LifecycleEvent::Offline(mac) => {
                let status = event.status().unwrap_or_default();
                Ok(vec![self.status(mac, status)])
            }
            LifecycleEvent::Data {
                address,
                reading,
                rssi,
                diagnostics,
            } => Ok(vec![self.state(address, reading, *rssi, diagnostics)?]),
        }
    }
}
