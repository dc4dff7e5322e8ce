//! Output formatters for lifecycle events.
//!
//! A formatter turns one [`LifecycleEvent`] into zero or more [`Message`]s
//! addressed to MQTT topics. Delivering them is up to the transport; the
//! binary writes each message as a `topic payload` line.

pub mod discovery;
pub mod mqtt;

use crate::tracker::LifecycleEvent;
use std::fmt;
use thiserror::Error;

/// A message destined for a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    /// Whether the broker should keep this as the topic's last value
    pub retain: bool,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.topic, self.payload)
    }
}

/// Errors produced while rendering messages.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Trait for turning lifecycle events into publishable messages.
pub trait OutputFormatter: Send + Sync {
    /// Format an event.
    ///
    /// # Arguments
    /// * `event` - The lifecycle event to render
    /// * `name` - Display name for the device (friendly name or default label)
    fn format(&self, event: &LifecycleEvent, name: &str) -> Result<Vec<Message>, OutputError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_display() {
        let message = Message {
            topic: "jaalee/aabbccddeeff/status".to_string(),
            payload: "online".to_string(),
            retain: true,
        };
        assert_eq!(message.to_string(), "jaalee/aabbccddeeff/status online");
    }
}
