//! `jaalee-listener` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup and
//! process exit codes. The core “business logic” lives in [`crate::app`] where it
//! can be tested deterministically with an injected scanner, clock and output streams.

pub mod alias;
pub mod app;
pub mod config;
pub mod decoder;
pub mod mac_address;
pub mod output;
pub mod reading;
pub mod registry;
pub mod scanner;
pub mod sweeper;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use alias::{Alias, AliasMap, parse_alias, resolve_name, to_map};
pub use config::{PublishFields, parse_duration};
pub use decoder::{DecodeError, decode};
pub use mac_address::MacAddress;
pub use output::mqtt::MqttFormatter;
pub use output::{Message, OutputFormatter};
pub use reading::{FrameFormat, Reading, TemperatureUnit};
pub use scanner::{Advertisement, Backend, ScanError};
pub use tracker::{Diagnostics, LifecycleEvent, LivenessTracker, TrackerConfig};
