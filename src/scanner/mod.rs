//! BLE scanner abstraction.
//!
//! Backends deliver one [`Advertisement`] per received advertising report
//! that carries manufacturer-specific data. Recognizing Jaalee frames is left
//! to [`crate::decoder`].

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

#[cfg(not(any(feature = "bluer", feature = "hci")))]
compile_error!("Enable at least one scanner backend feature: `bluer` or `hci`");

use crate::mac_address::MacAddress;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Adapter, socket or D-Bus failure
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Advertisements buffered between a backend task and the event loop.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// One received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Sender address
    pub address: MacAddress,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Payload of the first manufacturer data entry, company ID stripped
    pub manufacturer_data: Vec<u8>,
}

/// Compiled-in scanner backends, selected with `--backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ over D-Bus; needs a running bluetoothd
    #[cfg(feature = "bluer")]
    Bluer,
    /// Raw HCI socket on hci0; needs CAP_NET_RAW and CAP_NET_ADMIN
    #[cfg(feature = "hci")]
    Hci,
}

impl Default for Backend {
    /// BlueZ when available, since it shares the adapter with other clients.
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        {
            Backend::Bluer
        }
        #[cfg(not(feature = "bluer"))]
        {
            Backend::Hci
        }
    }
}

/// Start the given backend and return the advertisement stream.
///
/// The stream ends when the backend task stops.
pub async fn start_scan(backend: Backend) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    log::info!("Starting {backend:?} scanner");
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan().await,
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan().await,
    }
}
