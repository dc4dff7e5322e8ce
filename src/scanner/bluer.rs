//! BlueZ D-Bus backend.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement, ScanError};
use crate::mac_address::MacAddress;
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::{StreamExt, pin_mut};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Pick the payload of the entry with the lowest company ID.
///
/// BlueZ reports manufacturer data as a map, so "first" is made deterministic
/// by ordering on the company ID.
fn first_manufacturer_data(data: HashMap<u16, Vec<u8>>) -> Option<Vec<u8>> {
    data.into_iter()
        .min_by_key(|(company_id, _)| *company_id)
        .map(|(_, payload)| payload)
}

/// Start an LE discovery session that reports every advertisement.
///
/// Duplicate reports are requested so repeated broadcasts from the same
/// device keep arriving. Runs until the receiver is dropped.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    adapter
        .set_discovery_filter(DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        })
        .await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);
    let (ready_tx, ready_rx) = oneshot::channel();

    // The discovery stream borrows the adapter, so both live in the task.
    tokio::spawn(async move {
        let _session = session;

        let events = match adapter.discover_devices_with_changes().await {
            Ok(events) => {
                let _ = ready_tx.send(Ok(()));
                events
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        pin_mut!(events);

        while let Some(event) = events.next().await {
            let AdapterEvent::DeviceAdded(address) = event else {
                continue;
            };
            match read_advertisement(&adapter, address).await {
                Ok(Some(advertisement)) => {
                    if tx.send(advertisement).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => log::debug!("Failed to read advertisement from {address}: {e}"),
            }
        }
    });

    ready_rx
        .await
        .map_err(|_| ScanError::Bluetooth("discovery task ended before starting".into()))??;

    Ok(rx)
}

/// Read the current manufacturer data and RSSI of a device.
///
/// Returns `Ok(None)` when the device has no manufacturer data or no RSSI.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> Result<Option<Advertisement>, ScanError> {
    let device = adapter.device(address)?;

    let Some(manufacturer_data) = device
        .manufacturer_data()
        .await?
        .and_then(first_manufacturer_data)
    else {
        return Ok(None);
    };

    let Some(rssi) = device.rssi().await? else {
        return Ok(None);
    };

    Ok(Some(Advertisement {
        address: MacAddress::from(address),
        rssi,
        manufacturer_data,
    }))
}
