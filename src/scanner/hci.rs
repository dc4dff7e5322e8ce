//! Raw HCI socket backend.
//!
//! Talks to controller `hci0` directly, without bluetoothd. Needs
//! CAP_NET_RAW and CAP_NET_ADMIN (or root).
//!
//! Two sockets are used: one filtered down to LE meta events for reading
//! advertising reports, one unfiltered for sending the scan commands.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement, ScanError};
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_RAW, c_int, c_void};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

const BTPROTO_HCI: c_int = 1;
const SOL_HCI: c_int = 0;
const HCI_FILTER: c_int = 2;
const HCI_CHANNEL_RAW: u16 = 0;
const HCI_DEV: u16 = 0;

const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;
const EVT_LE_META_EVENT: u8 = 0x3E;
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

/// AD type of manufacturer-specific data.
const AD_MANUFACTURER_DATA: u8 = 0xFF;

/// Largest HCI event packet: type byte, 2 byte header, 255 parameter bytes.
const MAX_EVENT_LEN: usize = 258;

const fn le_opcode(ocf: u16) -> u16 {
    const OGF_LE_CTL: u16 = 0x08;
    (OGF_LE_CTL << 10) | ocf
}

const LE_SET_SCAN_PARAMETERS: u16 = le_opcode(0x000B);
const LE_SET_SCAN_ENABLE: u16 = le_opcode(0x000C);

/// Scan interval and window, in 0.625 ms slots (10 ms each, continuous scan).
const SCAN_SLOTS: u16 = 0x0010;

/// Parameters of LE Set Scan Parameters: active scan, public own address,
/// accept all advertisers.
fn scan_parameters() -> [u8; 7] {
    let slots = SCAN_SLOTS.to_le_bytes();
    [0x01, slots[0], slots[1], slots[0], slots[1], 0x00, 0x00]
}

/// Parameters of LE Set Scan Enable. Duplicates are kept so every broadcast
/// of a sensor reaches the tracker.
fn scan_enable(enable: bool) -> [u8; 2] {
    [u8::from(enable), 0x00]
}

/// Frame an HCI command: packet type, little-endian opcode, length, parameters.
fn command_packet(opcode: u16, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&opcode.to_le_bytes());
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// `struct hci_filter` as expected by `setsockopt(SOL_HCI, HCI_FILTER)`:
/// packet type mask, 64-bit event mask, opcode, padded to 16 bytes.
fn le_meta_filter() -> [u8; 16] {
    let type_mask: u32 = 1 << HCI_EVENT_PKT;
    let event_mask: u64 = 1 << EVT_LE_META_EVENT;

    let mut filter = [0u8; 16];
    filter[0..4].copy_from_slice(&type_mask.to_ne_bytes());
    filter[4..8].copy_from_slice(&(event_mask as u32).to_ne_bytes());
    filter[8..12].copy_from_slice(&((event_mask >> 32) as u32).to_ne_bytes());
    filter
}

fn os_error(action: &str) -> ScanError {
    ScanError::Bluetooth(format!("{action}: {}", io::Error::last_os_error()))
}

/// Non-blocking raw HCI socket bound to one controller.
struct HciSocket {
    fd: OwnedFd,
}

impl HciSocket {
    fn bind(dev: u16) -> Result<Self, ScanError> {
        let raw = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                SOCK_RAW | SOCK_CLOEXEC | SOCK_NONBLOCK,
                BTPROTO_HCI,
            )
        };
        if raw < 0 {
            return Err(os_error("Failed to create HCI socket"));
        }
        let socket = Self {
            fd: unsafe { OwnedFd::from_raw_fd(raw) },
        };

        // struct sockaddr_hci { family, dev, channel }
        let addr: [u16; 3] = [AF_BLUETOOTH as u16, dev, HCI_CHANNEL_RAW];
        let ret = unsafe {
            libc::bind(
                socket.fd.as_raw_fd(),
                addr.as_ptr().cast(),
                mem::size_of_val(&addr) as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(os_error(&format!("Failed to bind HCI socket to hci{dev}")));
        }

        Ok(socket)
    }

    fn only_le_meta_events(&self) -> Result<(), ScanError> {
        let filter = le_meta_filter();
        let ret = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                filter.as_ptr().cast::<c_void>(),
                filter.len() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(os_error("Failed to set HCI filter"));
        }
        Ok(())
    }

    fn command(&self, opcode: u16, params: &[u8]) -> Result<(), ScanError> {
        let packet = command_packet(opcode, params);
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                packet.as_ptr().cast::<c_void>(),
                packet.len(),
            )
        };
        if ret < 0 {
            return Err(os_error(&format!("Failed to send HCI command {opcode:#06x}")));
        }
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let ret = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<c_void>(),
                buf.len(),
            )
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Payload of the first manufacturer-specific AD structure, company ID stripped.
fn first_manufacturer_data(ad_data: &[u8]) -> Option<&[u8]> {
    let mut rest = ad_data;
    while let [len, tail @ ..] = rest {
        let len = usize::from(*len);
        if len == 0 || len > tail.len() {
            return None;
        }
        let (structure, next) = tail.split_at(len);
        if let [AD_MANUFACTURER_DATA, _, _, payload @ ..] = structure {
            return Some(payload);
        }
        rest = next;
    }
    None
}

/// Turn an HCI event packet into an [`Advertisement`].
///
/// Only LE advertising report events are considered, and only their first
/// report. Returns `None` for other events, truncated reports and reports
/// without manufacturer data.
fn parse_event(packet: &[u8]) -> Option<Advertisement> {
    let [
        HCI_EVENT_PKT,
        EVT_LE_META_EVENT,
        _,
        EVT_LE_ADVERTISING_REPORT,
        report @ ..,
    ] = packet
    else {
        return None;
    };

    // num_reports, event_type, address_type, address (LE), data_len, data, rssi
    let [num_reports, _, _, a0, a1, a2, a3, a4, a5, data_len, body @ ..] = report else {
        return None;
    };
    if *num_reports == 0 {
        return None;
    }

    let data_len = usize::from(*data_len);
    let ad_data = body.get(..data_len)?;
    let rssi = *body.get(data_len)? as i8;

    Some(Advertisement {
        address: MacAddress::from_reversed([*a0, *a1, *a2, *a3, *a4, *a5]),
        rssi: i16::from(rssi),
        manufacturer_data: first_manufacturer_data(ad_data)?.to_vec(),
    })
}

/// Start an active LE scan on hci0 and forward advertisements carrying
/// manufacturer data. Runs until the receiver is dropped.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let events = HciSocket::bind(HCI_DEV)?;
    events.only_le_meta_events()?;

    let control = HciSocket::bind(HCI_DEV)?;
    control.command(LE_SET_SCAN_PARAMETERS, &scan_parameters())?;
    control.command(LE_SET_SCAN_ENABLE, &scan_enable(true))?;

    let events = AsyncFd::new(events)
        .map_err(|e| ScanError::Bluetooth(format!("Failed to register HCI socket: {e}")))?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    tokio::spawn(async move {
        let mut buf = [0u8; MAX_EVENT_LEN];

        'events: loop {
            let mut guard = match events.readable().await {
                Ok(guard) => guard,
                Err(e) => {
                    log::error!("HCI socket failed: {e}");
                    break;
                }
            };

            while let Ok(read) = guard.try_io(|socket| socket.get_ref().read(&mut buf)) {
                let n = match read {
                    Ok(n) if n > 0 => n,
                    Ok(_) => break,
                    Err(e) => {
                        log::debug!("HCI read failed: {e}");
                        break;
                    }
                };

                if let Some(advertisement) = parse_event(&buf[..n])
                    && tx.send(advertisement).await.is_err()
                {
                    break 'events;
                }
            }
        }

        if let Err(e) = control.command(LE_SET_SCAN_ENABLE, &scan_enable(false)) {
            log::debug!("Failed to stop LE scan: {e}");
        }
    });

    Ok(rx)
}
