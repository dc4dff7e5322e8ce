//! Hardware address type for Bluetooth devices.
//!
//! Addresses are compared byte-wise. The textual form is only used for
//! display, topic construction and CLI parsing.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Six address octets, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build an address from six bytes stored last-octet-first.
    ///
    /// Short Jaalee frames and HCI reports carry the address this way: the
    /// final byte of the slice is the first octet of the address.
    pub fn from_reversed(bytes: [u8; 6]) -> Self {
        let mut octets = bytes;
        octets.reverse();
        Self(octets)
    }

    /// Lowercase hex without separators, used in MQTT topics and unique ids.
    ///
    /// ```
    /// use jaalee_listener::MacAddress;
    ///
    /// let mac = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    /// assert_eq!(mac.topic_id(), "aabbccddeeff");
    /// ```
    pub fn topic_id(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Uppercase, colon separated: `AA:BB:CC:DD:EE:FF`.
impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{octet:02X}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid MAC address '{0}': expected six hex octets like AA:BB:CC:DD:EE:FF")]
    Malformed(String),
    #[error("invalid MAC address: octet {index} ('{octet}') is not two hex digits")]
    Octet { index: usize, octet: String },
}

/// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff` and the bare
/// `aabbccddeeff` form used in topics.
impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let octets: Vec<&str> = if s.contains([':', '-']) {
            s.split([':', '-']).collect()
        } else if s.len() == 12 && s.is_ascii() {
            (0..12).step_by(2).map(|i| &s[i..i + 2]).collect()
        } else {
            return Err(ParseMacError::Malformed(s.to_string()));
        };

        if octets.len() != 6 {
            return Err(ParseMacError::Malformed(s.to_string()));
        }

        let mut address = [0u8; 6];
        for (index, (slot, octet)) in address.iter_mut().zip(&octets).enumerate() {
            let valid = octet.len() == 2 && octet.bytes().all(|b| b.is_ascii_hexdigit());
            *slot = valid
                .then(|| u8::from_str_radix(octet, 16).ok())
                .flatten()
                .ok_or_else(|| ParseMacError::Octet {
                    index,
                    octet: octet.to_string(),
                })?;
        }

        Ok(MacAddress(address))
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for MacAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}
