//! Friendly names for Jaalee devices.
//!
//! Maps hardware addresses to human-readable names used in discovery
//! descriptors and log lines.

use crate::mac_address::MacAddress;
use std::collections::HashMap;

/// A type alias for address-to-name mappings.
pub type AliasMap = HashMap<MacAddress, String>;

/// A parsed alias mapping a MAC address to a human-readable name.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub address: MacAddress,
    pub name: String,
}

/// Parse an alias from a string in the format "MAC=NAME".
///
/// # Example
/// ```
/// use jaalee_listener::alias::parse_alias;
///
/// let alias = parse_alias("AA:BB:CC:DD:EE:FF=Kitchen").unwrap();
/// assert_eq!(alias.address.to_string(), "AA:BB:CC:DD:EE:FF");
/// assert_eq!(alias.name, "Kitchen");
/// ```
pub fn parse_alias(src: &str) -> Result<Alias, String> {
    let (address, name) = src
        .split_once('=')
        .ok_or_else(|| "invalid alias: expected format MAC=NAME".to_string())?;
    let address = address.parse::<MacAddress>().map_err(|e| e.to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("invalid alias: name is empty".into());
    }
    Ok(Alias {
        address,
        name: name.to_string(),
    })
}

/// Convert a slice of Alias values into an AliasMap. Later entries win.
pub fn to_map(aliases: &[Alias]) -> AliasMap {
    aliases
        .iter()
        .map(|a| (a.address, a.name.clone()))
        .collect()
}

/// Friendly name for `mac`, if one was configured.
pub fn friendly_name<'a>(mac: &MacAddress, aliases: &'a AliasMap) -> Option<&'a str> {
    aliases.get(mac).map(String::as_str)
}

/// Display name for `mac`: the alias, or the default device label.
pub fn resolve_name(mac: &MacAddress, aliases: &AliasMap) -> String {
    friendly_name(mac, aliases)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Jaalee JHT {mac}"))
}
