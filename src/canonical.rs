//! Canonicalizers for raw probe output.
//!
//! Each external tool or status file has one parsing contract here, so the
//! matcher only ever sees canonical records. Bluetooth addresses are
//! upper-cased, USB identifiers lower-cased.

use std::sync::LazyLock;

use regex::Regex;

use crate::channel::PairedDevice;

/// `Name (XX:XX:XX:XX:XX:XX)` rows of `bt-device --list`.
static PAIRED_ROW: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>.*?)\s*\((?P<addr>(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2})\)\s*$").ok()
});

/// `Connected: 0|1` row of `bt-device -i <addr>`.
static CONNECTED_ROW: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Connected:\s*(?P<flag>[01])\s*$").ok());

/// `ID vvvv:pppp` column of `lsusb`.
static USB_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bID\s+(?P<id>[0-9A-Fa-f]{4}:[0-9A-Fa-f]{4})\b").ok());

/// `drive name:` row of `/proc/sys/dev/cdrom/info`.
static CDROM_DRIVE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^drive name:\s*(?P<names>.*)$").ok());

/// Canonicalize a Bluetooth address to upper-case colon form.
///
/// Returns `None` unless the input is six colon-separated hex octets.
pub fn bluetooth_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let octets: Vec<&str> = trimmed.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    well_formed.then(|| trimmed.to_ascii_uppercase())
}

/// Canonicalize a USB `vendor:product` identifier to lower-case.
///
/// Returns `None` unless the input is two four-digit hex groups.
pub fn usb_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (vendor, product) = trimmed.split_once(':')?;
    let is_group = |g: &str| g.len() == 4 && g.chars().all(|c| c.is_ascii_hexdigit());
    (is_group(vendor) && is_group(product)).then(|| trimmed.to_ascii_lowercase())
}

/// Parse `bt-device --list` output into paired devices.
///
/// Each device keeps its own name next to its address; header lines such as
/// `Added devices:` are skipped.
pub fn paired_devices(raw: &str) -> Vec<PairedDevice> {
    let Some(row) = PAIRED_ROW.as_ref() else {
        return Vec::new();
    };
    raw.lines()
        .filter_map(|line| {
            let caps = row.captures(line)?;
            let address = bluetooth_address(caps.name("addr")?.as_str())?;
            let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
            Some(PairedDevice {
                address,
                name: name.to_owned(),
            })
        })
        .collect()
}

/// Parse the connection flag out of `bt-device -i <addr>` output.
///
/// Returns `None` when the output carries no `Connected:` row.
pub fn connected_flag(raw: &str) -> Option<bool> {
    let caps = CONNECTED_ROW.as_ref()?.captures(raw)?;
    Some(caps.name("flag")?.as_str() == "1")
}

/// Parse `lsusb` output into canonical identifiers, in listing order.
pub fn usb_ids(raw: &str) -> Vec<String> {
    let Some(pattern) = USB_ID.as_ref() else {
        return Vec::new();
    };
    pattern
        .captures_iter(raw)
        .filter_map(|caps| usb_id(caps.name("id")?.as_str()))
        .collect()
}

/// Parse a sysfs boolean attribute (`online`, `present`, `carrier`).
///
/// Any non-zero integer is `true`. Returns `None` for non-integer content.
pub fn sysfs_flag(raw: &str) -> Option<bool> {
    raw.lines()
        .next()
        .and_then(|line| line.trim().parse::<i64>().ok())
        .map(|value| value != 0)
}

/// Parse drive names out of `/proc/sys/dev/cdrom/info`.
pub fn cdrom_drive_names(raw: &str) -> Vec<String> {
    let Some(pattern) = CDROM_DRIVE_NAME.as_ref() else {
        return Vec::new();
    };
    pattern
        .captures(raw)
        .and_then(|caps| caps.name("names"))
        .map(|m| m.as_str().split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}
