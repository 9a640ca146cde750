//! Whitelist matching.
//!
//! Each function compares one canonical observation against the policy and
//! returns the violation it finds, if any. Lookups are keyed strictly by
//! device address or identifier. None of these functions touch the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::{BluetoothObservation, Channel, Observation, PairedDevice};
use crate::config::{
    AcPolicy, BatteryPolicy, BluetoothPolicy, EthernetPolicy, TrayPolicy, UsbPolicy,
};

/// Why a channel was found out of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    /// A paired device is missing from the paired whitelist.
    BluetoothPaired,
    /// A whitelisted device is connected but not allowed to be.
    BluetoothConnectedMacDisallowed,
    /// A connected device reports a name other than its whitelisted one.
    BluetoothConnectedNameMismatch,
    /// An attached USB device is not in the allowed set.
    UsbAllowedWhitelist,
    /// A required USB device is no longer attached.
    UsbConnectedWhitelist,
    /// Mains power is not in its expected state.
    Ac,
    /// Battery presence is not in its expected state.
    Battery,
    /// The optical drive tray reports a non-whitelisted status.
    CdTray,
    /// The wired link carrier is not in its expected state.
    Ethernet,
}

impl ViolationReason {
    /// Human-readable reason tag passed to the kill trigger.
    pub fn tag(self) -> &'static str {
        match self {
            Self::BluetoothPaired => "Bluetooth Paired",
            Self::BluetoothConnectedMacDisallowed => "Bluetooth Connected MAC Disallowed",
            Self::BluetoothConnectedNameMismatch => "Bluetooth Connected Name Mismatch",
            Self::UsbAllowedWhitelist => "USB Allowed Whitelist",
            Self::UsbConnectedWhitelist => "USB Connected Whitelist",
            Self::Ac => "AC",
            Self::Battery => "Battery",
            Self::CdTray => "CD Tray",
            Self::Ethernet => "Ethernet",
        }
    }

    /// Channel the reason belongs to.
    pub fn channel(self) -> Channel {
        match self {
            Self::BluetoothPaired
            | Self::BluetoothConnectedMacDisallowed
            | Self::BluetoothConnectedNameMismatch => Channel::Bluetooth,
            Self::UsbAllowedWhitelist | Self::UsbConnectedWhitelist => Channel::Usb,
            Self::Ac => Channel::Ac,
            Self::Battery => Channel::Battery,
            Self::CdTray => Channel::Tray,
            Self::Ethernet => Channel::Ethernet,
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A detected deviation from policy. Exists only to drive the kill trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Channel the deviation was seen on.
    pub channel: Channel,
    /// Reason tag.
    pub reason: ViolationReason,
    /// What was observed.
    pub observation: Observation,
}

impl Violation {
    fn new(reason: ViolationReason, observation: Observation) -> Self {
        Self {
            channel: reason.channel(),
            reason,
            observation,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.channel)
    }
}

/// Check a paired device against the paired whitelist.
///
/// Runs before the connection query, so a non-whitelisted device is
/// reported without ever being queried.
pub fn check_bluetooth_paired(device: &PairedDevice, policy: &BluetoothPolicy) -> Option<Violation> {
    if policy.paired.contains_key(&device.address) {
        return None;
    }
    Some(Violation::new(
        ViolationReason::BluetoothPaired,
        Observation::Bluetooth(BluetoothObservation {
            address: device.address.clone(),
            name: device.name.clone(),
            connected: false,
        }),
    ))
}

/// Check a whitelisted device's connection state and name.
pub fn check_bluetooth_connected(
    device: &BluetoothObservation,
    policy: &BluetoothPolicy,
) -> Option<Violation> {
    if !device.connected {
        return None;
    }

    if !policy.connected.contains(&device.address) {
        return Some(Violation::new(
            ViolationReason::BluetoothConnectedMacDisallowed,
            Observation::Bluetooth(device.clone()),
        ));
    }

    let name_matches = policy
        .paired
        .get(&device.address)
        .is_some_and(|expected| *expected == device.name);
    if name_matches {
        return None;
    }
    Some(Violation::new(
        ViolationReason::BluetoothConnectedNameMismatch,
        Observation::Bluetooth(device.clone()),
    ))
}

/// Check attached USB identifiers against the allowed and required sets.
///
/// Disallowed devices are reported before missing required ones, each in
/// listing order.
pub fn check_usb(ids: &[String], policy: &UsbPolicy) -> Option<Violation> {
    if let Some(id) = ids.iter().find(|id| !policy.allowed.contains(*id)) {
        return Some(Violation::new(
            ViolationReason::UsbAllowedWhitelist,
            Observation::Usb { id: id.clone() },
        ));
    }

    if let Some(missing) = policy.required.iter().find(|req| !ids.contains(req)) {
        return Some(Violation::new(
            ViolationReason::UsbConnectedWhitelist,
            Observation::Usb {
                id: missing.clone(),
            },
        ));
    }

    None
}

/// Check mains power state.
pub fn check_ac(online: bool, policy: &AcPolicy) -> Option<Violation> {
    (online != policy.expected_online)
        .then(|| Violation::new(ViolationReason::Ac, Observation::Power { online }))
}

/// Check battery presence.
pub fn check_battery(present: bool, policy: &BatteryPolicy) -> Option<Violation> {
    (present != policy.expected_present)
        .then(|| Violation::new(ViolationReason::Battery, Observation::Battery { present }))
}

/// Check the optical drive tray status code for exact equality.
pub fn check_tray(status_code: i32, policy: &TrayPolicy) -> Option<Violation> {
    (status_code != policy.whitelisted_status)
        .then(|| Violation::new(ViolationReason::CdTray, Observation::Tray { status_code }))
}

/// Check the wired link carrier.
pub fn check_ethernet(carrier: bool, policy: &EthernetPolicy) -> Option<Violation> {
    (carrier != policy.expected_carrier)
        .then(|| Violation::new(ViolationReason::Ethernet, Observation::Ethernet { carrier }))
}
