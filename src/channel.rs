//! Guarded channels and the observation records produced for them.
//!
//! Observations are built fresh every cycle from canonicalized probe output
//! and are never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One independently probed class of hardware or peripheral signal.
///
/// Variant order is the order in which a cycle visits the channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Paired and connected Bluetooth devices.
    Bluetooth,
    /// Attached USB peripherals.
    Usb,
    /// Mains power supply.
    Ac,
    /// Battery presence.
    Battery,
    /// Optical drive tray.
    Tray,
    /// Wired network link.
    Ethernet,
}

impl Channel {
    /// Every channel, in cycle order.
    pub const ALL: [Channel; 6] = [
        Channel::Bluetooth,
        Channel::Usb,
        Channel::Ac,
        Channel::Battery,
        Channel::Tray,
        Channel::Ethernet,
    ];

    /// Whether an unreachable OS mechanism on this channel counts as
    /// "nothing of this class attached" instead of a fatal error.
    pub fn tolerates_absence(self) -> bool {
        matches!(self, Self::Bluetooth | Self::Battery)
    }

    /// Short lowercase label used in logs and reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bluetooth => "bluetooth",
            Self::Usb => "usb",
            Self::Ac => "ac",
            Self::Battery => "battery",
            Self::Tray => "tray",
            Self::Ethernet => "ethernet",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A Bluetooth device as listed by the paired-device query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
    /// Canonical upper-case `XX:XX:XX:XX:XX:XX` address.
    pub address: String,
    /// Device name as reported by the host.
    pub name: String,
}

/// A paired Bluetooth device together with its live connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothObservation {
    /// Canonical device address.
    pub address: String,
    /// Reported device name.
    pub name: String,
    /// Whether the device is currently connected.
    pub connected: bool,
}

/// Optical drive tray status as returned by `CDROM_DRIVE_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayStatus {
    /// The drive does not report a status (`CDS_NO_INFO`).
    NoInfo,
    /// Tray closed, no disc (`CDS_NO_DISC`).
    NoDisc,
    /// Tray open (`CDS_TRAY_OPEN`).
    TrayOpen,
    /// Drive not ready (`CDS_DRIVE_NOT_READY`).
    DriveNotReady,
    /// Disc loaded (`CDS_DISC_OK`).
    DiscOk,
    /// Any other code the kernel returns.
    Other(i32),
}

impl TrayStatus {
    /// Map a raw ioctl return code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::NoInfo,
            1 => Self::NoDisc,
            2 => Self::TrayOpen,
            3 => Self::DriveNotReady,
            4 => Self::DiscOk,
            other => Self::Other(other),
        }
    }

    /// Raw status code.
    pub fn code(self) -> i32 {
        match self {
            Self::NoInfo => 0,
            Self::NoDisc => 1,
            Self::TrayOpen => 2,
            Self::DriveNotReady => 3,
            Self::DiscOk => 4,
            Self::Other(code) => code,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoInfo => "no info",
            Self::NoDisc => "no disc",
            Self::TrayOpen => "tray open",
            Self::DriveNotReady => "drive not ready",
            Self::DiscOk => "disc ok",
            Self::Other(_) => "unknown",
        }
    }
}

/// What a probe saw on its channel during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Observation {
    /// A paired Bluetooth device.
    Bluetooth(BluetoothObservation),
    /// A USB identifier: the disallowed device, or the required one that
    /// went missing.
    Usb {
        /// Canonical `vvvv:pppp` identifier.
        id: String,
    },
    /// Mains power state.
    Power {
        /// Whether the supply reports itself online.
        online: bool,
    },
    /// Battery presence.
    Battery {
        /// Whether a battery is reported present.
        present: bool,
    },
    /// Optical drive tray.
    Tray {
        /// Raw status code.
        status_code: i32,
    },
    /// Wired link carrier.
    Ethernet {
        /// Whether a carrier is detected.
        carrier: bool,
    },
}

impl Observation {
    /// Channel this observation belongs to.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Bluetooth(_) => Channel::Bluetooth,
            Self::Usb { .. } => Channel::Usb,
            Self::Power { .. } => Channel::Ac,
            Self::Battery { .. } => Channel::Battery,
            Self::Tray { .. } => Channel::Tray,
            Self::Ethernet { .. } => Channel::Ethernet,
        }
    }
}
