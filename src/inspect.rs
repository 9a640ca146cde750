//! Diagnostic inventory of what each channel currently sees.
//!
//! Used to write a policy by hand: nothing here consults a whitelist or
//! fires the kill trigger. A section that cannot be collected is left empty
//! with a note instead of aborting the report.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::canonical;
use crate::channel::{PairedDevice, TrayStatus};
use crate::probes::{self, HostProbes};

/// Filesystem roots the inventory enumerates.
#[derive(Debug, Clone)]
pub struct SysRoots {
    /// `/sys/class/power_supply`.
    pub power_supply: PathBuf,
    /// `/sys/class/net`.
    pub net: PathBuf,
    /// `/proc/sys/dev/cdrom/info`.
    pub cdrom_info: PathBuf,
    /// Directory holding drive device nodes (`/dev`).
    pub dev: PathBuf,
}

impl Default for SysRoots {
    fn default() -> Self {
        Self {
            power_supply: PathBuf::from("/sys/class/power_supply"),
            net: PathBuf::from("/sys/class/net"),
            cdrom_info: PathBuf::from("/proc/sys/dev/cdrom/info"),
            dev: PathBuf::from("/dev"),
        }
    }
}

/// One inventory section.
#[derive(Debug, Clone, Serialize)]
pub struct Section<T> {
    /// Entities detected.
    pub items: Vec<T>,
    /// Why the section is empty, when collection failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl<T> Section<T> {
    fn found(items: Vec<T>) -> Self {
        Self { items, note: None }
    }

    fn failed(note: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// An optical drive and its tray state.
#[derive(Debug, Clone, Serialize)]
pub struct TrayEntry {
    /// Drive name, e.g. `sr0`.
    pub drive: String,
    /// Raw status code, when the drive answered.
    pub status_code: Option<i32>,
    /// Status label or the error the query raised.
    pub status: String,
}

/// A wired interface and its carrier state.
#[derive(Debug, Clone, Serialize)]
pub struct EthernetEntry {
    /// Interface name.
    pub interface: String,
    /// `carrier` attribute path, suitable for the policy.
    pub carrier_file: PathBuf,
    /// Carrier state, when readable.
    pub carrier: Option<bool>,
}

/// Everything detected on every channel.
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    /// When the inventory was taken (RFC 3339).
    pub generated_at: String,
    /// Paired Bluetooth devices.
    pub bluetooth: Section<PairedDevice>,
    /// Attached USB identifiers.
    pub usb: Section<String>,
    /// Mains power supplies.
    pub ac: Section<String>,
    /// Batteries.
    pub battery: Section<String>,
    /// Optical drives.
    pub trays: Section<TrayEntry>,
    /// Wired interfaces.
    pub ethernet: Section<EthernetEntry>,
}

/// Collect an inventory from `probes` and the filesystem under `roots`.
pub async fn collect<P: HostProbes + ?Sized>(probes: &P, roots: &SysRoots) -> Inventory {
    let bluetooth = match probes.bluetooth_paired().await {
        Ok(devices) => Section::found(devices),
        Err(e) => Section::failed(e.to_string()),
    };

    let usb = match probes.usb_devices().await {
        Ok(ids) => Section::found(ids),
        Err(e) => Section::failed(e.to_string()),
    };

    let ac = power_supplies(&roots.power_supply, "Mains");
    let battery = power_supplies(&roots.power_supply, "Battery");
    let trays = trays(probes, roots).await;
    let ethernet = ethernet_interfaces(&roots.net);

    Inventory {
        generated_at: chrono::Utc::now().to_rfc3339(),
        bluetooth,
        usb,
        ac,
        battery,
        trays,
        ethernet,
    }
}

/// Names of power supplies whose `type` attribute equals `kind`.
fn power_supplies(root: &Path, kind: &str) -> Section<String> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => return Section::failed(format!("cannot read {}: {e}", root.display())),
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            std::fs::read_to_string(entry.path().join("type"))
                .is_ok_and(|t| t.lines().next().map(str::trim) == Some(kind))
        })
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Section::found(names)
}

async fn trays<P: HostProbes + ?Sized>(probes: &P, roots: &SysRoots) -> Section<TrayEntry> {
    let info = match std::fs::read_to_string(&roots.cdrom_info) {
        Ok(info) => info,
        Err(e) => {
            return Section::failed(format!("cannot read {}: {e}", roots.cdrom_info.display()))
        }
    };

    let mut entries = Vec::new();
    for drive in canonical::cdrom_drive_names(&info) {
        let entry = match probes.tray_status(&roots.dev.join(&drive)).await {
            Ok(code) => TrayEntry {
                drive,
                status_code: Some(code),
                status: TrayStatus::from_code(code).label().to_owned(),
            },
            Err(e) => TrayEntry {
                drive,
                status_code: None,
                status: e.to_string(),
            },
        };
        entries.push(entry);
    }
    Section::found(entries)
}

/// Interfaces under `root`, skipping loopback and wireless ones.
fn ethernet_interfaces(root: &Path) -> Section<EthernetEntry> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => return Section::failed(format!("cannot read {}: {e}", root.display())),
    };

    let mut interfaces: Vec<EthernetEntry> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name() != "lo" && !entry.path().join("wireless").is_dir())
        .map(|entry| {
            let carrier_file = entry.path().join("carrier");
            let carrier = probes::read_carrier(&carrier_file).ok();
            EthernetEntry {
                interface: entry.file_name().to_string_lossy().into_owned(),
                carrier_file,
                carrier,
            }
        })
        .collect();
    interfaces.sort_by(|a, b| a.interface.cmp(&b.interface));
    Section::found(interfaces)
}

impl Inventory {
    /// Render the inventory as human-readable text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        render_section(&mut out, "Bluetooth", &self.bluetooth, |d| {
            format!("{} ({})", d.name, d.address)
        });
        render_section(&mut out, "USB", &self.usb, Clone::clone);
        render_section(&mut out, "AC", &self.ac, Clone::clone);
        render_section(&mut out, "Battery", &self.battery, Clone::clone);
        render_section(&mut out, "CD Trays", &self.trays, |t| match t.status_code {
            Some(code) => format!("{}: {} [{code}]", t.drive, t.status),
            None => format!("{}: {}", t.drive, t.status),
        });
        render_section(&mut out, "Ethernet", &self.ethernet, |e| {
            let carrier = match e.carrier {
                Some(true) => "carrier",
                Some(false) => "no carrier",
                None => "carrier unknown",
            };
            format!("{}: {carrier} ({})", e.interface, e.carrier_file.display())
        });

        out
    }
}

fn render_section<T>(out: &mut String, title: &str, section: &Section<T>, line: impl Fn(&T) -> String) {
    let _ = writeln!(out, "{title}:");
    if section.items.is_empty() {
        match &section.note {
            Some(note) => {
                let _ = writeln!(out, "  None detected ({note})");
            }
            None => {
                let _ = writeln!(out, "  None detected");
            }
        }
    }
    for item in &section.items {
        let _ = writeln!(out, "  {}", line(item));
    }
    out.push('\n');
}
