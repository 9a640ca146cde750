//! Configuration loading and validation.
//!
//! Loads `killer.toml` with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal or empty config file is valid. The
//! whitelist policy is canonicalized during load and is read-only afterward.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::canonical;

/// Top-level killer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KillerConfig {
    /// Poll timing.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Whitelist policy for Linux hosts.
    #[serde(default)]
    pub linux: WhitelistPolicy,
}

/// Poll loop timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Seconds to rest between cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on any single external status query.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl GuardConfig {
    /// Interval between cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-query timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Per-channel whitelists and probe sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistPolicy {
    /// Bluetooth paired and connected whitelists.
    #[serde(default)]
    pub bluetooth: BluetoothPolicy,

    /// USB allowed and required identifiers.
    #[serde(default)]
    pub usb: UsbPolicy,

    /// Mains power expectation.
    #[serde(default)]
    pub ac: AcPolicy,

    /// Battery expectation.
    #[serde(default)]
    pub battery: BatteryPolicy,

    /// Optical drive tray; the channel is skipped when absent.
    #[serde(default)]
    pub tray: Option<TrayPolicy>,

    /// Wired link; the channel is skipped when absent.
    #[serde(default)]
    pub ethernet: Option<EthernetPolicy>,
}

/// Bluetooth whitelist.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BluetoothPolicy {
    /// Paired address to the exact device name it must report.
    #[serde(default)]
    pub paired: BTreeMap<String, String>,

    /// Addresses permitted to be actively connected.
    #[serde(default)]
    pub connected: BTreeSet<String>,
}

/// USB whitelist.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsbPolicy {
    /// Identifiers permitted to be attached.
    #[serde(default)]
    pub allowed: BTreeSet<String>,

    /// Identifiers that must stay attached.
    #[serde(default)]
    pub required: BTreeSet<String>,
}

/// Mains power source and expected state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcPolicy {
    /// sysfs `online` attribute of the mains supply.
    #[serde(default = "default_ac_online_file")]
    pub online_file: PathBuf,

    /// Expected `online` value.
    #[serde(default = "default_true")]
    pub expected_online: bool,
}

impl Default for AcPolicy {
    fn default() -> Self {
        Self {
            online_file: default_ac_online_file(),
            expected_online: true,
        }
    }
}

/// Battery source and expected state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatteryPolicy {
    /// sysfs `present` attribute of the battery.
    #[serde(default = "default_battery_present_file")]
    pub present_file: PathBuf,

    /// Expected `present` value.
    #[serde(default = "default_true")]
    pub expected_present: bool,
}

impl Default for BatteryPolicy {
    fn default() -> Self {
        Self {
            present_file: default_battery_present_file(),
            expected_present: true,
        }
    }
}

/// Optical drive to probe and its whitelisted status code.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrayPolicy {
    /// Drive device node, e.g. `/dev/sr0`.
    pub drive: PathBuf,

    /// The only acceptable `CDROM_DRIVE_STATUS` code.
    pub whitelisted_status: i32,
}

/// Wired interface carrier source and expected state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EthernetPolicy {
    /// sysfs `carrier` attribute, e.g. `/sys/class/net/eth0/carrier`.
    pub carrier_file: PathBuf,

    /// Expected carrier state.
    pub expected_carrier: bool,
}

impl KillerConfig {
    /// Validate bounds and canonicalize every whitelist entry in place.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first malformed or inconsistent entry.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=3600).contains(&self.guard.interval_secs),
            "guard.interval_secs must be in [1, 3600]"
        );
        anyhow::ensure!(
            (1..=300).contains(&self.guard.probe_timeout_secs),
            "guard.probe_timeout_secs must be in [1, 300]"
        );
        self.linux.canonicalize()
    }
}

impl WhitelistPolicy {
    /// Rewrite addresses and identifiers into canonical form and check the
    /// cross-references between sets.
    fn canonicalize(&mut self) -> anyhow::Result<()> {
        let mut paired = BTreeMap::new();
        for (address, name) in &self.bluetooth.paired {
            let canonical = canonical::bluetooth_address(address).with_context(|| {
                format!("linux.bluetooth.paired: '{address}' is not a Bluetooth address")
            })?;
            if paired.insert(canonical, name.clone()).is_some() {
                anyhow::bail!("linux.bluetooth.paired: '{address}' is listed more than once");
            }
        }

        let mut connected = BTreeSet::new();
        for address in &self.bluetooth.connected {
            let canonical = canonical::bluetooth_address(address).with_context(|| {
                format!("linux.bluetooth.connected: '{address}' is not a Bluetooth address")
            })?;
            anyhow::ensure!(
                paired.contains_key(&canonical),
                "linux.bluetooth.connected: '{address}' must also be listed in linux.bluetooth.paired"
            );
            if !connected.insert(canonical) {
                anyhow::bail!("linux.bluetooth.connected: '{address}' is listed more than once");
            }
        }

        let allowed = canonical_usb_set(&self.usb.allowed, "linux.usb.allowed")?;
        let required = canonical_usb_set(&self.usb.required, "linux.usb.required")?;
        if let Some(id) = required.difference(&allowed).next() {
            anyhow::bail!("linux.usb.required: '{id}' must also be listed in linux.usb.allowed");
        }

        if let Some(tray) = &self.tray {
            anyhow::ensure!(
                (0..=4).contains(&tray.whitelisted_status),
                "linux.tray.whitelisted_status must be a CDROM status code in [0, 4]"
            );
        }

        self.bluetooth.paired = paired;
        self.bluetooth.connected = connected;
        self.usb.allowed = allowed;
        self.usb.required = required;
        Ok(())
    }
}

fn canonical_usb_set(ids: &BTreeSet<String>, field: &str) -> anyhow::Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for id in ids {
        let canonical = canonical::usb_id(id)
            .with_context(|| format!("{field}: '{id}' is not a vendor:product identifier"))?;
        if !set.insert(canonical) {
            anyhow::bail!("{field}: '{id}' is listed more than once");
        }
    }
    Ok(set)
}

/// Load killer configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<KillerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read killer config at {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("invalid killer config at {}", path.display()))
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML for [`KillerConfig`] or
/// fails validation.
pub fn parse_config(contents: &str) -> anyhow::Result<KillerConfig> {
    let mut config: KillerConfig =
        toml::from_str(contents).context("failed to parse killer config")?;
    config.validate()?;
    Ok(config)
}

/// Resolved filesystem locations for killer's own files.
#[derive(Debug, Clone)]
pub struct KillerPaths {
    /// Config directory (`~/.config/killer/` on Linux).
    pub config_dir: PathBuf,

    /// Default config file inside `config_dir`.
    pub config_toml: PathBuf,

    /// Directory for rotated JSON logs.
    pub logs_dir: PathBuf,
}

/// Resolve killer's filesystem paths.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn killer_paths() -> anyhow::Result<KillerPaths> {
    let dirs = directories::ProjectDirs::from("", "", "killer")
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    let config_dir = dirs.config_dir().to_path_buf();
    let config_toml = config_dir.join("killer.toml");
    let logs_dir = dirs.data_local_dir().join("logs");

    Ok(KillerPaths {
        config_dir,
        config_toml,
        logs_dir,
    })
}

// Default value functions for serde.

fn default_interval_secs() -> u64 {
    2
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_ac_online_file() -> PathBuf {
    PathBuf::from("/sys/class/power_supply/AC/online")
}

fn default_battery_present_file() -> PathBuf {
    PathBuf::from("/sys/class/power_supply/BAT0/present")
}
