//! Linux probes: `bt-device`, `lsusb`, sysfs attributes, and the CD-ROM
//! drive status ioctl.
//!
//! All external commands use hardcoded program names.

use std::fs::File;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{
    bounded, describe_exit, read_carrier, read_flag, run_command, source_error, HostProbes,
    ProbeError,
};
use crate::canonical;
use crate::channel::{Channel, PairedDevice};

/// `CDROM_DRIVE_STATUS` from `<linux/cdrom.h>`.
const CDROM_DRIVE_STATUS: u32 = 0x5326;

/// `CDSL_CURRENT` slot selector: the drive's current slot.
const CDSL_CURRENT: libc::c_int = libc::c_int::MAX;

/// Probes backed by the Linux userland and sysfs.
#[derive(Debug, Clone)]
pub struct LinuxProbes {
    timeout: Duration,
}

impl LinuxProbes {
    /// Create probes whose every query is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HostProbes for LinuxProbes {
    async fn bluetooth_paired(&self) -> Result<Vec<PairedDevice>, ProbeError> {
        let output = run_command(
            Channel::Bluetooth,
            self.timeout,
            "bt-device",
            vec!["--list".to_owned()],
        )
        .await?;

        // bt-device exits non-zero when no adapter is present.
        if !output.status.success() {
            return Err(ProbeError::Unavailable {
                channel: Channel::Bluetooth,
                details: describe_exit(&output),
            });
        }

        let devices = canonical::paired_devices(&String::from_utf8_lossy(&output.stdout));
        debug!(count = devices.len(), "bluetooth paired devices listed");
        Ok(devices)
    }

    async fn bluetooth_connected(&self, address: &str) -> Result<bool, ProbeError> {
        let output = run_command(
            Channel::Bluetooth,
            self.timeout,
            "bt-device",
            vec!["-i".to_owned(), address.to_owned()],
        )
        .await?;

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                channel: Channel::Bluetooth,
                command: format!("bt-device -i {address}"),
                details: describe_exit(&output),
            });
        }

        canonical::connected_flag(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ProbeError::Malformed {
                channel: Channel::Bluetooth,
                details: format!("no Connected row for {address}"),
            }
        })
    }

    async fn usb_devices(&self) -> Result<Vec<String>, ProbeError> {
        let output = run_command(Channel::Usb, self.timeout, "lsusb", Vec::new()).await?;

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                channel: Channel::Usb,
                command: "lsusb".to_owned(),
                details: describe_exit(&output),
            });
        }

        Ok(canonical::usb_ids(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn ac_online(&self, source: &Path) -> Result<bool, ProbeError> {
        let source = source.to_path_buf();
        bounded(Channel::Ac, self.timeout, move || {
            read_flag(Channel::Ac, &source)
        })
        .await
    }

    async fn battery_present(&self, source: &Path) -> Result<bool, ProbeError> {
        let source = source.to_path_buf();
        bounded(Channel::Battery, self.timeout, move || {
            read_flag(Channel::Battery, &source)
        })
        .await
    }

    async fn tray_status(&self, drive: &Path) -> Result<i32, ProbeError> {
        let drive = drive.to_path_buf();
        bounded(Channel::Tray, self.timeout, move || read_tray_status(&drive)).await
    }

    async fn ethernet_carrier(&self, source: &Path) -> Result<bool, ProbeError> {
        let source = source.to_path_buf();
        bounded(Channel::Ethernet, self.timeout, move || {
            read_carrier(&source)
        })
        .await
    }
}

/// Open the drive non-exclusively and ask it for its tray status.
///
/// The handle is owned by a [`File`] and closed when it drops, on every
/// return path.
///
/// # Errors
///
/// Returns [`ProbeError::Unavailable`] when the device node is missing and
/// [`ProbeError::Resource`] when it cannot be opened or refuses the ioctl.
pub fn read_tray_status(drive: &Path) -> Result<i32, ProbeError> {
    let handle = std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(drive)
        .map_err(|e| source_error(Channel::Tray, drive, &e))?;

    drive_status(&handle).map_err(|e| ProbeError::Resource {
        channel: Channel::Tray,
        details: format!("CDROM_DRIVE_STATUS on {} failed: {e}", drive.display()),
    })
}

#[allow(unsafe_code)]
fn drive_status(handle: &File) -> std::io::Result<i32> {
    // SAFETY: the descriptor is borrowed from a live File and this request
    // takes its slot argument by value, so no memory is shared with the kernel.
    #[allow(clippy::cast_lossless, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let code = unsafe { libc::ioctl(handle.as_raw_fd(), CDROM_DRIVE_STATUS as _, CDSL_CURRENT) };
    if code < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(code)
}
