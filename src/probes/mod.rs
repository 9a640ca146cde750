//! Host probe abstractions and platform implementations.
//!
//! [`HostProbes`] is the only way the engine reaches the operating system.
//! Each method returns canonical records; raw tool output never leaves the
//! implementation.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::{Channel, PairedDevice};

#[cfg(target_os = "linux")]
pub mod linux;
pub mod unsupported;

/// Errors produced by probe operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The OS mechanism behind the channel cannot be reached.
    #[error("{channel} probe unavailable: {details}")]
    Unavailable {
        /// Channel being probed.
        channel: Channel,
        /// Human-readable diagnostics.
        details: String,
    },
    /// The mechanism exists but could not be used (permissions, I/O).
    #[error("{channel} probe resource error: {details}")]
    Resource {
        /// Channel being probed.
        channel: Channel,
        /// Human-readable diagnostics.
        details: String,
    },
    /// The mechanism answered with output that breaks its parsing contract.
    #[error("{channel} probe returned malformed output: {details}")]
    Malformed {
        /// Channel being probed.
        channel: Channel,
        /// Human-readable diagnostics.
        details: String,
    },
    /// An external command ran but exited unsuccessfully.
    #[error("{channel} probe command `{command}` failed: {details}")]
    CommandFailed {
        /// Channel being probed.
        channel: Channel,
        /// Command line that was run.
        command: String,
        /// Exit status and stderr.
        details: String,
    },
    /// The query did not finish within the configured bound.
    #[error("{channel} probe timed out after {seconds}s")]
    Timeout {
        /// Channel being probed.
        channel: Channel,
        /// Timeout budget in seconds.
        seconds: u64,
    },
}

impl ProbeError {
    /// Channel the error was raised on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Unavailable { channel, .. }
            | Self::Resource { channel, .. }
            | Self::Malformed { channel, .. }
            | Self::CommandFailed { channel, .. }
            | Self::Timeout { channel, .. } => *channel,
        }
    }

    /// Whether the engine may treat this error as "nothing attached".
    ///
    /// Only [`ProbeError::Unavailable`] on a channel that tolerates absence
    /// qualifies.
    pub fn is_tolerated(&self) -> bool {
        matches!(self, Self::Unavailable { channel, .. } if channel.tolerates_absence())
    }
}

/// Capability interface over the host's status sources.
///
/// Every method is a single synchronous-in-spirit query; the engine awaits
/// them one at a time in channel order.
#[async_trait]
pub trait HostProbes: Send + Sync {
    /// List paired Bluetooth devices.
    async fn bluetooth_paired(&self) -> Result<Vec<PairedDevice>, ProbeError>;
    /// Query whether a paired device (canonical address) is connected.
    async fn bluetooth_connected(&self, address: &str) -> Result<bool, ProbeError>;
    /// List attached USB `vendor:product` identifiers.
    async fn usb_devices(&self) -> Result<Vec<String>, ProbeError>;
    /// Read the mains supply `online` indicator.
    async fn ac_online(&self, source: &Path) -> Result<bool, ProbeError>;
    /// Read the battery `present` indicator.
    async fn battery_present(&self, source: &Path) -> Result<bool, ProbeError>;
    /// Query the tray status code of an optical drive.
    async fn tray_status(&self, drive: &Path) -> Result<i32, ProbeError>;
    /// Read the carrier indicator of a wired interface.
    async fn ethernet_carrier(&self, source: &Path) -> Result<bool, ProbeError>;
}

/// Probes for the current target platform.
#[cfg(target_os = "linux")]
pub fn host_probes(timeout: Duration) -> Box<dyn HostProbes> {
    Box::new(linux::LinuxProbes::new(timeout))
}

/// Probes for the current target platform.
#[cfg(not(target_os = "linux"))]
pub fn host_probes(_timeout: Duration) -> Box<dyn HostProbes> {
    Box::new(unsupported::UnsupportedProbes)
}

#[async_trait]
impl<T: HostProbes + ?Sized> HostProbes for Box<T> {
    async fn bluetooth_paired(&self) -> Result<Vec<PairedDevice>, ProbeError> {
        (**self).bluetooth_paired().await
    }

    async fn bluetooth_connected(&self, address: &str) -> Result<bool, ProbeError> {
        (**self).bluetooth_connected(address).await
    }

    async fn usb_devices(&self) -> Result<Vec<String>, ProbeError> {
        (**self).usb_devices().await
    }

    async fn ac_online(&self, source: &Path) -> Result<bool, ProbeError> {
        (**self).ac_online(source).await
    }

    async fn battery_present(&self, source: &Path) -> Result<bool, ProbeError> {
        (**self).battery_present(source).await
    }

    async fn tray_status(&self, drive: &Path) -> Result<i32, ProbeError> {
        (**self).tray_status(drive).await
    }

    async fn ethernet_carrier(&self, source: &Path) -> Result<bool, ProbeError> {
        (**self).ethernet_carrier(source).await
    }
}

/// Run a blocking query on a detached thread, bounded by `timeout`.
///
/// The thread is not owned by the runtime, so an abandoned query never
/// holds up runtime shutdown. It lingers until its syscall returns or the
/// process exits.
///
/// # Errors
///
/// Returns [`ProbeError::Timeout`] when the bound expires and
/// [`ProbeError::Resource`] when the thread cannot be spawned or dies
/// without answering.
pub async fn bounded<T, F>(channel: Channel, timeout: Duration, query: F) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name(format!("killer-{channel}-probe"))
        .spawn(move || {
            // The receiver is gone once the query has timed out.
            let _ = tx.send(query());
        })
        .map_err(|e| ProbeError::Resource {
            channel,
            details: format!("failed to spawn probe thread: {e}"),
        })?;

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ProbeError::Resource {
            channel,
            details: "probe thread ended without a result".to_owned(),
        }),
        Err(_) => Err(timed_out(channel, timeout)),
    }
}

fn timed_out(channel: Channel, timeout: Duration) -> ProbeError {
    ProbeError::Timeout {
        channel,
        seconds: timeout.as_secs(),
    }
}

/// Run an external command with hardcoded arguments and capture its output.
///
/// The child is killed when the query times out. A missing executable is
/// [`ProbeError::Unavailable`]; any other spawn failure is
/// [`ProbeError::Resource`]. Exit status is left to the caller.
///
/// # Errors
///
/// See above, plus [`ProbeError::Timeout`].
pub async fn run_command(
    channel: Channel,
    timeout: Duration,
    program: &'static str,
    args: Vec<String>,
) -> Result<Output, ProbeError> {
    let mut command = tokio::process::Command::new(program);
    command
        .args(&args)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(match e.kind() {
            std::io::ErrorKind::NotFound => ProbeError::Unavailable {
                channel,
                details: format!("`{program}` not found"),
            },
            _ => ProbeError::Resource {
                channel,
                details: format!("failed to run `{program}`: {e}"),
            },
        }),
        Err(_) => Err(timed_out(channel, timeout)),
    }
}

/// Describe a finished command's exit status and stderr.
pub fn describe_exit(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exit code {:?}", output.status.code())
    } else {
        format!("exit code {:?}: {stderr}", output.status.code())
    }
}

/// Read a single-value sysfs attribute and canonicalize it as a flag.
///
/// A missing file is [`ProbeError::Unavailable`]; the caller's channel
/// decides whether that is tolerated.
///
/// # Errors
///
/// Returns [`ProbeError::Unavailable`], [`ProbeError::Resource`], or
/// [`ProbeError::Malformed`].
pub fn read_flag(channel: Channel, source: &Path) -> Result<bool, ProbeError> {
    let contents =
        std::fs::read_to_string(source).map_err(|e| source_error(channel, source, &e))?;
    parse_flag(channel, source, &contents)
}

/// Canonicalize the contents of a sysfs flag attribute.
///
/// # Errors
///
/// Returns [`ProbeError::Malformed`] when the contents are not an integer.
pub fn parse_flag(channel: Channel, source: &Path, contents: &str) -> Result<bool, ProbeError> {
    crate::canonical::sysfs_flag(contents).ok_or_else(|| ProbeError::Malformed {
        channel,
        details: format!("{} holds '{}'", source.display(), contents.trim()),
    })
}

/// Read a `carrier` attribute.
///
/// The kernel refuses the read with `EINVAL` while the interface is
/// administratively down, which means there is no carrier.
///
/// # Errors
///
/// Returns [`ProbeError::Unavailable`], [`ProbeError::Resource`], or
/// [`ProbeError::Malformed`].
pub fn read_carrier(source: &Path) -> Result<bool, ProbeError> {
    match std::fs::read_to_string(source) {
        Ok(contents) => parse_flag(Channel::Ethernet, source, &contents),
        Err(e) if link_down(&e) => Ok(false),
        Err(e) => Err(source_error(Channel::Ethernet, source, &e)),
    }
}

#[cfg(unix)]
fn link_down(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::EINVAL)
}

#[cfg(not(unix))]
fn link_down(_e: &std::io::Error) -> bool {
    false
}

/// Classify an I/O error on a status source.
pub fn source_error(channel: Channel, source: &Path, e: &std::io::Error) -> ProbeError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ProbeError::Unavailable {
            channel,
            details: format!("{} does not exist", source.display()),
        },
        _ => ProbeError::Resource {
            channel,
            details: format!("failed to read {}: {e}", source.display()),
        },
    }
}
