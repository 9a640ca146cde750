//! The kill trigger: an irreversible, at-most-once forced power-off.
//!
//! `/sbin/poweroff -f` is spawned with hardcoded arguments and not waited
//! on. Once the trigger has fired it stays latched for the life of the
//! process, whether or not the power-off request could be issued.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use tracing::{error, warn};

use crate::matcher::Violation;

/// Forced power-off program.
const POWEROFF_PROGRAM: &str = "/sbin/poweroff";

/// Something that can ask the host to power off immediately.
pub trait PowerOff: Send + Sync {
    /// Issue a forced, non-interactive power-off request.
    ///
    /// Returns once the request is handed to the OS; it need not wait for
    /// the shutdown to complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be issued.
    fn power_off(&self) -> anyhow::Result<()>;
}

/// Powers the host off through `/sbin/poweroff -f`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPowerOff;

impl PowerOff for SystemPowerOff {
    fn power_off(&self) -> anyhow::Result<()> {
        std::process::Command::new("/sbin/poweroff")
            .arg("-f")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {POWEROFF_PROGRAM} -f"))?;
        Ok(())
    }
}

/// Result of asking the trigger to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// This call issued the power-off request.
    Issued,
    /// An earlier call already fired; nothing was done.
    AlreadyIssued,
}

/// Fires the power-off request at most once per process lifetime.
pub struct KillTrigger {
    power: Box<dyn PowerOff>,
    fired: AtomicBool,
}

impl KillTrigger {
    /// Create a trigger around a power-off implementation.
    pub fn new(power: Box<dyn PowerOff>) -> Self {
        Self {
            power,
            fired: AtomicBool::new(false),
        }
    }

    /// Trigger backed by the real system power-off.
    pub fn system() -> Self {
        Self::new(Box::new(SystemPowerOff))
    }

    /// Whether the trigger has already fired.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Fire for `violation`.
    ///
    /// The first call latches the trigger and issues the request; every
    /// later call returns [`KillOutcome::AlreadyIssued`] without touching
    /// the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the first call could not issue the request. The
    /// trigger stays latched regardless.
    pub fn fire(&self, violation: &Violation) -> anyhow::Result<KillOutcome> {
        if self.fired.swap(true, Ordering::SeqCst) {
            warn!(
                channel = %violation.channel,
                reason = %violation.reason,
                "kill trigger already fired, ignoring"
            );
            return Ok(KillOutcome::AlreadyIssued);
        }

        error!(
            channel = %violation.channel,
            reason = %violation.reason,
            "issuing forced power-off"
        );
        self.power.power_off()?;
        Ok(KillOutcome::Issued)
    }
}

impl std::fmt::Debug for KillTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KillTrigger")
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}
