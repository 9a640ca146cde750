//! Detection engine: ordered cycles, first violation wins.
//!
//! A cycle visits Bluetooth, USB, AC, Battery, then Tray and Ethernet when
//! configured. Probes run one at a time; the first violation ends the cycle.
//! Once the kill trigger has fired the guard is `ShuttingDown` and never
//! probes again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::channel::{BluetoothObservation, Channel};
use crate::config::WhitelistPolicy;
use crate::kill::{KillOutcome, KillTrigger};
use crate::matcher::{self, Violation};
use crate::probes::{HostProbes, ProbeError};

/// Errors that stop the guard.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// A probe failed in a way that is not tolerated on its channel.
    #[error(transparent)]
    Probe(#[from] ProbeError),
    /// The power-off request could not be issued.
    #[error("kill trigger failed: {0}")]
    Kill(String),
    /// The guard already fired and will not run another cycle.
    #[error("guard is shutting down; no further cycles run")]
    AlreadyShutDown,
}

/// Lifecycle state of the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Cycling normally.
    Running,
    /// A violation fired the kill trigger. Terminal.
    ShuttingDown,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every checked channel matched policy.
    Clean,
    /// The first violation found, in channel order.
    Violation(Violation),
}

/// How [`Guard::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardExit {
    /// A violation fired the kill trigger.
    KillIssued(Violation),
    /// The shutdown future resolved before any violation.
    Interrupted,
}

/// The detection engine.
pub struct Guard<P> {
    policy: Arc<WhitelistPolicy>,
    probes: P,
    trigger: KillTrigger,
    state: GuardState,
}

impl<P: HostProbes> Guard<P> {
    /// Create a guard in the `Running` state.
    pub fn new(policy: Arc<WhitelistPolicy>, probes: P, trigger: KillTrigger) -> Self {
        Self {
            policy,
            probes,
            trigger,
            state: GuardState::Running,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Channels a cycle visits under this policy, in order.
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| match channel {
                Channel::Tray => self.policy.tray.is_some(),
                Channel::Ethernet => self.policy.ethernet.is_some(),
                _ => true,
            })
            .collect()
    }

    /// Run one ordered pass without firing the kill trigger.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Probe`] for any probe failure not tolerated on
    /// its channel.
    pub async fn evaluate(&self) -> Result<Verdict, GuardError> {
        for channel in self.channels() {
            match self.check_channel(channel).await {
                Ok(None) => {}
                Ok(Some(violation)) => return Ok(Verdict::Violation(violation)),
                Err(e) if e.is_tolerated() => {
                    debug!(channel = %channel, error = %e, "probe unavailable, treated as absent");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Verdict::Clean)
    }

    /// Run one cycle and fire the kill trigger on the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::AlreadyShutDown`] without probing once the
    /// guard has fired, [`GuardError::Probe`] for fatal probe failures, and
    /// [`GuardError::Kill`] if the power-off request could not be issued.
    pub async fn run_cycle(&mut self) -> Result<Verdict, GuardError> {
        if self.state == GuardState::ShuttingDown {
            return Err(GuardError::AlreadyShutDown);
        }

        let verdict = self.evaluate().await?;
        if let Verdict::Violation(violation) = &verdict {
            error!(
                channel = %violation.channel,
                reason = %violation.reason,
                "whitelist violation"
            );
            self.state = GuardState::ShuttingDown;
            match self.trigger.fire(violation) {
                Ok(KillOutcome::Issued) => info!("power-off requested"),
                Ok(KillOutcome::AlreadyIssued) => {}
                Err(e) => return Err(GuardError::Kill(format!("{e:#}"))),
            }
        } else {
            debug!("cycle clean");
        }
        Ok(verdict)
    }

    /// Cycle every `interval` until a violation fires or `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`GuardError`].
    pub async fn run<F>(&mut self, interval: Duration, shutdown: F) -> Result<GuardExit, GuardError>
    where
        F: Future<Output = ()>,
    {
        if self.state == GuardState::ShuttingDown {
            return Err(GuardError::AlreadyShutDown);
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Verdict::Violation(violation) = self.run_cycle().await? {
                        return Ok(GuardExit::KillIssued(violation));
                    }
                }
                () = &mut shutdown => {
                    info!("guard interrupted");
                    return Ok(GuardExit::Interrupted);
                }
            }
        }
    }

    async fn check_channel(&self, channel: Channel) -> Result<Option<Violation>, ProbeError> {
        let policy = &self.policy;
        match channel {
            Channel::Bluetooth => self.check_bluetooth().await,
            Channel::Usb => {
                let ids = self.probes.usb_devices().await?;
                Ok(matcher::check_usb(&ids, &policy.usb))
            }
            Channel::Ac => {
                let online = self.probes.ac_online(&policy.ac.online_file).await?;
                Ok(matcher::check_ac(online, &policy.ac))
            }
            Channel::Battery => {
                let present = self
                    .probes
                    .battery_present(&policy.battery.present_file)
                    .await?;
                Ok(matcher::check_battery(present, &policy.battery))
            }
            Channel::Tray => {
                let Some(tray) = &policy.tray else {
                    return Ok(None);
                };
                let code = self.probes.tray_status(&tray.drive).await?;
                Ok(matcher::check_tray(code, tray))
            }
            Channel::Ethernet => {
                let Some(ethernet) = &policy.ethernet else {
                    return Ok(None);
                };
                let carrier = self
                    .probes
                    .ethernet_carrier(&ethernet.carrier_file)
                    .await?;
                Ok(matcher::check_ethernet(carrier, ethernet))
            }
        }
    }

    /// Paired check first, then the per-device connection query, device by
    /// device in listing order.
    async fn check_bluetooth(&self) -> Result<Option<Violation>, ProbeError> {
        let policy = &self.policy.bluetooth;
        for device in self.probes.bluetooth_paired().await? {
            if let Some(violation) = matcher::check_bluetooth_paired(&device, policy) {
                return Ok(Some(violation));
            }

            let connected = self.probes.bluetooth_connected(&device.address).await?;
            let observation = BluetoothObservation {
                address: device.address,
                name: device.name,
                connected,
            };
            if let Some(violation) = matcher::check_bluetooth_connected(&observation, policy) {
                return Ok(Some(violation));
            }
        }
        Ok(None)
    }
}

impl<P> std::fmt::Debug for Guard<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("state", &self.state)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}
