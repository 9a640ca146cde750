//! Test doubles for host probes and the power-off action.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use killer::channel::{Channel, PairedDevice};
use killer::kill::PowerOff;
use killer::probes::{HostProbes, ProbeError};

/// Live host state served by [`FakeProbes`].
#[derive(Debug, Clone)]
pub struct FakeState {
    /// `bt-device --list` answer.
    pub paired: Result<Vec<PairedDevice>, ProbeError>,
    /// Connection state per address; unknown addresses are disconnected.
    pub connected: HashMap<String, bool>,
    /// `lsusb` answer.
    pub usb: Result<Vec<String>, ProbeError>,
    /// AC `online` answer.
    pub ac: Result<bool, ProbeError>,
    /// Battery `present` answer.
    pub battery: Result<bool, ProbeError>,
    /// Tray status code answer.
    pub tray: Result<i32, ProbeError>,
    /// Carrier answer.
    pub ethernet: Result<bool, ProbeError>,
    /// Channels queried, in call order.
    pub calls: Vec<Channel>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            paired: Ok(Vec::new()),
            connected: HashMap::new(),
            usb: Ok(vec!["1d6b:0002".to_owned()]),
            ac: Ok(true),
            battery: Ok(true),
            tray: Ok(1),
            ethernet: Ok(true),
            calls: Vec::new(),
        }
    }
}

/// Probes answering from shared, test-controlled state.
#[derive(Debug, Clone, Default)]
pub struct FakeProbes {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProbes {
    /// Probes serving `state`.
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Mutate the live state between cycles.
    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        let mut state = self.state.lock().expect("fake state lock");
        f(&mut state);
    }

    /// Channels queried so far, in order.
    pub fn calls(&self) -> Vec<Channel> {
        self.state.lock().expect("fake state lock").calls.clone()
    }

    fn record<T: Clone>(&self, channel: Channel, pick: impl FnOnce(&FakeState) -> T) -> T {
        let mut state = self.state.lock().expect("fake state lock");
        state.calls.push(channel);
        pick(&state)
    }
}

#[async_trait]
impl HostProbes for FakeProbes {
    async fn bluetooth_paired(&self) -> Result<Vec<PairedDevice>, ProbeError> {
        self.record(Channel::Bluetooth, |s| s.paired.clone())
    }

    async fn bluetooth_connected(&self, address: &str) -> Result<bool, ProbeError> {
        let connected = self.record(Channel::Bluetooth, |s| s.connected.get(address).copied());
        Ok(connected.unwrap_or(false))
    }

    async fn usb_devices(&self) -> Result<Vec<String>, ProbeError> {
        self.record(Channel::Usb, |s| s.usb.clone())
    }

    async fn ac_online(&self, _source: &Path) -> Result<bool, ProbeError> {
        self.record(Channel::Ac, |s| s.ac.clone())
    }

    async fn battery_present(&self, _source: &Path) -> Result<bool, ProbeError> {
        self.record(Channel::Battery, |s| s.battery.clone())
    }

    async fn tray_status(&self, _drive: &Path) -> Result<i32, ProbeError> {
        self.record(Channel::Tray, |s| s.tray.clone())
    }

    async fn ethernet_carrier(&self, _source: &Path) -> Result<bool, ProbeError> {
        self.record(Channel::Ethernet, |s| s.ethernet.clone())
    }
}

/// Power-off double counting how often it was asked to act.
#[derive(Debug, Clone, Default)]
pub struct RecordingPowerOff {
    count: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingPowerOff {
    /// A double that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A double whose every request fails.
    pub fn failing() -> Self {
        Self {
            count: Arc::default(),
            fail: true,
        }
    }

    /// Number of power-off requests received.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl PowerOff for RecordingPowerOff {
    fn power_off(&self) -> anyhow::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("poweroff binary missing");
        }
        Ok(())
    }
}

/// A paired device record.
pub fn paired(address: &str, name: &str) -> PairedDevice {
    PairedDevice {
        address: address.to_owned(),
        name: name.to_owned(),
    }
}

/// An `Unavailable` error on `channel`.
pub fn unavailable(channel: Channel) -> ProbeError {
    ProbeError::Unavailable {
        channel,
        details: "not present".to_owned(),
    }
}
