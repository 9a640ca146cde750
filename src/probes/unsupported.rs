//! Probes for platforms without a native implementation.
//!
//! Every query reports [`ProbeError::Unavailable`], so the channels stay
//! visible to the engine and the absence policy decides what happens.

use std::path::Path;

use async_trait::async_trait;

use super::{HostProbes, ProbeError};
use crate::channel::{Channel, PairedDevice};

/// Host probes that support no channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProbes;

fn unavailable(channel: Channel) -> ProbeError {
    ProbeError::Unavailable {
        channel,
        details: format!("{channel} probing is not supported on {}", std::env::consts::OS),
    }
}

#[async_trait]
impl HostProbes for UnsupportedProbes {
    async fn bluetooth_paired(&self) -> Result<Vec<PairedDevice>, ProbeError> {
        Err(unavailable(Channel::Bluetooth))
    }

    async fn bluetooth_connected(&self, _address: &str) -> Result<bool, ProbeError> {
        Err(unavailable(Channel::Bluetooth))
    }

    async fn usb_devices(&self) -> Result<Vec<String>, ProbeError> {
        Err(unavailable(Channel::Usb))
    }

    async fn ac_online(&self, _source: &Path) -> Result<bool, ProbeError> {
        Err(unavailable(Channel::Ac))
    }

    async fn battery_present(&self, _source: &Path) -> Result<bool, ProbeError> {
        Err(unavailable(Channel::Battery))
    }

    async fn tray_status(&self, _drive: &Path) -> Result<i32, ProbeError> {
        Err(unavailable(Channel::Tray))
    }

    async fn ethernet_carrier(&self, _source: &Path) -> Result<bool, ProbeError> {
        Err(unavailable(Channel::Ethernet))
    }
}
