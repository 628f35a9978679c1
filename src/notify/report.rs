use std::net::SocketAddr;

use crate::cast::CastError;
use crate::models::Device;

/// How a fan-out pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Discovery ran and devices were addressed.
    Delivered,
    /// The quiet window was active.
    Suppressed,
    /// Discovery found nothing to notify.
    NoDevices,
    NoMessages,
    /// Shutdown fired before delivery started.
    Cancelled,
}

/// Result of delivering to one device.
#[derive(Debug)]
pub struct DeviceOutcome {
    pub label: String,
    pub addr: SocketAddr,
    /// `speak` calls issued.
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// First error seen on this device.
    pub error: Option<CastError>,
}

impl DeviceOutcome {
    pub(crate) fn new(device: &Device) -> Self {
        Self {
            label: device.label().to_string(),
            addr: device.addr,
            attempted: 0,
            delivered: 0,
            failed: 0,
            error: None,
        }
    }

    pub(crate) fn record_failure(&mut self, error: CastError) {
        self.failed += 1;
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-device outcomes of one fan-out pass, in discovery order.
#[derive(Debug)]
pub struct FanOutReport {
    pub outcome: PassOutcome,
    pub devices: Vec<DeviceOutcome>,
}

impl FanOutReport {
    pub(crate) fn skipped(outcome: PassOutcome) -> Self {
        Self {
            outcome,
            devices: Vec::new(),
        }
    }

    pub(crate) fn delivered(devices: Vec<DeviceOutcome>) -> Self {
        Self {
            outcome: PassOutcome::Delivered,
            devices,
        }
    }

    pub fn is_success(&self) -> bool {
        self.devices.iter().all(DeviceOutcome::is_success)
    }

    pub fn succeeded_devices(&self) -> usize {
        self.devices.iter().filter(|d| d.is_success()).count()
    }

    pub fn failed_devices(&self) -> usize {
        self.devices.len() - self.succeeded_devices()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeviceOutcome> {
        self.devices.iter().filter(|d| !d.is_success())
    }

    pub fn attempts(&self) -> usize {
        self.devices.iter().map(|d| d.attempted).sum()
    }

    pub fn delivered_messages(&self) -> usize {
        self.devices.iter().map(|d| d.delivered).sum()
    }

    pub fn first_error(&self) -> Option<&CastError> {
        self.devices.iter().find_map(|d| d.error.as_ref())
    }
}
