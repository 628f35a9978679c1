//! Notification fan-out engine.
//!
//! One call runs a single discovery pass and delivers every message to every
//! discovered speaker concurrently. Nothing is read back until all device
//! tasks for the pass have finished.

mod report;

pub use report::{DeviceOutcome, FanOutReport, PassOutcome};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cast::{CastError, DeviceDirectory, DeviceSession, MediaTransport};
use crate::config::DeviceTarget;
use crate::locale::Locale;
use crate::models::Device;
use crate::quiet::QuietWindow;

/// Gap between consecutive utterances on one speaker.
pub const DEFAULT_PACING: Duration = Duration::from_secs(10);

/// What a device does after one of its messages fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Stop delivering to this device after its first error.
    #[default]
    FailFast,
    /// Keep attempting the device's remaining messages.
    Continue,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    /// At least one device failed. Every device's attempt completed first.
    #[error("{} of {} devices failed; first: {}", .0.failed_devices(), .0.devices.len(), first_error(.0))]
    Delivery(FanOutReport),
}

impl NotifyError {
    pub fn report(&self) -> &FanOutReport {
        match self {
            Self::Delivery(report) => report,
        }
    }

    /// Representative error: the first failing device in discovery order.
    pub fn first(&self) -> Option<&CastError> {
        self.report().first_error()
    }
}

fn first_error(report: &FanOutReport) -> String {
    report
        .first_error()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Delivers spoken messages to every speaker found on the network.
#[derive(Clone)]
pub struct Notifier {
    directory: DeviceDirectory,
    transport: Arc<dyn MediaTransport>,
    quiet: QuietWindow,
    pacing: Duration,
    policy: DeliveryPolicy,
    shutdown: CancellationToken,
}

impl Notifier {
    pub fn new(
        directory: DeviceDirectory,
        transport: Arc<dyn MediaTransport>,
        quiet: QuietWindow,
    ) -> Self {
        Self {
            directory,
            transport,
            quiet,
            pacing: DEFAULT_PACING,
            policy: DeliveryPolicy::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Once `token` fires, discovery is abandoned and no new utterance starts.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn quiet(&self) -> &QuietWindow {
        &self.quiet
    }

    /// Speak `messages` in order on every device matching `target`.
    ///
    /// Suppression, an empty message list, and an empty discovery result are
    /// all successful no-ops. If any device fails the call returns
    /// [`NotifyError::Delivery`] carrying the full report, but only after
    /// every device has finished its attempt.
    pub async fn notify(
        &self,
        target: &DeviceTarget,
        locale: Locale,
        messages: &[String],
    ) -> Result<FanOutReport, NotifyError> {
        if messages.is_empty() {
            return Ok(FanOutReport::skipped(PassOutcome::NoMessages));
        }
        if !self.quiet.is_notifiable() {
            info!(
                "Notifications suppressed until {:?}, skipping",
                self.quiet.quiet_until()
            );
            return Ok(FanOutReport::skipped(PassOutcome::Suppressed));
        }
        if self.shutdown.is_cancelled() {
            debug!("Shutdown in progress, not starting discovery");
            return Ok(FanOutReport::skipped(PassOutcome::Cancelled));
        }

        let filter = target.filter();
        let devices = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("Shutdown during discovery");
                return Ok(FanOutReport::skipped(PassOutcome::Cancelled));
            }
            devices = self.directory.discover(target.max_devices, &filter) => devices,
        };
        if self.shutdown.is_cancelled() {
            debug!("Shutdown after discovery, not delivering");
            return Ok(FanOutReport::skipped(PassOutcome::Cancelled));
        }
        if devices.is_empty() {
            info!("No device found.");
            return Ok(FanOutReport::skipped(PassOutcome::NoDevices));
        }

        info!(
            "Delivering {} message(s) to {} device(s)",
            messages.len(),
            devices.len()
        );
        let outcomes = join_all(
            devices
                .into_iter()
                .map(|device| self.deliver(device, locale, messages)),
        )
        .await;

        let report = FanOutReport::delivered(outcomes);
        for outcome in report.failures() {
            if let Some(error) = &outcome.error {
                warn!("Device {} ({}): {}", outcome.label, outcome.addr, error);
            }
        }

        if report.is_success() {
            Ok(report)
        } else {
            Err(NotifyError::Delivery(report))
        }
    }

    async fn deliver(&self, device: Device, locale: Locale, messages: &[String]) -> DeviceOutcome {
        let mut outcome = DeviceOutcome::new(&device);
        let mut session = DeviceSession::new(device, self.transport.clone());

        if let Err(e) = session.connect().await {
            outcome.record_failure(e);
            if self.policy == DeliveryPolicy::FailFast {
                return outcome;
            }
        }

        for (index, message) in messages.iter().enumerate() {
            if index > 0 && !self.pace().await {
                debug!("Shutdown during pacing, {} stops early", outcome.label);
                break;
            }

            outcome.attempted += 1;
            match session.speak(message, locale).await {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.record_failure(e);
                    if self.policy == DeliveryPolicy::FailFast {
                        break;
                    }
                }
            }
        }

        session.close().await;
        outcome
    }

    /// Wait out the inter-message gap. Returns `false` if shutdown fired.
    async fn pace(&self) -> bool {
        if self.pacing.is_zero() {
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(self.pacing) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
