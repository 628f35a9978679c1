//! Device directory: finds cast speakers on the local network.
//!
//! Discovery is a bounded listening window. mDNS gives no guarantee that any
//! device answers, so an empty result is a normal outcome, not an error.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{Device, DeviceAttributes, DeviceFilter, ServiceRecord};

/// mDNS service type advertised by cast receivers.
pub const GOOGLECAST_SERVICE: &str = "_googlecast._tcp.local.";

/// Source of raw discovery answers.
///
/// Implementations stream records as they resolve and close the channel when
/// the listening window ends. Dropping the receiver ends browsing early.
pub trait ServiceBrowser: Send + Sync {
    fn browse(&self, window: Duration) -> mpsc::Receiver<ServiceRecord>;
}

/// Browses the local network over multicast DNS.
#[derive(Debug, Clone)]
pub struct MdnsBrowser {
    service_type: String,
}

impl Default for MdnsBrowser {
    fn default() -> Self {
        Self::new(GOOGLECAST_SERVICE)
    }
}

impl MdnsBrowser {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
        }
    }
}

impl ServiceBrowser for MdnsBrowser {
    fn browse(&self, window: Duration) -> mpsc::Receiver<ServiceRecord> {
        let (tx, rx) = mpsc::channel(16);
        let service_type = self.service_type.clone();

        tokio::task::spawn_blocking(move || {
            let daemon = match ServiceDaemon::new() {
                Ok(daemon) => daemon,
                Err(e) => {
                    warn!("mDNS daemon unavailable: {}", e);
                    return;
                }
            };
            let events = match daemon.browse(&service_type) {
                Ok(events) => events,
                Err(e) => {
                    warn!("mDNS browse for {} failed: {}", service_type, e);
                    let _ = daemon.shutdown();
                    return;
                }
            };

            let deadline = std::time::Instant::now() + window;
            loop {
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match events.recv_timeout(remaining) {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        let Some(record) = to_record(&info) else {
                            continue;
                        };
                        if tx.blocking_send(record).is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }

            let _ = daemon.stop_browse(&service_type);
            let _ = daemon.shutdown();
        });

        rx
    }
}

fn to_record(info: &ServiceInfo) -> Option<ServiceRecord> {
    let addrs: Vec<IpAddr> = info
        .get_addresses()
        .iter()
        .map(|addr| IpAddr::from(*addr))
        .collect();
    let ip = addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()?;

    let mut attributes = DeviceAttributes::new();
    for property in info.get_properties().iter() {
        attributes.insert(property.key(), property.val_str());
    }

    Some(ServiceRecord {
        instance: info.get_fullname().to_string(),
        ip,
        port: info.get_port(),
        attributes,
    })
}

/// Runs discovery passes and turns raw answers into filtered [`Device`]s.
#[derive(Clone)]
pub struct DeviceDirectory {
    browser: Arc<dyn ServiceBrowser>,
    window: Duration,
}

impl DeviceDirectory {
    pub fn new(browser: Arc<dyn ServiceBrowser>, window: Duration) -> Self {
        Self { browser, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Discover at most `max` devices passing `filter`.
    ///
    /// Completes within the listening window. Results are in arrival order,
    /// which is not stable across runs.
    pub async fn discover(&self, max: usize, filter: &DeviceFilter) -> Vec<Device> {
        let mut devices = Vec::new();
        if max == 0 {
            return devices;
        }

        let deadline = Instant::now() + self.window;
        let mut answers = self.browser.browse(self.window);
        let mut seen = HashSet::new();

        while devices.len() < max {
            let record = match tokio::time::timeout_at(deadline, answers.recv()).await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(_) => {
                    debug!("Discovery window of {:?} elapsed", self.window);
                    break;
                }
            };

            if !seen.insert(record.instance.clone()) {
                continue;
            }

            let device = Device::from_record(record, filter);
            if !device.is_eligible() {
                debug!(
                    "Skipping {} (model={:?}, name={:?})",
                    device.instance,
                    device.attributes.model(),
                    device.attributes.friendly_name()
                );
                continue;
            }

            info!("Found device {} at {}", device.label(), device.addr);
            devices.push(device);
        }

        devices
    }
}
