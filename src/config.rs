//! Runtime settings shared by the CLI, the HTTP listener and the scheduler.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::locale::Locale;
use crate::models::DeviceFilter;

/// Overrides the credential directory when `--path` is not given.
pub const CREDENTIALS_DIR_ENV: &str = "NOTIFYHOME_CREDENTIALS_DIR";

/// Model attribute prefix of Google Home / Nest speakers.
pub const DEFAULT_MODEL_PREFIX: &str = "Google";

/// Which speakers a notification addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    /// Upper bound on matching devices per pass.
    pub max_devices: usize,
    /// Exact friendly name, `None` for every device.
    pub friendly_name: Option<String>,
    pub model_prefix: String,
}

impl Default for DeviceTarget {
    fn default() -> Self {
        Self {
            max_devices: 4,
            friendly_name: None,
            model_prefix: DEFAULT_MODEL_PREFIX.to_string(),
        }
    }
}

impl DeviceTarget {
    pub fn new(max_devices: usize, friendly_name: Option<String>) -> Self {
        Self {
            max_devices,
            friendly_name,
            ..Self::default()
        }
    }

    pub fn filter(&self) -> DeviceFilter {
        DeviceFilter::new(self.friendly_name.clone(), self.model_prefix.clone())
    }
}

/// Settings of the periodic calendar pass.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub tick: Duration,
    /// Upper horizon for fetched events. `None` means no bound.
    pub within: Option<Duration>,
    pub per_account: u32,
    pub locale: Locale,
    pub target: DeviceTarget,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30 * 60),
            within: Some(Duration::from_secs(2 * 60 * 60)),
            per_account: 1,
            locale: Locale::En,
            target: DeviceTarget::default(),
        }
    }
}

/// Settings of the ad-hoc HTTP trigger.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub locale: Locale,
    pub target: DeviceTarget,
    /// How long in-flight requests may drain after shutdown.
    pub grace: Duration,
    /// How long `/quiet` suppresses notifications.
    pub quiet_for: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            locale: Locale::En,
            target: DeviceTarget::default(),
            grace: Duration::from_secs(5),
            quiet_for: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Zero durations mean "no horizon".
pub fn horizon(within: Duration) -> Option<Duration> {
    (!within.is_zero()).then_some(within)
}

/// Resolve where `credentials.json` and `tokens.json` live.
///
/// Order: explicit path, then `NOTIFYHOME_CREDENTIALS_DIR`, then the platform
/// config directory, then the working directory.
pub fn credentials_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CREDENTIALS_DIR_ENV).map(PathBuf::from))
        .or_else(|| {
            directories::ProjectDirs::from("", "", "notifyhome")
                .map(|dirs| dirs.config_dir().to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("."))
}
