use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// TXT key carrying the user-assigned device name.
pub const FRIENDLY_NAME_KEY: &str = "fn";
/// TXT key carrying the hardware model string.
pub const MODEL_KEY: &str = "md";

/// A single resolved answer from a network discovery pass.
///
/// This is the raw material the directory filters; it carries no judgement
/// about whether the endpoint is something we want to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Service instance name, unique per endpoint on the network.
    pub instance: String,
    pub ip: IpAddr,
    pub port: u16,
    pub attributes: DeviceAttributes,
}

/// Advertised `key=value` attributes of a discovered endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAttributes {
    entries: BTreeMap<String, String>,
}

impl DeviceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `key=value` tokens. Tokens without `=` are kept as
    /// keys with an empty value.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = tokens
            .into_iter()
            .map(|token| {
                let token = token.as_ref();
                match token.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (token.to_string(), String::new()),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.get(FRIENDLY_NAME_KEY)
    }

    pub fn model(&self) -> Option<&str> {
        self.get(MODEL_KEY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which discovered endpoints a notification pass should address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Exact friendly name to match. `None` (or empty) means every device.
    pub friendly_name: Option<String>,
    /// Required prefix of the model attribute.
    pub model_prefix: String,
}

impl DeviceFilter {
    pub fn new(friendly_name: Option<String>, model_prefix: impl Into<String>) -> Self {
        Self {
            friendly_name: friendly_name.filter(|name| !name.is_empty()),
            model_prefix: model_prefix.into(),
        }
    }

    pub fn matches_name(&self, attributes: &DeviceAttributes) -> bool {
        match self.friendly_name.as_deref() {
            None => true,
            Some(wanted) => attributes.friendly_name() == Some(wanted),
        }
    }

    pub fn matches_model(&self, attributes: &DeviceAttributes) -> bool {
        attributes
            .model()
            .is_some_and(|model| model.starts_with(&self.model_prefix))
    }
}

/// A speaker endpoint found during one discovery pass.
///
/// Devices are never cached: every pass rediscovers, and the list is dropped
/// once the pass completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub instance: String,
    pub addr: SocketAddr,
    pub attributes: DeviceAttributes,
    /// Model attribute carries the expected vendor prefix.
    pub is_target_model: bool,
    /// Friendly name satisfies the requested filter.
    pub name_matches: bool,
}

impl Device {
    pub fn from_record(record: ServiceRecord, filter: &DeviceFilter) -> Self {
        let is_target_model = filter.matches_model(&record.attributes);
        let name_matches = filter.matches_name(&record.attributes);
        Self {
            instance: record.instance,
            addr: SocketAddr::new(record.ip, record.port),
            attributes: record.attributes,
            is_target_model,
            name_matches,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.is_target_model && self.name_matches
    }

    /// Human readable label for logs.
    pub fn label(&self) -> &str {
        self.attributes.friendly_name().unwrap_or(&self.instance)
    }
}
