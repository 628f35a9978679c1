//! In-memory stand-ins for the network, the speakers and the calendars.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use notifyhome::calendar::{CalendarError, CalendarSource};
use notifyhome::cast::{CastError, DeviceDirectory, MediaChannel, MediaTransport, ServiceBrowser};
use notifyhome::models::{Device, DeviceAttributes, Event, ServiceRecord};
use notifyhome::notify::Notifier;
use notifyhome::quiet::QuietWindow;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

pub const WINDOW: Duration = Duration::from_secs(15);

// ============================================================
// Discovery
// ============================================================

/// Replays fixed answers, then keeps the channel open for the whole window.
pub struct ScriptedBrowser {
    records: Vec<ServiceRecord>,
    browses: Arc<AtomicUsize>,
}

impl ServiceBrowser for ScriptedBrowser {
    fn browse(&self, window: Duration) -> mpsc::Receiver<ServiceRecord> {
        self.browses.fetch_add(1, Ordering::SeqCst);
        let records = self.records.clone();
        let (tx, rx) = mpsc::channel(records.len().max(1));
        tokio::spawn(async move {
            for record in records {
                if tx.send(record).await.is_err() {
                    return;
                }
            }
            tokio::time::sleep(window).await;
        });
        rx
    }
}

/// A Google Home advertising `name` at 10.0.0.`host`.
pub fn speaker(name: &str, host: u8) -> ServiceRecord {
    ServiceRecord {
        instance: format!("Google-Home-{}", host),
        ip: IpAddr::from([10, 0, 0, host]),
        port: 8009,
        attributes: DeviceAttributes::from_tokens([
            format!("fn={}", name),
            "md=Google Home".to_string(),
        ]),
    }
}

/// Directory over `records`, plus a counter of discovery passes.
pub fn directory(records: Vec<ServiceRecord>, window: Duration) -> (DeviceDirectory, Arc<AtomicUsize>) {
    let browses = Arc::new(AtomicUsize::new(0));
    let browser = ScriptedBrowser {
        records,
        browses: browses.clone(),
    };
    (DeviceDirectory::new(Arc::new(browser), window), browses)
}

// ============================================================
// Speakers
// ============================================================

#[derive(Debug, Clone)]
pub struct Load {
    pub device: String,
    pub text: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct TransportLog {
    opened: Vec<String>,
    loads: Vec<Load>,
    closed: usize,
}

/// Records every speaker interaction. Individual speakers can be told to
/// refuse connections, reject media, or play slowly.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<TransportLog>>,
    refuse: HashSet<String>,
    reject_media: HashSet<String>,
    load_delay: HashMap<String, Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(mut self, device: &str) -> Self {
        self.refuse.insert(device.to_string());
        self
    }

    pub fn rejecting_media(mut self, device: &str) -> Self {
        self.reject_media.insert(device.to_string());
        self
    }

    pub fn slow(mut self, device: &str, delay: Duration) -> Self {
        self.load_delay.insert(device.to_string(), delay);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.log.lock().unwrap().opened.clone()
    }

    pub fn loads(&self) -> Vec<Load> {
        self.log.lock().unwrap().loads.clone()
    }

    pub fn texts_for(&self, device: &str) -> Vec<String> {
        self.loads()
            .into_iter()
            .filter(|load| load.device == device)
            .map(|load| load.text)
            .collect()
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

#[async_trait]
impl MediaTransport for RecordingTransport {
    async fn open(&self, device: &Device) -> Result<Box<dyn MediaChannel>, CastError> {
        let label = device.label().to_string();
        self.log.lock().unwrap().opened.push(label.clone());
        if self.refuse.contains(&label) {
            return Err(CastError::Connect {
                addr: device.addr.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(Box::new(RecordingChannel {
            reject: self.reject_media.contains(&label),
            delay: self.load_delay.get(&label).copied(),
            label,
            log: self.log.clone(),
        }))
    }
}

struct RecordingChannel {
    label: String,
    log: Arc<Mutex<TransportLog>>,
    reject: bool,
    delay: Option<Duration>,
}

#[async_trait]
impl MediaChannel for RecordingChannel {
    async fn launch(&mut self) -> Result<(), CastError> {
        Ok(())
    }

    async fn load(&mut self, media: &Url, _content_type: &str) -> Result<(), CastError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject {
            return Err(CastError::Load(format!("{} is busy", self.label)));
        }
        let text = media
            .query_pairs()
            .find(|(key, _)| key == "q")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        self.log.lock().unwrap().loads.push(Load {
            device: self.label.clone(),
            text,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}

pub fn notifier(records: Vec<ServiceRecord>, transport: &RecordingTransport) -> (Notifier, Arc<AtomicUsize>) {
    let (directory, browses) = directory(records, WINDOW);
    let notifier = Notifier::new(directory, Arc::new(transport.clone()), QuietWindow::new());
    (notifier, browses)
}

// ============================================================
// Calendars
// ============================================================

/// An account returning canned events, or failing every fetch.
pub struct FakeCalendar {
    label: String,
    events: Option<Vec<Event>>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<(u32, Option<Duration>)>>,
}

impl FakeCalendar {
    pub fn with_events(label: &str, events: Vec<Event>) -> Self {
        Self {
            label: label.to_string(),
            events: Some(events),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(label: &str) -> Self {
        Self {
            events: None,
            ..Self::with_events(label, Vec::new())
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(u32, Option<Duration>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    fn label(&self) -> &str {
        &self.label
    }

    async fn upcoming(&self, max: u32, within: Option<Duration>) -> Result<Vec<Event>, CalendarError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((max, within));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.events {
            Some(events) => Ok(events.clone()),
            None => Err(CalendarError::Credentials(format!("{}: token revoked", self.label))),
        }
    }
}

pub fn at(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

pub fn event(title: &str, start: &str) -> Event {
    Event::new(title, at(start))
}
