//! Cast protocol transport backed by `rust_cast`.
//!
//! The protocol client is blocking and not `Send`, so each channel owns a
//! dedicated thread holding the connection. Async callers talk to it through
//! a command queue with one-shot replies.

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use async_trait::async_trait;
use rust_cast::channels::media::{Media, StreamType};
use rust_cast::channels::receiver::{Application, CastDeviceApp};
use rust_cast::CastDevice;
use tokio::sync::oneshot;
use tracing::{debug, info};
use url::Url;

use super::session::{MediaChannel, MediaTransport};
use super::CastError;
use crate::models::Device;

const DEFAULT_DESTINATION_ID: &str = "receiver-0";

/// Opens one protocol thread per device session.
#[derive(Debug, Clone)]
pub struct CastV2Transport {
    timeout: Duration,
}

impl Default for CastV2Transport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl CastV2Transport {
    /// `timeout` bounds connecting and each launch/load round trip.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MediaTransport for CastV2Transport {
    async fn open(&self, device: &Device) -> Result<Box<dyn MediaChannel>, CastError> {
        let addr = device.addr.to_string();
        let host = device.addr.ip().to_string();
        let port = device.addr.port();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (commands, inbox) = std_mpsc::channel();

        std::thread::Builder::new()
            .name(format!("cast-{}", addr))
            .spawn(move || run_connection(host, port, ready_tx, inbox))
            .map_err(|e| CastError::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        match tokio::time::timeout(self.timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                debug!("Cast connection to {} established", addr);
                Ok(Box::new(CastV2Channel {
                    commands,
                    timeout: self.timeout,
                }))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(CastError::ChannelClosed),
            Err(_) => Err(CastError::Connect {
                addr,
                reason: format!("no answer within {:?}", self.timeout),
            }),
        }
    }
}

enum Command {
    Launch(oneshot::Sender<Result<(), CastError>>),
    Load {
        content_id: String,
        content_type: String,
        reply: oneshot::Sender<Result<(), CastError>>,
    },
    Close(oneshot::Sender<()>),
}

struct CastV2Channel {
    commands: std_mpsc::Sender<Command>,
    timeout: Duration,
}

impl CastV2Channel {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CastError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| CastError::ChannelClosed)?;
        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CastError::ChannelClosed),
            Err(_) => Err(CastError::ChannelClosed),
        }
    }
}

#[async_trait]
impl MediaChannel for CastV2Channel {
    async fn launch(&mut self) -> Result<(), CastError> {
        self.request(Command::Launch).await?
    }

    async fn load(&mut self, media: &Url, content_type: &str) -> Result<(), CastError> {
        let content_id = media.to_string();
        let content_type = content_type.to_string();
        self.request(|reply| Command::Load {
            content_id,
            content_type,
            reply,
        })
        .await?
    }

    async fn close(&mut self) {
        let _ = self.request(Command::Close).await;
    }
}

fn run_connection(
    host: String,
    port: u16,
    ready: oneshot::Sender<Result<(), CastError>>,
    inbox: std_mpsc::Receiver<Command>,
) {
    let addr = format!("{}:{}", host, port);
    let connected = CastDevice::connect_without_host_verification(host, port).and_then(|device| {
        device.connection.connect(DEFAULT_DESTINATION_ID)?;
        Ok(device)
    });
    let device = match connected {
        Ok(device) => device,
        Err(e) => {
            let _ = ready.send(Err(CastError::Connect {
                addr,
                reason: e.to_string(),
            }));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut app: Option<Application> = None;
    while let Ok(command) = inbox.recv() {
        match command {
            Command::Launch(reply) => {
                let result = launch_media_app(&device).map(|launched| {
                    app = Some(launched);
                });
                let _ = reply.send(result);
            }
            Command::Load {
                content_id,
                content_type,
                reply,
            } => {
                let result = match app.as_ref() {
                    Some(launched) => load_media(&device, launched, content_id, content_type),
                    None => Err(CastError::Load("media app not launched".into())),
                };
                let _ = reply.send(result);
            }
            Command::Close(reply) => {
                let _ = device.connection.disconnect(DEFAULT_DESTINATION_ID);
                let _ = reply.send(());
                break;
            }
        }
    }
    debug!("Cast connection to {} released", addr);
}

fn launch_media_app(device: &CastDevice<'_>) -> Result<Application, CastError> {
    let launched = device
        .receiver
        .launch_app(&CastDeviceApp::DefaultMediaReceiver)
        .map_err(|e| CastError::Launch(e.to_string()))?;
    device
        .connection
        .connect(launched.transport_id.clone())
        .map_err(|e| CastError::Launch(e.to_string()))?;
    Ok(launched)
}

fn load_media(
    device: &CastDevice<'_>,
    app: &Application,
    content_id: String,
    content_type: String,
) -> Result<(), CastError> {
    info!("Load media: content_id={}", content_id);
    let media = Media {
        content_id,
        content_type,
        stream_type: StreamType::Buffered,
        duration: None,
        metadata: None,
    };
    device
        .media
        .load(app.transport_id.clone(), app.session_id.clone(), &media)
        .map(|_| ())
        .map_err(|e| CastError::Load(e.to_string()))
}
