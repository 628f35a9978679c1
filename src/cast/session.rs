//! Per-device delivery session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::tts::{speech_url, SPEECH_CONTENT_TYPE};
use super::CastError;
use crate::locale::Locale;
use crate::models::Device;

/// Opens protocol channels to speakers.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn open(&self, device: &Device) -> Result<Box<dyn MediaChannel>, CastError>;
}

/// A live protocol channel to one speaker.
#[async_trait]
pub trait MediaChannel: Send {
    /// Start (or join) a media-capable application on the receiver.
    async fn launch(&mut self) -> Result<(), CastError>;

    /// Ask the launched application to buffer and play `media`.
    async fn load(&mut self, media: &Url, content_type: &str) -> Result<(), CastError>;

    async fn close(&mut self);
}

/// Connect / speak / close for a single [`Device`].
///
/// A session lives for one notification pass and is never reused.
pub struct DeviceSession {
    device: Device,
    transport: Arc<dyn MediaTransport>,
    channel: Option<Box<dyn MediaChannel>>,
}

impl DeviceSession {
    pub fn new(device: Device, transport: Arc<dyn MediaTransport>) -> Self {
        Self {
            device,
            transport,
            channel: None,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Open the transport channel if it is not already open.
    pub async fn connect(&mut self) -> Result<(), CastError> {
        if self.channel.is_none() {
            debug!("Connecting to {} at {}", self.device.label(), self.device.addr);
            self.channel = Some(self.transport.open(&self.device).await?);
        }
        Ok(())
    }

    /// Speak `text` on the device.
    ///
    /// Every utterance runs on its own connection: an already open channel
    /// is used once, and the channel is released after the load whether or
    /// not it succeeded. Receivers drop idle connections that miss their
    /// heartbeat, so nothing is held open between utterances.
    pub async fn speak(&mut self, text: &str, locale: Locale) -> Result<(), CastError> {
        let media = speech_url(text, locale)?;
        self.connect().await?;

        let result = self.play(&media).await;
        self.close().await;
        result
    }

    async fn play(&mut self, media: &Url) -> Result<(), CastError> {
        let channel = self.channel.as_mut().ok_or(CastError::ChannelClosed)?;
        channel.launch().await?;
        channel.load(media, SPEECH_CONTENT_TYPE).await
    }

    pub async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
    }
}
