//! Speaker discovery and delivery.
//!
//! - `discovery`: find candidate speakers on the local network and filter them
//! - `tts`: turn text into a playable speech URL
//! - `session`: per-device connect / speak / close on top of a media transport
//! - `castv2`: the production transport, speaking the Cast protocol

pub mod castv2;
pub mod discovery;
pub mod session;
pub mod tts;

pub use castv2::CastV2Transport;
pub use discovery::{DeviceDirectory, MdnsBrowser, ServiceBrowser, GOOGLECAST_SERVICE};
pub use session::{DeviceSession, MediaChannel, MediaTransport};
pub use tts::speech_url;

use thiserror::Error;

/// Errors raised while finding or talking to a speaker.
#[derive(Debug, Error)]
pub enum CastError {
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("cannot build speech url: {0}")]
    Speech(String),

    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("launching media app failed: {0}")]
    Launch(String),

    #[error("loading media failed: {0}")]
    Load(String),

    #[error("media channel closed")]
    ChannelClosed,
}
