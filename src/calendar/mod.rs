//! Calendar accounts and event aggregation.
//!
//! - `client`: Google Calendar v3 REST client for one account
//! - `credentials`: OAuth client secret and stored account tokens
//! - `aggregator`: concurrent fetch across every registered account

pub mod aggregator;
pub mod client;
pub mod credentials;

pub use aggregator::{fetch_all, AccountEvents, AccountFailure, Aggregated};
pub use client::GoogleCalendar;
pub use credentials::{CredentialStore, OAuthClient, StoredToken};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::Event;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar API returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("cannot parse event: {0}")]
    Parse(String),

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One account's upcoming events.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Name used in logs and listings.
    fn label(&self) -> &str;

    /// Fetch at most `max` events starting from now, bounded by `within`
    /// when given.
    async fn upcoming(&self, max: u32, within: Option<Duration>)
        -> Result<Vec<Event>, CalendarError>;
}
