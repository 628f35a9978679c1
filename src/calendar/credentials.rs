//! OAuth client secret and per-account token storage.
//!
//! Files in the credential directory:
//! - `credentials.json`: the Google client secret (`installed` or `web` app)
//! - `tokens.json`: one stored token per registered account

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::client::GoogleCalendar;
use super::{CalendarError, CalendarSource};

pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const TOKENS_FILE: &str = "tokens.json";
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<OAuthClient>,
    web: Option<OAuthClient>,
}

/// OAuth client registered with Google.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Token endpoint answer.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expiry: self.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

impl OAuthClient {
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OOB_REDIRECT)
    }

    /// Consent page the user opens to authorize read access to a calendar.
    pub fn authorize_url(&self) -> Result<Url, CalendarError> {
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("access_type", "offline"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("scope", CALENDAR_READONLY_SCOPE),
                ("state", "state-token"),
            ],
        )
        .map_err(|e| CalendarError::Credentials(format!("bad auth uri: {}", e)))
    }

    /// Trade an authorization code for a token carrying a refresh token.
    pub async fn exchange_code(&self, http: &Client, code: &str) -> Result<StoredToken, CalendarError> {
        self.token_request(
            http,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri()),
            ],
        )
        .await
    }

    /// Obtain a fresh access token. The refresh token is carried over when
    /// the endpoint does not rotate it.
    pub async fn refresh(&self, http: &Client, refresh_token: &str) -> Result<StoredToken, CalendarError> {
        let mut token = self
            .token_request(
                http,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ],
            )
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn token_request(
        &self,
        http: &Client,
        form: &[(&str, &str)],
    ) -> Result<StoredToken, CalendarError> {
        let response = http.post(&self.token_uri).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api { status, body });
        }
        let answer: TokenResponse = response.json().await?;
        Ok(answer.into_token(Utc::now()))
    }
}

/// A persisted account token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Usable without a refresh at `now`. Tokens without an expiry never
    /// go stale.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }
}

/// Reads and writes the credential directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_client(&self) -> Result<OAuthClient, CalendarError> {
        let path = self.dir.join(CREDENTIALS_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| {
            CalendarError::Credentials(format!("read {}: {}", path.display(), e))
        })?;
        let secret: ClientSecretFile = serde_json::from_str(&raw)?;
        secret.installed.or(secret.web).ok_or_else(|| {
            CalendarError::Credentials(format!(
                "{} has neither an installed nor a web client",
                path.display()
            ))
        })
    }

    /// Stored tokens. A missing file means no accounts yet.
    pub fn load_tokens(&self) -> Result<Vec<StoredToken>, CalendarError> {
        let path = self.dir.join(TOKENS_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_tokens(&self, tokens: &[StoredToken]) -> Result<(), CalendarError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(TOKENS_FILE);
        info!("Saving tokens to {}", path.display());

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        file.write_all(serde_json::to_string_pretty(tokens)?.as_bytes())?;
        Ok(())
    }

    /// Register one more account. Returns the number of stored accounts.
    pub fn append_token(&self, token: StoredToken) -> Result<usize, CalendarError> {
        let mut tokens = self.load_tokens()?;
        tokens.push(token);
        self.save_tokens(&tokens)?;
        Ok(tokens.len())
    }

    /// One calendar client per stored token.
    pub fn accounts(&self, http: Client) -> Result<Vec<Arc<dyn CalendarSource>>, CalendarError> {
        let oauth = Arc::new(self.load_client()?);
        let tokens = self.load_tokens()?;
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(index, token)| {
                Arc::new(GoogleCalendar::new(
                    format!("account {}", index + 1),
                    http.clone(),
                    oauth.clone(),
                    token,
                )) as Arc<dyn CalendarSource>
            })
            .collect())
    }
}
