use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use notifyhome::calendar::{
    CalendarError, CalendarSource, CredentialStore, GoogleCalendar, OAuthClient, StoredToken,
};
use serde_json::json;

#[derive(Clone, Default)]
struct Mock {
    seen: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>,
    status: Arc<Mutex<Option<StatusCode>>>,
}

impl Mock {
    fn requests(&self) -> Vec<(Option<String>, HashMap<String, String>)> {
        self.seen.lock().unwrap().clone()
    }
}

async fn events(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    mock.seen.lock().unwrap().push((auth, query));

    if let Some(status) = *mock.status.lock().unwrap() {
        return (status, "denied").into_response();
    }
    Json(json!({
        "items": [
            {
                "summary": "Standup",
                "start": {"dateTime": "2024-01-02T09:00:00+09:00"},
                "end": {"dateTime": "2024-01-02T09:15:00+09:00"}
            },
            {"summary": "Holiday", "start": {"date": "2024-01-03"}}
        ]
    }))
    .into_response()
}

async fn token() -> Json<serde_json::Value> {
    Json(json!({
        "access_token": "fresh",
        "token_type": "Bearer",
        "expires_in": 3600
    }))
}

async fn start_mock(mock: Mock) -> String {
    let app = Router::new()
        .route("/calendars/primary/events", get(events))
        .route("/token", post(token))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{}", addr)
}

fn oauth(base: &str) -> Arc<OAuthClient> {
    Arc::new(OAuthClient {
        client_id: "client".into(),
        client_secret: "secret".into(),
        auth_uri: format!("{}/auth", base),
        token_uri: format!("{}/token", base),
        redirect_uris: vec![],
    })
}

fn calendar(base: &str, token: StoredToken) -> GoogleCalendar {
    GoogleCalendar::new("work", reqwest::Client::new(), oauth(base), token).with_api_base(base)
}

fn valid_token() -> StoredToken {
    StoredToken {
        access_token: "abc".into(),
        token_type: "Bearer".into(),
        refresh_token: Some("refresh".into()),
        expiry: None,
    }
}

mod google_calendar {
    use super::*;

    #[tokio::test]
    async fn queries_primary_calendar_in_start_order() {
        let mock = Mock::default();
        let base = start_mock(mock.clone()).await;

        let events = calendar(&base, valid_token())
            .upcoming(10, Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Standup");
        assert_eq!(events[0].start.to_rfc3339(), "2024-01-02T09:00:00+09:00");
        assert_eq!(events[1].title, "Holiday");

        let (auth, query) = &mock.requests()[0];
        assert_eq!(auth.as_deref(), Some("Bearer abc"));
        assert_eq!(query["maxResults"], "10");
        assert_eq!(query["singleEvents"], "true");
        assert_eq!(query["orderBy"], "startTime");
        assert_eq!(query["showDeleted"], "false");
        assert!(query.contains_key("timeMin"));
        assert!(query.contains_key("timeMax"));
    }

    #[tokio::test]
    async fn omits_upper_bound_without_horizon() {
        let mock = Mock::default();
        let base = start_mock(mock.clone()).await;

        calendar(&base, valid_token()).upcoming(1, None).await.unwrap();

        let (_, query) = &mock.requests()[0];
        assert!(!query.contains_key("timeMax"));
    }

    #[tokio::test]
    async fn rejects_horizon_beyond_the_calendar_range() {
        let mock = Mock::default();
        let base = start_mock(mock.clone()).await;
        let within = humantime::parse_duration("1000000years").unwrap();

        let err = calendar(&base, valid_token())
            .upcoming(1, Some(within))
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::Parse(_)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn surfaces_api_errors_with_status() {
        let mock = Mock::default();
        *mock.status.lock().unwrap() = Some(StatusCode::UNAUTHORIZED);
        let base = start_mock(mock.clone()).await;

        let err = calendar(&base, valid_token())
            .upcoming(1, None)
            .await
            .unwrap_err();

        match err {
            CalendarError::Api { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn refreshes_expired_access_token() {
        let mock = Mock::default();
        let base = start_mock(mock.clone()).await;
        let expired = StoredToken {
            expiry: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
            ..valid_token()
        };

        calendar(&base, expired).upcoming(1, None).await.unwrap();

        let (auth, _) = &mock.requests()[0];
        assert_eq!(auth.as_deref(), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_fails() {
        let mock = Mock::default();
        let base = start_mock(mock.clone()).await;
        let expired = StoredToken {
            access_token: String::new(),
            refresh_token: None,
            ..valid_token()
        };

        let err = calendar(&base, expired).upcoming(1, None).await.unwrap_err();

        assert!(matches!(err, CalendarError::Credentials(_)));
        assert!(mock.requests().is_empty());
    }
}

mod credential_store {
    use super::*;

    const CLIENT_SECRET: &str = r#"{"installed":{"client_id":"id","client_secret":"s","redirect_uris":["urn:ietf:wg:oauth:2.0:oob"]}}"#;

    #[test]
    fn missing_token_file_means_no_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(store.load_tokens().unwrap().is_empty());
    }

    #[test]
    fn missing_client_secret_is_a_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(matches!(
            store.load_client(),
            Err(CalendarError::Credentials(_))
        ));
    }

    #[test]
    fn appended_tokens_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        assert_eq!(store.append_token(valid_token()).unwrap(), 1);
        let second = StoredToken {
            access_token: "def".into(),
            ..valid_token()
        };
        assert_eq!(store.append_token(second).unwrap(), 2);

        let reopened = CredentialStore::new(dir.path());
        let tokens = reopened.load_tokens().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].access_token, "def");
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.append_token(valid_token()).unwrap();

        let mode = std::fs::metadata(dir.path().join("tokens.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn builds_one_account_per_token() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("credentials.json"), CLIENT_SECRET).unwrap();
        let store = CredentialStore::new(dir.path());
        store.append_token(valid_token()).unwrap();
        store.append_token(valid_token()).unwrap();

        let accounts = store.accounts(reqwest::Client::new()).unwrap();

        let labels: Vec<_> = accounts.iter().map(|a| a.label().to_string()).collect();
        assert_eq!(labels, vec!["account 1", "account 2"]);
        assert_eq!(store.load_client().unwrap().client_id, "id");
    }
}
