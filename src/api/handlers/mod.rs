use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{Local, Utc};

use super::AppState;

const INVALID_METHODS: &str = "Invalid methods\n";
const INTERNAL_ERROR: &str = "Internal error\n";

// ============================================================
// Error Handling
// ============================================================

/// Log the real cause server-side; callers only ever see a generic message.
fn internal_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("Internal error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
}

fn invalid_method(method: &Method) -> Response {
    tracing::debug!("Rejected {} request", method);
    (StatusCode::METHOD_NOT_ALLOWED, INVALID_METHODS).into_response()
}

// ============================================================
// Notify
// ============================================================

/// Speak the raw request body and echo it back on success.
///
/// A blank body is refused before discovery, whether or not any speaker
/// would have answered.
pub async fn notify(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return invalid_method(&method);
    }

    let message = match std::str::from_utf8(&body) {
        Ok(text) => text.to_string(),
        Err(e) => return internal_error(e),
    };
    if message.trim().is_empty() {
        return internal_error("empty notification body");
    }

    match state
        .notifier
        .notify(&state.target, state.locale, &[message])
        .await
    {
        Ok(_) => (StatusCode::OK, body).into_response(),
        Err(e) => internal_error(e),
    }
}

// ============================================================
// Quiet
// ============================================================

/// Suppress notifications for the configured period, starting now.
pub async fn quiet(State(state): State<AppState>, method: Method) -> Response {
    if method != Method::GET {
        return invalid_method(&method);
    }

    let until = match chrono::Duration::from_std(state.quiet_for) {
        Ok(period) => Utc::now() + period,
        Err(e) => return internal_error(e),
    };
    state.quiet.set_quiet_until(until);
    tracing::info!("Quiet until {}", until);

    let local = until.with_timezone(&Local);
    (
        StatusCode::OK,
        format!("I will be quiet until {}\n", local.format("%Y/%m/%d %H:%M")),
    )
        .into_response()
}
