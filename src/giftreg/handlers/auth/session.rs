//! Session cookie handling and the logout endpoint.

use anyhow::Result;
use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, instrument};

use super::state::{AuthConfig, AuthState};
use super::utils::generate_session_token;
use crate::giftreg::handlers::{is_htmx, redirect, LOGIN_PATH};
use crate::store::SessionRecord;

pub const SESSION_COOKIE_NAME: &str = "giftreg_session";

/// Build a new session for `identity_id` expiring one session TTL after `now`.
pub(crate) fn new_session(
    identity_id: i64,
    user_agent: &str,
    now: DateTime<Utc>,
    config: &AuthConfig,
) -> Result<SessionRecord> {
    Ok(SessionRecord {
        session_token: generate_session_token()?,
        identity_id,
        expiration: now + config.session_ttl(),
        user_agent: user_agent.to_string(),
    })
}

/// Secure `HttpOnly` cookie whose `Max-Age` matches the remaining lifetime.
pub(crate) fn session_cookie(
    token: &str,
    expiration: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = (expiration - now).num_seconds().max(0);
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={max_age}"
    ))
}

pub(crate) fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "giftreg_session=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0",
    )
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// True when the response already sets the session cookie.
pub(crate) fn sets_session_cookie(headers: &HeaderMap) -> bool {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Session cleared, redirect to the login page"),
        (status = 200, description = "Session cleared, HX-Redirect to the login page")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = auth_state.store().delete_session(&token).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response = redirect(is_htmx(&headers), LOGIN_PATH);
    response
        .headers_mut()
        .append(SET_COOKIE, clear_session_cookie());
    response
}
