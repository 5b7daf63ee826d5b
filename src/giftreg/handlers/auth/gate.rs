//! Auth gate middleware.
//!
//! Every request except the public allowlist needs a live session. The gate
//! resolves the session cookie, slides the session expiration forward, and
//! attaches [`CurrentIdentity`] to the request for downstream handlers.
//!
//! Store errors and timeouts are logged and treated as "not signed in": the
//! visitor lands on the login page instead of the whole site failing.

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::session::{
    clear_session_cookie, extract_session_token, session_cookie, sets_session_cookie,
};
use super::state::AuthState;
use super::utils::user_agent;
use crate::giftreg::handlers::{
    is_htmx, redirect, HEALTH_PATH, LOGIN_PATH, REGISTRY_PATH, ROOT_PATH, STATIC_PREFIX,
    VERIFY_PATH,
};

const PUBLIC_PATHS: [&str; 4] = [ROOT_PATH, HEALTH_PATH, LOGIN_PATH, VERIFY_PATH];
const PUBLIC_PREFIXES: [&str; 1] = [STATIC_PREFIX];

/// Identity of the signed-in visitor, set by [`auth_gate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentIdentity(pub i64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated {
        identity_id: i64,
        token: String,
        expiration: DateTime<Utc>,
    },
    /// No cookie, or the store could not answer.
    Anonymous,
    /// A cookie was presented but maps to no valid session.
    Rejected,
}

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn is_login_path(path: &str) -> bool {
    path == LOGIN_PATH || path == VERIFY_PATH
}

/// Resolve the session cookie in `headers`, extending the session when valid.
pub async fn check_session(state: &AuthState, headers: &HeaderMap) -> GateOutcome {
    let Some(token) = extract_session_token(headers) else {
        return GateOutcome::Anonymous;
    };
    let user_agent = user_agent(headers);

    match tokio::time::timeout(
        state.config().request_timeout(),
        resolve_session(state, token, &user_agent, Utc::now()),
    )
    .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            error!("Failed to check session: {err:#}");
            GateOutcome::Anonymous
        }
        Err(_) => {
            warn!("Session check timed out");
            GateOutcome::Anonymous
        }
    }
}

async fn resolve_session(
    state: &AuthState,
    token: String,
    user_agent: &str,
    now: DateTime<Utc>,
) -> Result<GateOutcome> {
    let store = state.store();
    let Some(session) = store.find_session(&token).await? else {
        debug!("session not found");
        return Ok(GateOutcome::Rejected);
    };

    if session.expiration <= now {
        debug!(identity_id = session.identity_id, "session expired");
        if let Err(err) = store.delete_session(&token).await {
            error!("Failed to delete expired session: {err:#}");
        }
        return Ok(GateOutcome::Rejected);
    }

    if session.user_agent != user_agent {
        warn!(
            identity_id = session.identity_id,
            "session user agent mismatch, revoking session"
        );
        if let Err(err) = store.delete_session(&token).await {
            error!("Failed to delete mismatched session: {err:#}");
        }
        return Ok(GateOutcome::Rejected);
    }

    let Some(expiration) = store
        .extend_session(&token, now + state.config().session_ttl())
        .await?
    else {
        return Ok(GateOutcome::Rejected);
    };

    Ok(GateOutcome::Authenticated {
        identity_id: session.identity_id,
        token,
        expiration,
    })
}

/// Middleware applied to the whole router.
pub async fn auth_gate(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = check_session(&state, request.headers()).await;
    let path = request.uri().path().to_string();
    let htmx = is_htmx(request.headers());

    match outcome {
        GateOutcome::Authenticated {
            identity_id,
            token,
            expiration,
        } => {
            let mut response = if is_login_path(&path) {
                redirect(htmx, REGISTRY_PATH)
            } else {
                request
                    .extensions_mut()
                    .insert(CurrentIdentity(identity_id));
                next.run(request).await
            };

            if !sets_session_cookie(response.headers()) {
                match session_cookie(&token, expiration, Utc::now()) {
                    Ok(cookie) => {
                        response.headers_mut().append(SET_COOKIE, cookie);
                    }
                    Err(err) => error!("Failed to build session cookie: {err}"),
                }
            }
            response
        }
        GateOutcome::Anonymous | GateOutcome::Rejected => {
            let mut response = if is_public_path(&path) {
                next.run(request).await
            } else {
                redirect(htmx, LOGIN_PATH)
            };

            if outcome == GateOutcome::Rejected && !sets_session_cookie(response.headers()) {
                response
                    .headers_mut()
                    .append(SET_COOKIE, clear_session_cookie());
            }
            response
        }
    }
}
