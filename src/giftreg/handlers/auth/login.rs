//! Login form endpoints.
//!
//! Both POST handlers always answer `200` with an HTML fragment that replaces
//! the submitted form. Unknown emails, missing records, and exhausted or
//! expired codes all render the same way so the responses never reveal which
//! emails have accounts.

use anyhow::{anyhow, Result};
use axum::{
    extract::{Extension, Form},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use super::issuer::{issue_code, IssueOutcome};
use super::session::session_cookie;
use super::state::AuthState;
use super::utils::{normalize_email, user_agent};
use super::verifier::{verify_code, VerifyOutcome};
use crate::giftreg::handlers::{HX_REDIRECT, REGISTRY_PATH};
use crate::giftreg::views;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VerifyForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

async fn within<T>(limit: Duration, operation: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| anyhow!("operation timed out after {}s", limit.as_secs()))?
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login page", body = String, content_type = "text/html")
    ),
    tag = "auth"
)]
pub async fn login_page() -> Html<String> {
    Html(views::login_page())
}

/// Request a one-time code for the submitted email.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Code entry fragment, or the email form with a field error", body = String, content_type = "text/html")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Form<LoginForm>>,
) -> Html<String> {
    let form = payload.map(|Form(form)| form).unwrap_or_default();

    match issue_code(&auth_state, &form.email).await {
        Ok(IssueOutcome::Issued | IssueOutcome::Silent) => {
            Html(views::verify_form(&normalize_email(&form.email), None))
        }
        Ok(IssueOutcome::ValidationFailed(message)) => {
            Html(views::login_form(&form.email, Some(message)))
        }
        Err(err) => {
            error!("Failed to issue verification code: {err:#}");
            Html(views::login_form(&form.email, Some(views::TRY_AGAIN)))
        }
    }
}

/// Check a submitted code and sign the visitor in.
#[utoipa::path(
    post,
    path = "/verify",
    request_body(content = VerifyForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signed in (HX-Redirect to /registry with the session cookie), or a form fragment with an error", body = String, content_type = "text/html"),
        (status = 500, description = "Session cookie could not be built", body = String)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Form<VerifyForm>>,
) -> Response {
    let form = payload.map(|Form(form)| form).unwrap_or_default();
    let email = normalize_email(&form.email);
    let user_agent = user_agent(&headers);

    let outcome = within(
        auth_state.config().request_timeout(),
        verify_code(&auth_state, &email, &form.code, &user_agent),
    )
    .await;

    match outcome {
        Ok(VerifyOutcome::Verified(grant)) => {
            let cookie = match session_cookie(&grant.token, grant.expiration, chrono::Utc::now()) {
                Ok(cookie) => cookie,
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return (StatusCode::INTERNAL_SERVER_ERROR, views::RENDER_FAILED)
                        .into_response();
                }
            };
            (
                StatusCode::OK,
                [
                    (SET_COOKIE, cookie),
                    (HX_REDIRECT, HeaderValue::from_static(REGISTRY_PATH)),
                ],
                Html(views::signed_in_fragment()),
            )
                .into_response()
        }
        Ok(VerifyOutcome::Retry) => {
            Html(views::verify_form(&email, Some(views::WRONG_CODE))).into_response()
        }
        Ok(VerifyOutcome::ValidationFailed(message)) => {
            Html(views::verify_form(&email, Some(message))).into_response()
        }
        Ok(VerifyOutcome::Failed(reason)) => {
            info!(?reason, "login failed");
            Html(views::login_form(&email, Some(views::LOGIN_FAILED))).into_response()
        }
        Err(err) => {
            error!("Failed to verify code: {err:#}");
            Html(views::verify_form(&email, Some(views::TRY_AGAIN))).into_response()
        }
    }
}
