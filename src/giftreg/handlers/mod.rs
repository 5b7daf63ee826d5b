//! Route handlers and the helpers they share.

pub mod auth;
pub mod health;
pub mod pages;

use axum::{
    http::{
        header::{HeaderName, LOCATION},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};

pub const ROOT_PATH: &str = "/";
pub const HEALTH_PATH: &str = "/health";
pub const LOGIN_PATH: &str = "/login";
pub const VERIFY_PATH: &str = "/verify";
pub const LOGOUT_PATH: &str = "/logout";
pub const REGISTRY_PATH: &str = "/registry";
pub const STATIC_PREFIX: &str = "/static/";

pub const HX_REQUEST: HeaderName = HeaderName::from_static("hx-request");
pub const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");

/// True when the request was issued by htmx (`HX-Request: true`).
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Redirect to `location`.
///
/// htmx requests get `200` plus `HX-Redirect` so the client navigates itself;
/// everything else gets `303 See Other`.
pub fn redirect(htmx: bool, location: &'static str) -> Response {
    let location = HeaderValue::from_static(location);
    if htmx {
        (StatusCode::OK, [(HX_REDIRECT, location)]).into_response()
    } else {
        (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uses_see_other_for_plain_requests() {
        let response = redirect(false, LOGIN_PATH);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/login"))
        );
        assert!(response.headers().get(HX_REDIRECT).is_none());
    }

    #[test]
    fn redirect_uses_hx_redirect_for_htmx() {
        let response = redirect(true, REGISTRY_PATH);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(HX_REDIRECT),
            Some(&HeaderValue::from_static("/registry"))
        );
        assert!(response.headers().get(LOCATION).is_none());
    }

    #[test]
    fn is_htmx_requires_true() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert(HX_REQUEST, HeaderValue::from_static("false"));
        assert!(!is_htmx(&headers));
        headers.insert(HX_REQUEST, HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }
}
