//! Plain HTML pages outside the login forms.

use axum::{extract::Extension, response::Html};

use super::auth::CurrentIdentity;
use crate::giftreg::views;

pub async fn root() -> Html<String> {
    Html(views::landing_page())
}

/// Landing page for signed-in visitors; only reachable through the auth gate.
pub async fn registry(Extension(identity): Extension<CurrentIdentity>) -> Html<String> {
    Html(views::registry_page(identity.0))
}
