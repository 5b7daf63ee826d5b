use super::handlers::{auth, health};
use utoipa::{
    openapi::{Contact, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login::login_page,
        auth::login::login,
        auth::login::verify,
        auth::session::logout,
    ),
    components(schemas(health::Health, auth::login::LoginForm, auth::login::VerifyForm)),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "auth", description = "Passwordless email-code login and sessions")
    )
)]
pub struct ApiDoc;

/// Generated document with `info` taken from the package metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let info = &mut doc.info;
    info.title = env!("CARGO_PKG_NAME").to_string();
    info.version = env!("CARGO_PKG_VERSION").to_string();
    info.description = Some(env!("CARGO_PKG_DESCRIPTION").to_string());
    info.contact = author_contact(env!("CARGO_PKG_AUTHORS"));

    let mut license = License::new(env!("CARGO_PKG_LICENSE"));
    license.identifier = Some(env!("CARGO_PKG_LICENSE").to_string());
    info.license = Some(license);
    doc
}

/// Contact from the first `Name <email>` entry of a `;` separated author list.
fn author_contact(authors: &str) -> Option<Contact> {
    let author = authors.split(';').next()?.trim();
    let (name, email) = author.split_once('<').map_or((author, ""), |(name, email)| {
        (name.trim(), email.trim_end_matches('>').trim())
    });

    let mut contact = Contact::new();
    contact.name = (!name.is_empty()).then(|| name.to_string());
    contact.email = (!email.is_empty()).then(|| email.to_string());
    (contact.name.is_some() || contact.email.is_some()).then_some(contact)
}
