use crate::store::{AuthStore, PgStore};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod email;
pub mod handlers;
mod openapi;
pub mod sweeper;
pub mod views;

pub use handlers::auth::{AuthConfig, AuthState};
pub use openapi::{openapi, ApiDoc};

use handlers::{
    auth, health, pages, HEALTH_PATH, LOGIN_PATH, LOGOUT_PATH, REGISTRY_PATH, ROOT_PATH,
    VERIFY_PATH,
};

/// Build the application router with the auth gate in front of every route.
#[must_use]
pub fn router(auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route(ROOT_PATH, get(pages::root))
        .route(HEALTH_PATH, get(health::health))
        .route(LOGIN_PATH, get(auth::login::login_page).post(auth::login::login))
        .route(VERIFY_PATH, post(auth::login::verify))
        .route(LOGOUT_PATH, post(auth::session::logout))
        .route(REGISTRY_PATH, get(pages::registry))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth::auth_gate,
        ))
        .layer(Extension(auth_state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    emailer: Arc<dyn email::Emailer>,
    sweep_interval: Duration,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn AuthStore> = Arc::new(PgStore::new(pool));
    let auth_state = Arc::new(AuthState::new(auth_config, store.clone(), emailer));

    let sweeper = sweeper::spawn_sweeper(store, sweep_interval);

    let app = router(auth_state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
