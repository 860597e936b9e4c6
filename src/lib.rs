//! # doorman
//!
//! doorman is a small session gateway in front of Google sign-in
//!
//! ## About
//!
//! doorman sends users through Google's OAuth consent screen, keeps the
//! profile Google returns in a server-side session, and hands it back to the
//! frontend from a session-gated API. The browser only ever holds a sealed
//! [Paseto v4.local] cookie naming its session. Nothing is written to a
//! database; sessions live for 24 hours or until logout.
//!
//! | route | |
//! |---|---|
//! | `GET /api/auth/google` | redirect to Google |
//! | `GET /api/auth/google/callback` | finish login, redirect to the frontend |
//! | `POST /api/auth/logout` | end the session |
//! | `GET /api/profile` | the logged in user, or 401 |
//! | `GET /api/health` | liveness |
//!
//! [Paseto v4.local]: https://github.com/paseto-standard/paseto-spec

pub mod config;
pub mod error;
pub mod gate;
pub mod oidc;
pub mod profile;
mod routes;
pub mod session;
pub mod shutdown;
pub mod token;

pub use routes::{routes, FAILURE_PATH};

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

/// Largest request body accepted by any route.
const BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ServerState {
    pub config: Arc<config::Config>,
    pub sessions: Arc<session::SessionStore>,
    pub provider: Arc<dyn oidc::IdentityProvider>,
}

impl ServerState {
    /// State with an empty session store.
    pub fn new(config: config::Config, provider: Arc<dyn oidc::IdentityProvider>) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(session::SessionStore::new()),
            provider,
        }
    }
}

/// The complete service: routes plus tracing, CORS and cookie handling, in
/// that order from the outside in.
pub fn app(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    routes()
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(LatencyUnit::Micros),
                        ),
                )
                .layer(cors)
                .layer(CookieManagerLayer::new()),
        )
}
