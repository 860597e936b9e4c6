mod callback;
mod login;
mod logout;
mod profile;

use crate::config::CookieConfig;
use crate::oidc::CALLBACK_PATH;
use crate::ServerState;
use callback::callback_handler;
use login::login_handler;
use logout::logout_handler;
use profile::profile_handler;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, Router},
};
use serde_json::{json, Value};

/// Where browsers are sent when a login doesn't complete.
pub const FAILURE_PATH: &str = "/login-failed";

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/api/auth/google", get(login_handler))
        .route(CALLBACK_PATH, get(callback_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/profile", get(profile_handler))
        .route("/api/health", get(health_handler))
        .route(FAILURE_PATH, get(login_failed_handler))
}

#[axum::debug_handler(state = ServerState)]
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[axum::debug_handler(state = ServerState)]
async fn login_failed_handler() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Login failed" })))
}

/// A plain `302 Found` redirect.
fn found(location: HeaderValue) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Name of the cookie holding a login in progress.
fn login_cookie_name(config: &CookieConfig) -> String {
    format!("{}_login", config.name)
}
