//! Starts a login by sending the browser to the provider's consent screen.

use super::{found, login_cookie_name};
use crate::{error::HttpError, gate, oidc::LOGIN_TTL, ServerState};

use axum::{extract::State, http::HeaderValue, response::Response};
use tower_cookies::Cookies;
use tracing::error;

#[axum::debug_handler(state = ServerState)]
pub async fn login_handler(
    State(state): State<ServerState>,
    cookies: Cookies,
) -> Result<Response, HttpError> {
    let (url, pending) = state.provider.authorize();

    let cookie_config = &state.config.cookie;
    let value = pending.to_cookie(&cookie_config.key).map_err(|e| {
        error!("failed to seal login state: {}", e);
        HttpError::Internal
    })?;
    cookies.add(gate::cookie(
        cookie_config,
        login_cookie_name(cookie_config),
        value,
        LOGIN_TTL,
    ));

    let location = HeaderValue::from_str(url.as_str()).map_err(|e| {
        error!("provider returned an unusable authorization url: {}", e);
        HttpError::Internal
    })?;

    Ok(found(location))
}
