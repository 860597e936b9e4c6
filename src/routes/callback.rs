//! A route for handling the OAuth callback.

use super::{found, login_cookie_name, FAILURE_PATH};
use crate::ServerState;
use crate::{
    error::HttpError,
    gate,
    oidc::{ExchangeError, PendingLogin},
    profile::Profile,
};

use axum::{
    extract::{Query, State},
    http::HeaderValue,
    response::Response,
};
use serde::Deserialize;
use thiserror::Error;
use tower_cookies::Cookies;
use tracing::{info, warn};

#[derive(Deserialize, Debug, Default)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Why a login ended on the failure page.
#[derive(Error, Debug)]
enum LoginFailure {
    #[error("provider reported {0}")]
    Denied(String),
    #[error("no login in progress")]
    NoPendingLogin,
    #[error("login state unreadable: {0}")]
    BadPendingLogin(anyhow::Error),
    #[error("state parameter does not match")]
    StateMismatch,
    #[error("no authorization code")]
    MissingCode,
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// A handler for receiving the callback during the OAuth flow.
///
/// Success replaces whatever session the browser had with a new one and
/// sends it to the frontend. Every failure on the provider's side sends it
/// to [`FAILURE_PATH`] instead.
#[axum::debug_handler(state = ServerState)]
pub async fn callback_handler(
    State(state): State<ServerState>,
    cookies: Cookies,
    Query(params): Query<CallbackParams>,
) -> Result<Response, HttpError> {
    let profile = match authenticate(&state, &cookies, params).await {
        Ok(profile) => profile,
        Err(reason) => {
            warn!("login failed: {}", reason);
            return Ok(found(HeaderValue::from_static(FAILURE_PATH)));
        }
    };

    // a browser holds at most one identity
    if let Some(previous) = gate::session_id(&state, &cookies) {
        state.sessions.destroy(&previous)?;
    }

    let id = state.sessions.create(&profile)?;
    cookies.add(gate::session_cookie(
        &state.config.cookie,
        &id,
        state.sessions.ttl(),
    )?);

    info!(user = %profile.id, "user logged in");

    Ok(found(state.config.cors_origin.clone()))
}

async fn authenticate(
    state: &ServerState,
    cookies: &Cookies,
    params: CallbackParams,
) -> Result<Profile, LoginFailure> {
    let cookie_config = &state.config.cookie;
    let login_cookie = login_cookie_name(cookie_config);

    // the pending login is single use, whatever happens next
    let pending = cookies.get(&login_cookie).map(|c| c.value().to_string());
    cookies.remove(gate::removal(login_cookie));

    if let Some(error) = params.error {
        return Err(LoginFailure::Denied(error));
    }

    let pending = pending.ok_or(LoginFailure::NoPendingLogin)?;
    let pending = PendingLogin::from_cookie(&pending, &cookie_config.key)
        .map_err(LoginFailure::BadPendingLogin)?;

    match params.state {
        Some(ref s) if pending.matches_state(s) => {}
        _ => return Err(LoginFailure::StateMismatch),
    }

    let code = params.code.ok_or(LoginFailure::MissingCode)?;

    Ok(state.provider.exchange(&code, &pending).await?)
}
