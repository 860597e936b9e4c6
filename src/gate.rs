//! The session gate: which identity, if any, a request carries.
//!
//! The session cookie holds a sealed token whose `jti` is the session id.
//! A request is authenticated iff that token opens under the session key,
//! hasn't expired, and names a live record in the [`SessionStore`].
//!
//! [`SessionStore`]: crate::session::SessionStore

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use time::Duration;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::{debug, error};

use crate::config::CookieConfig;
use crate::error::HttpError;
use crate::profile::Profile;
use crate::session::{SessionError, SessionId};
use crate::token::{Claims, ClaimsValidator};
use crate::ServerState;

const SESSION_PURPOSE: &[u8] = b"doorman-session";

/// An authenticated user, extracted from the session cookie.
///
/// Handlers taking this only run for requests whose session holds an
/// identity; everyone else gets `401 {"error": "User not authenticated"}`.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Profile);

#[async_trait]
impl FromRequestParts<ServerState> for Authenticated {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| {
                error!("cookies unavailable: {}", msg);
                HttpError::Internal
            })?;

        identify(state, &cookies)?
            .map(Authenticated)
            .ok_or(HttpError::Unauthenticated)
    }
}

/// Whether the request's session currently holds an identity.
pub fn is_authenticated(state: &ServerState, cookies: &Cookies) -> bool {
    matches!(identify(state, cookies), Ok(Some(_)))
}

/// The profile held by the request's session. Reads only.
pub fn identify(state: &ServerState, cookies: &Cookies) -> Result<Option<Profile>, SessionError> {
    match session_id(state, cookies) {
        Some(id) => state.sessions.load(&id),
        None => Ok(None),
    }
}

/// The session id sealed in the request's session cookie, if the cookie is
/// present, authentic and unexpired.
pub fn session_id(state: &ServerState, cookies: &Cookies) -> Option<SessionId> {
    let config = &state.config.cookie;
    let cookie = cookies.get(&config.name)?;

    let validator = ClaimsValidator::new().with_rule(|c| c.token_identifier().is_some());
    let claims = config
        .key
        .open(cookie.value(), &validator, SESSION_PURPOSE)
        .map_err(|e| debug!("ignoring session cookie: {}", e))
        .ok()?;

    claims
        .token_identifier()
        .and_then(|jti| jti.parse().ok())
}

/// Build the cookie carrying a session id. It lives exactly as long as the
/// session record.
pub fn session_cookie(
    config: &CookieConfig,
    id: &SessionId,
    ttl: Duration,
) -> Result<Cookie<'static>, HttpError> {
    let claims = Claims::expiring_in(ttl)
        .and_then(|claims| claims.with_token_identifier(&id.to_string()))
        .map_err(|e| {
            error!("failed to build session claims: {}", e);
            HttpError::Internal
        })?;

    let value = config.key.seal(&claims, SESSION_PURPOSE).map_err(|e| {
        error!("failed to seal session cookie: {}", e);
        HttpError::Internal
    })?;

    Ok(cookie(config, config.name.clone(), value, ttl))
}

/// A cookie with the attributes every doorman cookie shares.
pub(crate) fn cookie(
    config: &CookieConfig,
    name: String,
    value: String,
    max_age: Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// A cookie that clears `name` when added to the removal list.
pub(crate) fn removal(name: String) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{header, Request},
        routing::get,
        Router,
    };
    use tower::ServiceExt;
    use tower_cookies::CookieManagerLayer;

    use crate::testing::state;

    async fn check(state: &ServerState, cookie: Option<String>) -> String {
        let app = Router::new()
            .route(
                "/",
                get(|State(state): State<ServerState>, cookies: Cookies| async move {
                    is_authenticated(&state, &cookies).to_string()
                }),
            )
            .with_state(state.clone())
            .layer(CookieManagerLayer::new());

        let mut request = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn session_gate() {
        let state = state();
        let name = &state.config.cookie.name;

        assert_eq!(check(&state, None).await, "false");

        let id = state.sessions.create(&Profile::new("123")).unwrap();
        let cookie = session_cookie(&state.config.cookie, &id, Duration::hours(24)).unwrap();
        let header = format!("{}={}", name, cookie.value());
        assert_eq!(check(&state, Some(header.clone())).await, "true");

        // a sealed id with no live record behind it
        let stale = session_cookie(&state.config.cookie, &SessionId::new(), Duration::hours(24))
            .unwrap();
        let stale = format!("{}={}", name, stale.value());
        assert_eq!(check(&state, Some(stale)).await, "false");

        state.sessions.destroy(&id).unwrap();
        assert_eq!(check(&state, Some(header)).await, "false");
    }

    #[tokio::test]
    async fn expired_cookie_is_anonymous() {
        let state = state();
        let id = state.sessions.create(&Profile::new("123")).unwrap();

        let cookie = session_cookie(&state.config.cookie, &id, Duration::seconds(-1)).unwrap();
        let header = format!("{}={}", state.config.cookie.name, cookie.value());

        assert_eq!(check(&state, Some(header)).await, "false");
    }

    #[test]
    fn cookie_attributes() {
        let state = state();
        let id = SessionId::new();

        let cookie = session_cookie(&state.config.cookie, &id, Duration::hours(24)).unwrap();
        assert_eq!(cookie.name(), "_doorman_session");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::hours(24)));
    }
}
