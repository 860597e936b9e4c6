use crate::{error::HttpError, gate, ServerState};

use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use tracing::info;

/// Ends the request's session, if it has one.
///
/// Succeeds for anonymous requests too. A store failure is returned as a
/// 500 and leaves the cookie in place.
#[axum::debug_handler(state = ServerState)]
pub async fn logout_handler(
    State(state): State<ServerState>,
    cookies: Cookies,
) -> Result<Json<Value>, HttpError> {
    if let Some(id) = gate::session_id(&state, &cookies) {
        if state.sessions.destroy(&id)? {
            info!("user logged out");
        }
    }

    cookies.remove(gate::removal(state.config.cookie.name.clone()));

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use time::Duration;
    use tower::ServiceExt;

    use crate::{app, gate, profile::Profile, testing};

    #[tokio::test]
    async fn store_failure_keeps_cookie() {
        let state = testing::state();
        let id = state.sessions.create(&Profile::new("123")).unwrap();
        let cookie = gate::session_cookie(&state.config.cookie, &id, Duration::hours(24)).unwrap();
        state.sessions.poison();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/logout")
            .header(
                header::COOKIE,
                format!("{}={}", cookie.name(), cookie.value()),
            )
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn store_failure_is_not_anonymous() {
        let state = testing::state();
        let id = state.sessions.create(&Profile::new("123")).unwrap();
        let cookie = gate::session_cookie(&state.config.cookie, &id, Duration::hours(24)).unwrap();
        state.sessions.poison();

        let request = Request::builder()
            .uri("/api/profile")
            .header(
                header::COOKIE,
                format!("{}={}", cookie.name(), cookie.value()),
            )
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
