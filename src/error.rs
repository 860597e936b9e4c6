use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::session::SessionError;

/// Errors a handler can end a request with.
#[derive(Debug)]
pub enum HttpError {
    /// No identity is attached to the request's session.
    Unauthenticated,
    /// Anything the client can't fix. Details are logged, not returned.
    Internal,
}

impl From<SessionError> for HttpError {
    fn from(e: SessionError) -> Self {
        error!("session store failed: {}", e);
        HttpError::Internal
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "User not authenticated" })),
            )
                .into_response(),
            HttpError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}
