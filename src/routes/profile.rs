use crate::{gate::Authenticated, profile::Profile, ServerState};

use axum::response::Json;

/// The profile stored at login, exactly as the provider sent it.
#[axum::debug_handler(state = ServerState)]
pub async fn profile_handler(Authenticated(profile): Authenticated) -> Json<Profile> {
    Json(profile)
}
