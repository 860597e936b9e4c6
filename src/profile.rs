//! The identity profile handed back by the provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user as described by the identity provider at login time.
///
/// The profile is stored in the session exactly as received and returned
/// unchanged from `/api/profile`. Fields doorman doesn't know about are kept
/// in `extra` so nothing the provider sent is lost.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Provider-assigned unique id (the OIDC subject).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            avatar_url: None,
            extra: Map::new(),
        }
    }
}
