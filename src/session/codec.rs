//! How a profile is laid out inside a session record.

use std::fmt;

use thiserror::Error;

use crate::profile::Profile;

/// A profile could not be turned into a session record.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("unable to encode session profile: {0}")]
pub struct EncodeError(pub String);

/// A stored session record could not be turned back into a profile.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("unable to decode session profile: {0}")]
pub struct DecodeError(pub String);

/// Converts a [`Profile`] to and from the bytes kept in the session store.
///
/// The store never looks inside a record, so a codec can shrink what is kept
/// (only the id, say) without any change to the routes.
pub trait SessionCodec: Send + Sync + fmt::Debug {
    fn encode(&self, profile: &Profile) -> Result<Vec<u8>, EncodeError>;

    fn decode(&self, bytes: &[u8]) -> Result<Profile, DecodeError>;
}

/// Keeps the whole profile as JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn encode(&self, profile: &Profile) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(profile).map_err(|e| EncodeError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Profile, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_profile_verbatim() {
        let raw = br#"{"id":"123","email":"a@b.com","hd":"b.com"}"#;

        let profile = JsonCodec.decode(raw).expect("decode profile");
        assert_eq!(profile.id, "123");
        assert_eq!(JsonCodec.encode(&profile).unwrap(), raw);
    }

    #[test]
    fn json_rejects_garbage() {
        assert!(JsonCodec.decode(b"not json").is_err());
        assert!(JsonCodec.decode(br#"{"email":"a@b.com"}"#).is_err());
    }
}
