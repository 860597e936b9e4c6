//! Server-side sessions.
//!
//! A session is a record in the in-memory [`SessionStore`] holding at most
//! one [`Profile`](crate::profile::Profile). The browser only ever sees the
//! [`SessionId`], sealed inside the session cookie.

mod codec;
mod store;

pub use codec::{DecodeError, EncodeError, JsonCodec, SessionCodec};
pub use store::{SessionStore, SESSION_TTL};

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Errors from the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session store lock poisoned")]
    Poisoned,
    #[error("profile cannot be stored: {0}")]
    Encode(#[from] EncodeError),
    #[error("stored session is unreadable: {0}")]
    Decode(#[from] DecodeError),
}

/// Identifies a session record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_parses_back() {
        let id = SessionId::new();

        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
        assert!("not-a-session".parse::<SessionId>().is_err());
    }
}
