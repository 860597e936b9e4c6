use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use time::{Duration, OffsetDateTime};
use tracing::{debug, error};

use super::{JsonCodec, SessionCodec, SessionError, SessionId};
use crate::profile::Profile;

/// How long a session lives after login.
pub const SESSION_TTL: Duration = Duration::hours(24);

#[derive(Debug)]
struct Record {
    data: Vec<u8>,
    expires: OffsetDateTime,
}

/// In-memory session records, keyed by [`SessionId`].
///
/// Nothing is persisted; every session is lost when the process exits. The
/// lock is only held for the duration of a map operation, never across an
/// await point.
#[derive(Debug)]
pub struct SessionStore {
    records: Mutex<HashMap<SessionId, Record>>,
    codec: Box<dyn SessionCodec>,
    ttl: Duration,
}

impl SessionStore {
    /// A store keeping whole profiles as JSON for [`SESSION_TTL`].
    pub fn new() -> Self {
        Self::with_codec(JsonCodec, SESSION_TTL)
    }

    pub fn with_codec(codec: impl SessionCodec + 'static, ttl: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            codec: Box::new(codec),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a new session holding `profile`. Expired records are swept
    /// while the lock is held.
    pub fn create(&self, profile: &Profile) -> Result<SessionId, SessionError> {
        let now = OffsetDateTime::now_utc();
        let data = self.codec.encode(profile)?;

        let mut records = self.lock()?;
        records.retain(|_, record| record.expires > now);

        let id = SessionId::new();
        records.insert(
            id,
            Record {
                data,
                expires: now + self.ttl,
            },
        );
        debug!(live = records.len(), "session created");

        Ok(id)
    }

    /// Look up the profile held by a session. Missing and expired sessions
    /// both read as `None`; the store is left untouched.
    pub fn load(&self, id: &SessionId) -> Result<Option<Profile>, SessionError> {
        let now = OffsetDateTime::now_utc();
        let records = self.lock()?;

        match records.get(id) {
            Some(record) if record.expires > now => Ok(Some(self.codec.decode(&record.data)?)),
            _ => Ok(None),
        }
    }

    /// End a session. Returns whether a record was removed.
    pub fn destroy(&self, id: &SessionId) -> Result<bool, SessionError> {
        let removed = self.lock()?.remove(id).is_some();
        if removed {
            debug!("session destroyed");
        }

        Ok(removed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, Record>>, SessionError> {
        self.records.lock().map_err(|_| {
            error!("session store lock poisoned");
            SessionError::Poisoned
        })
    }
}

#[cfg(test)]
impl SessionStore {
    /// Leave the lock poisoned, as a panic while holding it would.
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.records.lock();
            panic!("poison the session store");
        }));
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::{DecodeError, EncodeError};

    /// Refuses to store anything.
    #[derive(Debug)]
    struct BrokenCodec;

    impl SessionCodec for BrokenCodec {
        fn encode(&self, _: &Profile) -> Result<Vec<u8>, EncodeError> {
            Err(EncodeError("broken".to_string()))
        }

        fn decode(&self, _: &[u8]) -> Result<Profile, DecodeError> {
            Err(DecodeError("broken".to_string()))
        }
    }

    fn profile(id: &str) -> Profile {
        let mut profile = Profile::new(id);
        profile.email = Some("a@b.com".to_string());
        profile
    }

    #[test]
    fn create_then_load() {
        let store = SessionStore::new();
        let id = store.create(&profile("123")).expect("create session");

        assert_eq!(store.load(&id).unwrap(), Some(profile("123")));
        assert_eq!(store.load(&SessionId::new()).unwrap(), None);
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create(&profile("a")).unwrap();
        let b = store.create(&profile("b")).unwrap();

        assert_ne!(a, b);
        assert!(store.destroy(&a).unwrap());
        assert_eq!(store.load(&a).unwrap(), None);
        assert_eq!(store.load(&b).unwrap(), Some(profile("b")));
    }

    #[test]
    fn destroy_missing_session() {
        let store = SessionStore::new();

        assert!(!store.destroy(&SessionId::new()).unwrap());
    }

    #[test]
    fn expired_sessions_read_as_absent() {
        let store = SessionStore::with_codec(JsonCodec, Duration::ZERO);
        let id = store.create(&profile("123")).unwrap();

        assert_eq!(store.load(&id).unwrap(), None);
    }

    #[test]
    fn create_sweeps_expired_sessions() {
        let store = SessionStore::with_codec(JsonCodec, Duration::ZERO);
        store.create(&profile("old")).unwrap();
        store.create(&profile("new")).unwrap();

        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn poisoned_lock_is_an_error() {
        let store = SessionStore::new();
        store.poison();

        assert!(matches!(
            store.create(&profile("123")),
            Err(SessionError::Poisoned)
        ));
        assert!(matches!(
            store.load(&SessionId::new()),
            Err(SessionError::Poisoned)
        ));
        assert!(matches!(
            store.destroy(&SessionId::new()),
            Err(SessionError::Poisoned)
        ));
    }

    #[test]
    fn undecodable_record_is_an_error() {
        let store = SessionStore::new();
        let id = SessionId::new();
        store.records.lock().unwrap().insert(
            id,
            Record {
                data: b"garbage".to_vec(),
                expires: OffsetDateTime::now_utc() + Duration::hours(1),
            },
        );

        assert!(matches!(store.load(&id), Err(SessionError::Decode(_))));
    }

    #[test]
    fn unencodable_profile_is_not_stored() {
        let store = SessionStore::with_codec(BrokenCodec, SESSION_TTL);

        assert!(matches!(
            store.create(&profile("123")),
            Err(SessionError::Encode(_))
        ));
        assert!(store.records.lock().unwrap().is_empty());
    }
}
