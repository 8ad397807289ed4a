use crate::backend::{FileSessionBackend, SessionBackend};
use crate::session::{expiry_from, Payload, Session};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tenure_core::{validate_ttl, StoreConfig, TenureResult};
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of the startup scan of a persistent store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Live sessions put back into the index.
    pub loaded: usize,
    /// Sessions that had expired while the store was down; their files were removed.
    pub expired: usize,
    /// Corrupt files that were deleted.
    pub malformed: usize,
}

/// Thread-safe session index with lazy expiration and an optional
/// write-through persistence backend.
///
/// Every operation runs under one store-wide lock, including backend I/O, so
/// once a mutating call returns `Ok` the mirror matches the index. Backend
/// writes happen before the index is changed; if they fail the call returns
/// the error and the index is left as it was.
///
/// Reads hand out copies. Changing a returned [`Session`] has no effect on
/// the store; use [`SessionStore::update_session`].
pub struct SessionStore {
    default_ttl_secs: u64,
    sessions: Mutex<HashMap<String, Session>>,
    backend: Option<Box<dyn SessionBackend>>,
    recovery: RecoveryReport,
}

impl SessionStore {
    /// Creates a store. With `storage_path`, sessions are mirrored to
    /// `<storage_path>/<id>.json` and previously saved live sessions are
    /// loaded before this returns.
    pub fn new(default_ttl_secs: u64, storage_path: Option<PathBuf>) -> TenureResult<Self> {
        validate_ttl(default_ttl_secs)?;
        let backend = match storage_path {
            Some(dir) => Some(Box::new(FileSessionBackend::open(dir)?) as Box<dyn SessionBackend>),
            None => None,
        };
        Self::build(default_ttl_secs, backend)
    }

    /// Creates a store from a validated [`StoreConfig`].
    pub fn from_config(config: &StoreConfig) -> TenureResult<Self> {
        config.validate()?;
        Self::new(config.default_ttl_secs, config.storage_path.clone())
    }

    /// Creates a store without persistence.
    pub fn in_memory(default_ttl_secs: u64) -> TenureResult<Self> {
        Self::build(default_ttl_secs, None)
    }

    /// Creates a store mirrored to a custom backend.
    pub fn with_backend(
        default_ttl_secs: u64,
        backend: impl SessionBackend + 'static,
    ) -> TenureResult<Self> {
        Self::build(default_ttl_secs, Some(Box::new(backend)))
    }

    fn build(
        default_ttl_secs: u64,
        backend: Option<Box<dyn SessionBackend>>,
    ) -> TenureResult<Self> {
        validate_ttl(default_ttl_secs)?;

        let mut sessions = HashMap::new();
        let mut recovery = RecoveryReport::default();

        if let Some(backend) = &backend {
            let loaded = backend.load_all()?;
            recovery.malformed = loaded.malformed;

            let now = Utc::now();
            for session in loaded.sessions {
                if session.is_expired_at(now) {
                    backend.delete(&session.id)?;
                    recovery.expired += 1;
                } else {
                    sessions.insert(session.id.clone(), session);
                    recovery.loaded += 1;
                }
            }

            info!(
                loaded = recovery.loaded,
                expired = recovery.expired,
                malformed = recovery.malformed,
                location = ?backend.location(),
                "Session store recovered"
            );
        }

        Ok(Self {
            default_ttl_secs,
            sessions: Mutex::new(sessions),
            backend,
            recovery,
        })
    }

    /// Creates a session for `owner_id` and returns its id.
    ///
    /// `ttl_secs` falls back to the store default; `Some(0)` is a
    /// configuration error.
    pub fn create_session(
        &self,
        owner_id: impl Into<String>,
        payload: Option<Payload>,
        ttl_secs: Option<u64>,
    ) -> TenureResult<String> {
        let ttl_secs = ttl_secs.unwrap_or(self.default_ttl_secs);
        validate_ttl(ttl_secs)?;
        let owner_id = owner_id.into();
        let payload = payload.unwrap_or_default();

        let mut sessions = self.sessions.lock();
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Session::with_id(id, owner_id, payload, ttl_secs, Utc::now())?;

        self.persist(&session)?;
        debug!(
            session_id = %session.id,
            owner_id = %session.owner_id,
            expires_at = %session.expires_at,
            "Session created"
        );
        let id = session.id.clone();
        sessions.insert(id.clone(), session);
        Ok(id)
    }

    /// Returns a copy of a live session and records the access.
    ///
    /// An expired session is evicted (index and file) and reported as `None`.
    pub fn get_session(&self, id: &str) -> TenureResult<Option<Session>> {
        self.modify_live(id, |_, _| Ok(()))
    }

    /// Writes `data` into a live session's payload.
    ///
    /// With `merge` the keys in `data` are added or overwritten and all other
    /// keys kept; without it the payload is replaced. Returns `false` if the
    /// session does not exist or has expired.
    pub fn update_session(&self, id: &str, data: Payload, merge: bool) -> TenureResult<bool> {
        let updated = self.modify_live(id, move |session, _| {
            if merge {
                session.payload.extend(data);
            } else {
                session.payload = data;
            }
            Ok(())
        })?;
        Ok(updated.is_some())
    }

    /// Gives a live session a new lifetime of `ttl_secs` counted from now.
    pub fn update_session_ttl(&self, id: &str, ttl_secs: u64) -> TenureResult<bool> {
        validate_ttl(ttl_secs)?;
        let updated = self.modify_live(id, |session, now| {
            session.expires_at = expiry_from(now, ttl_secs)?;
            Ok(())
        })?;
        Ok(updated.is_some())
    }

    /// Removes a session and its file. Returns `false` for unknown ids.
    pub fn delete_session(&self, id: &str) -> TenureResult<bool> {
        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(id) {
            return Ok(false);
        }
        self.unpersist(id)?;
        sessions.remove(id);
        debug!(session_id = %id, "Session deleted");
        Ok(true)
    }

    /// Live sessions belonging to `owner_id`, in no particular order.
    ///
    /// Expired sessions are skipped but left in place for the next access or
    /// [`SessionStore::cleanup_expired`] to evict.
    pub fn get_user_sessions(&self, owner_id: &str) -> Vec<Session> {
        let now = Utc::now();
        self.sessions
            .lock()
            .values()
            .filter(|s| s.owner_id == owner_id && !s.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Every live session, in no particular order.
    ///
    /// Read-only like [`SessionStore::get_user_sessions`]: no touch, no eviction.
    pub fn live_sessions(&self) -> Vec<Session> {
        let now = Utc::now();
        self.sessions
            .lock()
            .values()
            .filter(|s| !s.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Evicts every expired session and returns how many were removed.
    ///
    /// Meant to be called periodically by an external scheduler.
    pub fn cleanup_expired(&self) -> TenureResult<usize> {
        let mut sessions = self.sessions.lock();
        let now = Utc::now();
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired_at(now))
            .map(|s| s.id.clone())
            .collect();

        for id in &expired {
            self.unpersist(id)?;
            sessions.remove(id);
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), remaining = sessions.len(), "Expired sessions cleaned up");
        }
        Ok(expired.len())
    }

    /// Removes every session and its file.
    pub fn clear(&self) -> TenureResult<()> {
        let mut sessions = self.sessions.lock();
        let ids: Vec<String> = sessions.keys().cloned().collect();
        for id in &ids {
            self.unpersist(id)?;
            sessions.remove(id);
        }
        info!(removed = ids.len(), "Session store cleared");
        Ok(())
    }

    /// Number of indexed sessions, including expired ones not yet evicted.
    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// `true` when the index holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Snapshot of every indexed id, expired or not.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// TTL applied when a create call omits one.
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Directory the store mirrors to, if persistence is file-backed.
    pub fn storage_path(&self) -> Option<&Path> {
        self.backend.as_ref().and_then(|b| b.location())
    }

    /// What the startup scan found. All zeros for an in-memory store.
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Looks up a live session, applies `change` to a copy, touches and
    /// persists it, then commits it to the index. Lookup, eviction and commit
    /// happen under one lock acquisition.
    fn modify_live<F>(&self, id: &str, change: F) -> TenureResult<Option<Session>>
    where
        F: FnOnce(&mut Session, DateTime<Utc>) -> TenureResult<()>,
    {
        let mut sessions = self.sessions.lock();
        let now = Utc::now();

        let mut session = match sessions.get(id) {
            None => return Ok(None),
            Some(existing) if existing.is_expired_at(now) => {
                self.unpersist(id)?;
                sessions.remove(id);
                debug!(session_id = %id, "Expired session evicted on access");
                return Ok(None);
            }
            Some(existing) => existing.clone(),
        };

        change(&mut session, now)?;
        session.touch_at(now);
        self.persist(&session)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(Some(session))
    }

    fn persist(&self, session: &Session) -> TenureResult<()> {
        match &self.backend {
            Some(backend) => backend.save(session),
            None => Ok(()),
        }
    }

    fn unpersist(&self, id: &str) -> TenureResult<()> {
        match &self.backend {
            Some(backend) => backend.delete(id),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("count", &self.count())
            .field("storage_path", &self.storage_path())
            .finish()
    }
}
