use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tenure_core::{TenureError, TenureResult};
use uuid::Uuid;

/// Caller-owned key/value data attached to a session. Never interpreted by the store.
pub type Payload = HashMap<String, serde_json::Value>;

/// A single owner session with its payload and lifecycle timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Store-generated primary key (UUID v4 text).
    pub id: String,
    /// Caller-supplied owner; not unique.
    pub owner_id: String,
    /// Opaque caller data.
    #[serde(default)]
    pub payload: Payload,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last successful read or update.
    pub last_accessed_at: DateTime<Utc>,
    /// Instant after which the session is expired.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session with a fresh UUID v4 id that expires `ttl_secs` from now.
    pub fn new(owner_id: impl Into<String>, payload: Payload, ttl_secs: u64) -> TenureResult<Self> {
        Self::with_id(Uuid::new_v4().to_string(), owner_id, payload, ttl_secs, Utc::now())
    }

    pub(crate) fn with_id(
        id: String,
        owner_id: impl Into<String>,
        payload: Payload,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> TenureResult<Self> {
        Ok(Self {
            id,
            owner_id: owner_id.into(),
            payload,
            created_at: now,
            last_accessed_at: now,
            expires_at: expiry_from(now, ttl_secs)?,
        })
    }

    /// `true` once the current time is strictly past `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// [`Session::is_expired`] against a given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Marks the session as accessed now.
    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    /// Marks the session as accessed at `now`.
    pub fn touch_at(&mut self, now: DateTime<Utc>) {
        // Wall-clock steps backwards must not break created_at <= last_accessed_at.
        self.last_accessed_at = now.max(self.created_at);
    }

    /// Remaining lifetime, zero once expired.
    pub fn time_to_live(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }
}

/// Computes `now + ttl_secs`, rejecting zero and out-of-range TTLs.
pub(crate) fn expiry_from(now: DateTime<Utc>, ttl_secs: u64) -> TenureResult<DateTime<Utc>> {
    tenure_core::validate_ttl(ttl_secs)?;
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| TenureError::config(format!("TTL of {ttl_secs}s is out of range")))
}
