//! Expiring session store with an optional write-through disk mirror.
//!
//! # Main types
//!
//! - [`Session`] — One owner's session: payload plus lifecycle timestamps.
//! - [`SessionStore`] — Thread-safe index with lazy expiration and recovery on startup.
//! - [`SessionBackend`] — Persistence seam; [`FileSessionBackend`] writes one JSON
//!   file per session, [`MemorySessionBackend`] is an in-process fake.

/// Persistence backends.
pub mod backend;
/// The session entity.
pub mod session;
/// The session store.
pub mod store;

pub use backend::{FileSessionBackend, LoadedSessions, MemorySessionBackend, SessionBackend};
pub use session::{Payload, Session};
pub use store::{RecoveryReport, SessionStore};
