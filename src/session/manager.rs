//! Token-keyed session store.
//!
//! Maps opaque session tokens to live [`SessionAuthority`] instances. The
//! raw token is returned to the caller exactly once at creation; the map key
//! is its SHA-256 hash. Idle sessions are evicted lazily on access and
//! swept on creation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::token::{generate_session_token, hash_session_token};
use super::{AuthCore, SessionAuthority};
use crate::error::Error;

struct SessionEntry {
    authority: SessionAuthority,
    last_touched: DateTime<Utc>,
}

pub struct SessionManager {
    core: AuthCore,
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(core: AuthCore) -> Self {
        Self {
            core,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open a new anonymous session and return its raw token.
    pub fn create(&self) -> Result<String, Error> {
        let token = generate_session_token()?;
        let hash = hash_session_token(&token);
        let now = self.core.clock().now();
        let idle_ttl = self.core.config().idle_ttl();

        let mut sessions = self.sessions.lock();
        sessions.retain(|_, entry| now - entry.last_touched < idle_ttl);
        sessions.insert(
            hash,
            SessionEntry {
                authority: self.core.session(),
                last_touched: now,
            },
        );
        Ok(token)
    }

    /// Run `f` against the session behind `token`.
    ///
    /// Unknown tokens and sessions idle past the retention window yield
    /// `None`; the access itself counts as activity.
    pub fn with_session<R>(&self, token: &str, f: impl FnOnce(&mut SessionAuthority) -> R) -> Option<R> {
        let hash = hash_session_token(token);
        let now = self.core.clock().now();
        let idle_ttl = self.core.config().idle_ttl();

        let mut sessions = self.sessions.lock();
        let expired = match sessions.get(&hash) {
            Some(entry) => now - entry.last_touched >= idle_ttl,
            None => return None,
        };
        if expired {
            sessions.remove(&hash);
            return None;
        }
        let entry = sessions.get_mut(&hash)?;
        entry.last_touched = now;
        Some(f(&mut entry.authority))
    }

    /// Drop the session behind `token`. Idempotent.
    pub fn destroy(&self, token: &str) {
        let hash = hash_session_token(token);
        self.sessions.lock().remove(&hash);
    }

    /// Evict idle sessions; returns how many were dropped.
    pub fn prune(&self) -> usize {
        let now = self.core.clock().now();
        let idle_ttl = self.core.config().idle_ttl();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_touched < idle_ttl);
        before - sessions.len()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
