//! [`SessionStore`] (spec §4.6): an in-memory map from session id to
//! `Session`, enforcing bounded count and TTL.

use reasoning_core::id::SessionId;
use reasoning_core::model::{Session, SessionState};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Default maximum number of simultaneous sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 100;
/// Default session idle TTL, in seconds.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 60;
/// Default interval between expiry sweeps, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// In-memory map from session id to `Session`. A process-wide singleton
/// (spec §5), guarded by a `RwLock` the way the teacher's `MemoryStore`
/// guards its `HashMap`.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    max_sessions: usize,
    ttl_seconds: i64,
}

impl SessionStore {
    /// Build a store with the given bounds.
    pub fn new(max_sessions: usize, ttl_seconds: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            ttl_seconds,
        }
    }

    /// Insert a freshly-created session, failing if the store is at
    /// capacity (spec §4.6: "`start` beyond the cap fails with
    /// `session-limit-exceeded`... never by silently evicting active
    /// sessions").
    pub async fn insert(&self, session: Session) -> Result<(), usize> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(self.max_sessions);
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Run `f` against a mutable reference to the session, if present.
    /// Returns `None` if the session does not exist.
    pub async fn with_mut<R>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(f)
    }

    /// Clone the current session state, if present.
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session outright (spec §4.6: finalize "removes the session
    /// from the store" and this is "the single source of truth against
    /// accumulation").
    pub async fn remove(&self, id: &SessionId) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    /// Current number of tracked sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store currently tracks no sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ids of every currently-tracked session, for checkpoint snapshots
    /// (spec §4.10's "session ids active").
    pub async fn active_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Mark and remove every session idle past the TTL. Returns the ids
    /// removed, for logging.
    pub async fn sweep_expired(&self) -> Vec<SessionId> {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| (now - s.last_activity_at).num_seconds() > self.ttl_seconds)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(session) = sessions.get_mut(id) {
                session.state = SessionState::Expired;
            }
            sessions.remove(id);
        }
        expired
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL_SECONDS)
    }
}
