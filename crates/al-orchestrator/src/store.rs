//! Session persistence with per-key compare-and-set.
//!
//! A stored session carries the version it was written at. `save` succeeds
//! only when the caller's snapshot still matches the stored version, so a
//! turn that raced with a clear or another turn is rejected instead of
//! silently overwriting it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::dialogue::Session;
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current snapshot, or `None` if the user has no session.
    async fn get(&self, user_id: &str) -> StoreResult<Option<Session>>;

    /// Write `session` if the stored version still equals `session.version`
    /// (0 = not stored yet). Returns the new version.
    async fn save(&self, session: &Session) -> StoreResult<u64>;

    /// Remove the session. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> StoreResult<bool>;
}

/// Process-local store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    /// Versions are unique across keys, so a deleted and recreated session
    /// never reuses an old version.
    next_version: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn save(&self, session: &Session) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().await;
        let found = sessions.get(&session.user_id).map_or(0, |s| s.version);
        if found != session.version {
            return Err(StoreError::VersionConflict {
                user_id: session.user_id.clone(),
                expected: session.version,
                found,
            });
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stored = session.clone();
        stored.version = version;
        sessions.insert(stored.user_id.clone(), stored);
        Ok(version)
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        let removed = self.sessions.write().await.remove(user_id).is_some();
        if removed {
            tracing::debug!(user_id, "session cleared");
        }
        Ok(removed)
    }
}
