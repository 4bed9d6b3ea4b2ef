//! Chat service — one turn per call, serialized per user.
//!
//! A turn reads the whole session, runs the dialogue on it and writes it
//! back with compare-and-set. Turns for the same user queue on a per-user
//! lock; different users never wait on each other. Leads are dispatched
//! only after the session write succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::dialogue::{Dialogue, DialogueState, Session};
use crate::error::{StoreError, StoreResult};
use crate::leads::{LeadDispatcher, RoutedLead};
use crate::store::SessionStore;

/// Attempts per turn when the stored session changed underneath us.
const MAX_TURN_ATTEMPTS: usize = 2;

/// What a turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub replies: Vec<String>,
    pub state: DialogueState,
    /// Leads handed to the sinks during this turn.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leads: Vec<RoutedLead>,
}

pub struct ChatService {
    dialogue: Dialogue,
    store: Arc<dyn SessionStore>,
    dispatcher: LeadDispatcher,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(dialogue: Dialogue, store: Arc<dyn SessionStore>, dispatcher: LeadDispatcher) -> Self {
        Self {
            dialogue,
            store,
            dispatcher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the map entry once nobody else holds or waits on `lock`.
    async fn release_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        let idle = Arc::strong_count(&lock) == 2
            && locks.get(user_id).is_some_and(|held| Arc::ptr_eq(held, &lock));
        if idle {
            locks.remove(user_id);
        }
    }

    /// Run one message through the dialogue for `user_id`.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> StoreResult<ChatReply> {
        let lock = self.user_lock(user_id).await;
        let reply = {
            let _turn = lock.lock().await;
            self.run_turn(user_id, text).await
        };
        self.release_lock(user_id, lock).await;
        reply
    }

    async fn run_turn(&self, user_id: &str, text: &str) -> StoreResult<ChatReply> {
        let mut attempt = 0;
        let (session, outcome) = loop {
            attempt += 1;
            let mut session = match self.store.get(user_id).await? {
                Some(s) => s,
                None => {
                    tracing::debug!(user_id, "no session, starting fresh");
                    Session::new(user_id)
                }
            };
            let outcome = self.dialogue.handle(&mut session, text).await;

            match self.store.save(&session).await {
                Ok(version) => {
                    session.version = version;
                    break (session, outcome);
                }
                Err(e @ StoreError::VersionConflict { .. }) if attempt < MAX_TURN_ATTEMPTS => {
                    tracing::warn!(user_id, error = %e, "session changed during turn, replaying");
                }
                Err(e) => return Err(e),
            }
        };

        let mut leads = Vec::with_capacity(outcome.leads.len());
        for lead in outcome.leads {
            leads.push(self.dispatcher.dispatch(lead).await);
        }

        tracing::info!(
            user_id,
            state = %session.state,
            replies = outcome.replies.len(),
            leads = leads.len(),
            "turn complete"
        );
        Ok(ChatReply {
            replies: outcome.replies,
            state: session.state,
            leads,
        })
    }

    /// Drop the user's session. The next message starts from the greeting.
    pub async fn clear(&self, user_id: &str) -> StoreResult<bool> {
        let lock = self.user_lock(user_id).await;
        let removed = {
            let _turn = lock.lock().await;
            self.store.delete(user_id).await
        };
        self.release_lock(user_id, lock).await;
        removed
    }

    pub async fn snapshot(&self, user_id: &str) -> StoreResult<Option<Session>> {
        self.store.get(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::tests::dialogue;
    use crate::leads::MockLeadSink;
    use crate::leads::routing::{LeadRouter, RoutingConfig};
    use crate::store::InMemorySessionStore;
    use al_catalog::BrandMatcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn service_with(store: Arc<dyn SessionStore>) -> (ChatService, Arc<MockLeadSink>) {
        let sink = Arc::new(MockLeadSink::new());
        let router = LeadRouter::new(RoutingConfig::default(), Arc::new(BrandMatcher::default()));
        let dispatcher = LeadDispatcher::new(router).with_sink(sink.clone());
        (ChatService::new(dialogue(), store, dispatcher), sink)
    }

    fn service() -> (ChatService, Arc<MockLeadSink>) {
        service_with(Arc::new(InMemorySessionStore::new()))
    }

    // ── turns ──────────────────────────────────────────────────

    #[tokio::test]
    async fn first_message_starts_fresh_session() {
        let (svc, _) = service();
        let reply = svc.handle_message("u1", "Иван").await.unwrap();
        assert_eq!(reply.state, DialogueState::DetectIntent);
        assert!(reply.replies[0].contains("Иван"));

        let stored = svc.snapshot("u1").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Иван"));
        assert!(stored.version > 0);
    }

    #[tokio::test]
    async fn confirmed_lead_is_dispatched() {
        let (svc, sink) = service();
        for text in ["Иван", "нужен акт сверки", "89161234567"] {
            svc.handle_message("u1", text).await.unwrap();
        }
        let reply = svc.handle_message("u1", "да").await.unwrap();
        assert_eq!(reply.state, DialogueState::Finished);
        assert_eq!(reply.leads.len(), 1);
        assert_eq!(reply.leads[0].channel.as_deref(), Some("accounting"));

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].lead.phone, "+79161234567");
    }

    #[tokio::test]
    async fn clear_restarts_conversation() {
        let (svc, _) = service();
        svc.handle_message("u1", "Иван").await.unwrap();
        assert!(svc.clear("u1").await.unwrap());
        assert!(svc.snapshot("u1").await.unwrap().is_none());
        assert!(!svc.clear("u1").await.unwrap());

        let reply = svc.handle_message("u1", "Пётр").await.unwrap();
        assert!(reply.replies[0].contains("Пётр"));
    }

    #[tokio::test]
    async fn users_are_independent() {
        let (svc, _) = service();
        let svc = Arc::new(svc);
        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.handle_message("a", "Анна").await.unwrap() }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.handle_message("b", "Борис").await.unwrap() }
        });
        assert!(a.await.unwrap().replies[0].contains("Анна"));
        assert!(b.await.unwrap().replies[0].contains("Борис"));
    }

    #[tokio::test]
    async fn same_user_turns_do_not_lose_updates() {
        let (svc, _) = service();
        let svc = Arc::new(svc);
        svc.handle_message("u1", "Иван").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.handle_message("u1", "ммм").await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(svc.snapshot("u1").await.unwrap().unwrap().name.as_deref(), Some("Иван"));
    }

    #[tokio::test]
    async fn idle_user_locks_are_released() {
        let (svc, _) = service();
        for user in ["a", "b", "c"] {
            svc.handle_message(user, "Иван").await.unwrap();
        }
        svc.clear("a").await.unwrap();
        assert!(svc.locks.lock().await.is_empty());
    }

    /// Slow reads that record how many run at once.
    struct SlowStore {
        inner: InMemorySessionStore,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowStore {
        fn new() -> Self {
            Self {
                inner: InMemorySessionStore::new(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionStore for SlowStore {
        async fn get(&self, user_id: &str) -> StoreResult<Option<Session>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.get(user_id).await
        }

        async fn save(&self, session: &Session) -> StoreResult<u64> {
            self.inner.save(session).await
        }

        async fn delete(&self, user_id: &str) -> StoreResult<bool> {
            self.inner.delete(user_id).await
        }
    }

    #[tokio::test]
    async fn clear_keeps_queued_turns_serialized() {
        let store = Arc::new(SlowStore::new());
        let (svc, _) = service_with(store.clone());
        let svc = Arc::new(svc);

        let first = tokio::spawn({
            let svc = svc.clone();
            async move { svc.handle_message("u1", "Иван").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let clear = tokio::spawn({
            let svc = svc.clone();
            async move { svc.clear("u1").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let queued = tokio::spawn({
            let svc = svc.clone();
            async move { svc.handle_message("u1", "Пётр").await }
        });

        clear.await.unwrap().unwrap();
        let late = svc.handle_message("u1", "ммм").await;

        first.await.unwrap().unwrap();
        queued.await.unwrap().unwrap();
        late.unwrap();
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(svc.locks.lock().await.is_empty());
    }

    // ── store conflicts ────────────────────────────────────────

    /// Clears the session behind the service's back on the first save.
    struct ClearingStore {
        inner: InMemorySessionStore,
        cleared: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for ClearingStore {
        async fn get(&self, user_id: &str) -> StoreResult<Option<Session>> {
            self.inner.get(user_id).await
        }

        async fn save(&self, session: &Session) -> StoreResult<u64> {
            if !self.cleared.swap(true, Ordering::SeqCst) {
                self.inner.delete(&session.user_id).await?;
            }
            self.inner.save(session).await
        }

        async fn delete(&self, user_id: &str) -> StoreResult<bool> {
            self.inner.delete(user_id).await
        }
    }

    #[tokio::test]
    async fn concurrent_clear_replays_turn_on_fresh_session() {
        let inner = InMemorySessionStore::new();
        let mut existing = Session::new("u1");
        existing.name = Some("Иван".into());
        existing.state = DialogueState::DetectIntent;
        inner.save(&existing).await.unwrap();

        let store = Arc::new(ClearingStore {
            inner,
            cleared: AtomicBool::new(false),
        });
        let (svc, _) = service_with(store);

        // Replayed on a fresh session, the message is read as a name.
        let reply = svc.handle_message("u1", "Пётр").await.unwrap();
        assert_eq!(reply.state, DialogueState::DetectIntent);
        assert!(reply.replies[0].contains("Пётр"));
    }

    /// Every save conflicts.
    struct ConflictingStore;

    #[async_trait]
    impl SessionStore for ConflictingStore {
        async fn get(&self, _user_id: &str) -> StoreResult<Option<Session>> {
            Ok(None)
        }

        async fn save(&self, session: &Session) -> StoreResult<u64> {
            Err(StoreError::VersionConflict {
                user_id: session.user_id.clone(),
                expected: session.version,
                found: 99,
            })
        }

        async fn delete(&self, _user_id: &str) -> StoreResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn persistent_conflict_is_reported() {
        let (svc, sink) = service_with(Arc::new(ConflictingStore));
        let err = svc.handle_message("u1", "Иван").await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        assert!(sink.delivered().is_empty());
    }
}
