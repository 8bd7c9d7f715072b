//! Session manager - loads, mutates and persists sessions for the orchestrator.
//!
//! Store failures never fail a request: a failed load yields a fresh session
//! and a failed save is logged. Messages from one user are serialized through
//! a per-user async lock; different users never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::domain::foundation::UserId;
use crate::domain::session::{
    compress_context, ContextMessage, ContextSummarizer, HeuristicSummarizer, Session,
};
use crate::ports::{ResultCache, SessionStore};

type UserLocks = HashMap<UserId, Arc<tokio::sync::Mutex<()>>>;

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    summarizer: Arc<dyn ContextSummarizer>,
    max_history_length: usize,
    ttl: Duration,
    locks: Mutex<UserLocks>,
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub locks: usize,
    pub cache_entries: usize,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            summarizer: Arc::new(HeuristicSummarizer::default()),
            max_history_length: 50,
            ttl: Duration::from_secs(24 * 60 * 60),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Applies history and TTL limits from configuration.
    pub fn from_config(config: &SessionConfig, store: Arc<dyn SessionStore>) -> Self {
        Self::new(store)
            .with_max_history_length(config.max_history_length)
            .with_ttl(config.ttl())
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn ContextSummarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_max_history_length(mut self, max_history_length: usize) -> Self {
        self.max_history_length = max_history_length;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn max_history_length(&self) -> usize {
        self.max_history_length
    }

    /// Waits for exclusive access to a user's session.
    ///
    /// Hold the guard for the whole load-mutate-persist cycle.
    pub async fn lock_user(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks();
            locks.entry(user_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Loads the user's session, creating one if none exists or the store
    /// cannot be read.
    pub async fn load_or_create(&self, user_id: &UserId) -> Session {
        match self.store.get(user_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!(user_id = %user_id, "Creating new session");
                Session::new(user_id.clone())
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Session load failed, starting fresh session");
                Session::new(user_id.clone())
            }
        }
    }

    /// Loads the user's session without creating one. A store failure reads
    /// as no session.
    pub async fn find(&self, user_id: &UserId) -> Option<Session> {
        match self.store.get(user_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Session load failed");
                None
            }
        }
    }

    /// Deletes the user's session. Returns false if there was none or the
    /// store failed.
    pub async fn clear(&self, user_id: &UserId) -> bool {
        match self.store.delete(user_id).await {
            Ok(removed) => {
                if removed {
                    info!(user_id = %user_id, "Session cleared");
                }
                removed
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Session delete failed");
                false
            }
        }
    }

    /// Appends a message and compresses the context if it grew too long.
    pub async fn append_message(&self, session: &mut Session, message: ContextMessage) {
        session.push_message(message);
        let compressed = compress_context(
            session.context_mut(),
            self.max_history_length,
            self.summarizer.as_ref(),
        )
        .await;
        if compressed {
            debug!(
                user_id = %session.user_id(),
                remaining = session.context().len(),
                "Compressed conversation context"
            );
        }
    }

    /// Saves the session. Returns false if the store rejected it.
    pub async fn persist(&self, session: &Session) -> bool {
        match self.store.save(session).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %session.user_id(), error = %e, "Session save failed");
                false
            }
        }
    }

    pub async fn active_sessions(&self) -> usize {
        match self.store.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Session count failed");
                0
            }
        }
    }

    /// Evicts idle sessions, unused user locks and expired cache entries.
    pub async fn sweep(&self, cache: Option<&dyn ResultCache>) -> SweepReport {
        let sessions = match self.store.sweep(self.ttl).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Session sweep failed");
                0
            }
        };

        let locks = {
            let mut locks = self.user_locks();
            let before = locks.len();
            // the map holds the only reference to an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            before - locks.len()
        };

        let cache_entries = match cache {
            Some(cache) => cache.purge_expired().await,
            None => 0,
        };

        SweepReport {
            sessions,
            locks,
            cache_entries,
        }
    }

    /// Runs [`Self::sweep`] every `interval` until the task is aborted.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cache: Option<Arc<dyn ResultCache>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = self.sweep(cache.as_deref()).await;
                if report != SweepReport::default() {
                    info!(
                        sessions = report.sessions,
                        locks = report.locks,
                        cache_entries = report.cache_entries,
                        "Swept idle state"
                    );
                }
            }
        })
    }

    fn user_locks(&self) -> MutexGuard<'_, UserLocks> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryResultCache;
    use crate::adapters::session::InMemorySessionStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::session::{ContextRole, SUMMARY_PREFIX};
    use crate::ports::SessionStoreError;
    use async_trait::async_trait;
    use serde_json::json;

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get(&self, _: &UserId) -> Result<Option<Session>, SessionStoreError> {
            Err(SessionStoreError::Backend("connection refused".into()))
        }
        async fn save(&self, _: &Session) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Backend("connection refused".into()))
        }
        async fn delete(&self, _: &UserId) -> Result<bool, SessionStoreError> {
            Err(SessionStoreError::Backend("connection refused".into()))
        }
        async fn sweep(&self, _: Duration) -> Result<usize, SessionStoreError> {
            Err(SessionStoreError::Backend("connection refused".into()))
        }
        async fn count(&self) -> Result<usize, SessionStoreError> {
            Err(SessionStoreError::Backend("connection refused".into()))
        }
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[tokio::test]
    async fn load_or_create_returns_stored_session() {
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(Arc::new(store.clone()));

        let mut session = manager.load_or_create(&alice()).await;
        session.set_preference("currency", json!("USD"));
        assert!(manager.persist(&session).await);

        let loaded = manager.load_or_create(&alice()).await;
        assert_eq!(loaded.id(), session.id());
        assert_eq!(loaded.preference("currency"), Some(&json!("USD")));
    }

    #[tokio::test]
    async fn store_failures_degrade_to_fresh_session() {
        let manager = SessionManager::new(Arc::new(BrokenStore));

        let session = manager.load_or_create(&alice()).await;

        assert_eq!(session.user_id(), &alice());
        assert!(session.context().is_empty());
        assert!(!manager.persist(&session).await);
        assert_eq!(manager.active_sessions().await, 0);
        assert_eq!(manager.sweep(None).await.sessions, 0);
    }

    #[tokio::test]
    async fn find_never_creates_and_clear_removes() {
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(Arc::new(store.clone()));
        assert!(manager.find(&alice()).await.is_none());

        manager.persist(&Session::new(alice())).await;
        assert!(manager.find(&alice()).await.is_some());

        assert!(manager.clear(&alice()).await);
        assert!(manager.find(&alice()).await.is_none());
        assert!(!manager.clear(&alice()).await);
    }

    #[tokio::test]
    async fn clear_reports_false_when_store_fails() {
        let manager = SessionManager::new(Arc::new(BrokenStore));
        assert!(manager.find(&alice()).await.is_none());
        assert!(!manager.clear(&alice()).await);
    }

    #[tokio::test]
    async fn append_message_compresses_past_limit() {
        let manager =
            SessionManager::new(Arc::new(InMemorySessionStore::new())).with_max_history_length(50);
        let mut session = Session::new(alice());

        for i in 0..60 {
            manager
                .append_message(&mut session, ContextMessage::new(ContextRole::User, format!("m{}", i)))
                .await;
        }

        let messages = session.context().messages();
        assert!(messages.len() <= 50);
        assert_eq!(messages[0].role(), ContextRole::System);
        assert!(messages[0].content().starts_with(SUMMARY_PREFIX));
        assert_eq!(messages.last().unwrap().content(), "m59");
        assert_eq!(session.message_count(), 60);
    }

    #[tokio::test]
    async fn lock_user_serializes_same_user() {
        let manager = Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())));
        let guard = manager.lock_user(&alice()).await;

        let contender = manager.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.lock_user(&alice()).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // other users are not blocked
        let bob = UserId::new("bob").unwrap();
        let _bob_guard = manager.lock_user(&bob).await;

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn sweep_drops_idle_locks_and_expired_cache() {
        let manager = SessionManager::new(Arc::new(InMemorySessionStore::new()));
        drop(manager.lock_user(&alice()).await);
        let held = manager.lock_user(&UserId::new("bob").unwrap()).await;

        let cache = InMemoryResultCache::new();
        cache
            .put("k".into(), json!(1), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = manager.sweep(Some(&cache)).await;

        assert_eq!(report.locks, 1);
        assert_eq!(report.cache_entries, 1);
        drop(held);
    }

    #[tokio::test]
    async fn sweep_evicts_inactive_sessions() {
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(Arc::new(store.clone())).with_ttl(Duration::from_secs(60));

        let mut stale = Session::new(alice());
        stale.set_last_activity(Timestamp::now().minus(Duration::from_secs(3600)));
        manager.persist(&stale).await;
        manager.persist(&Session::new(UserId::new("bob").unwrap())).await;

        let report = manager.sweep(None).await;

        assert_eq!(report.sessions, 1);
        assert_eq!(manager.active_sessions().await, 1);
    }
}
