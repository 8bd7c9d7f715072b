//! In-Memory Session Store Adapter
//!
//! Keeps sessions in a process-local map keyed by user. Sessions are lost on
//! restart; the `SessionStore` port allows swapping in a persistent backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::session::Session;
use crate::ports::{SessionStore, SessionStoreError};

/// In-memory storage for user sessions
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<UserId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored sessions (useful for tests)
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(session.user_id().clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.write().await.remove(user_id).is_some())
    }

    async fn sweep(&self, inactive_for: Duration) -> Result<usize, SessionStoreError> {
        let cutoff = Timestamp::now().minus(inactive_for);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_inactive_since(&cutoff));
        Ok(before - sessions.len())
    }

    async fn count(&self) -> Result<usize, SessionStoreError> {
        Ok(self.sessions.read().await.len())
    }
}
