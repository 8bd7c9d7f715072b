//! Session Store Port - Interface for persisting per-user sessions.
//!
//! The orchestrator only sees this trait, so the in-memory store can be
//! replaced by a persistent backend without touching orchestration logic.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::session::Session;

/// Errors that can occur during session storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session not found for user: {0}")]
    NotFound(UserId),

    #[error("Failed to serialize session: {0}")]
    Serialization(String),

    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Port for keyed session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for a user, if one exists.
    async fn get(&self, user_id: &UserId) -> Result<Option<Session>, SessionStoreError>;

    /// Insert or replace the session for its user.
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Remove a user's session. Returns true if one existed.
    async fn delete(&self, user_id: &UserId) -> Result<bool, SessionStoreError>;

    /// Evict sessions with no activity within `inactive_for`.
    ///
    /// # Returns
    /// The number of sessions removed
    async fn sweep(&self, inactive_for: Duration) -> Result<usize, SessionStoreError>;

    /// Number of stored sessions.
    async fn count(&self) -> Result<usize, SessionStoreError>;
}
