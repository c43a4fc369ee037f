//! Session persistence seam.
//!
//! Durable storage lives outside this engine; the trait is the boundary.
//! The in-memory implementation covers tests, demos, and single-process
//! interactive use.

use async_trait::async_trait;
use colloquy_core::turn::{SessionId, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::session::Session;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Where sessions live between requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session.
    async fn upsert(&self, session: Session);

    /// Fetch a session snapshot by id.
    async fn get(&self, id: &SessionId) -> Option<Session>;

    /// Append a turn to a stored session.
    async fn append(&self, id: &SessionId, turn: Turn) -> Result<(), StoreError>;

    /// Windowed read over a stored session's active turns.
    async fn windowed(&self, id: &SessionId, budget: usize) -> Result<Vec<Turn>, StoreError>;

    /// List (id, title) pairs of all stored sessions.
    async fn list(&self) -> Vec<(SessionId, Option<String>)>;
}

/// A session store that keeps everything in process memory.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn upsert(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
    }

    async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn append(&self, id: &SessionId, turn: Turn) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        session.append(turn);
        Ok(())
    }

    async fn windowed(&self, id: &SessionId, budget: usize) -> Result<Vec<Turn>, StoreError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        Ok(session.windowed(budget))
    }

    async fn list(&self) -> Vec<(SessionId, Option<String>)> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| (s.id.clone(), s.title.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_and_get() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new();
        session.append(Turn::user("hello"));
        let id = session.id.clone();

        store.upsert(session).await;
        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.active_turns().len(), 1);
    }

    #[tokio::test]
    async fn append_through_store() {
        let store = InMemorySessionStore::new();
        let session = Session::new();
        let id = session.id.clone();
        store.upsert(session).await;

        store.append(&id, Turn::user("q")).await.unwrap();
        store.append(&id, Turn::assistant("a")).await.unwrap();

        let windowed = store.windowed(&id, 10_000).await.unwrap();
        assert_eq!(windowed.len(), 2);
    }

    #[tokio::test]
    async fn missing_session_is_an_error() {
        let store = InMemorySessionStore::new();
        let id = SessionId::new();
        let err = store.append(&id, Turn::user("q")).await.unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn list_reports_titles() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new();
        session.append(Turn::user("Name this session"));
        store.upsert(session).await;

        let listing = store.list().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].1.as_deref(), Some("Name this session"));
    }
}
