// ABOUTME: Session collaborator that subagent announcements are written into.
// ABOUTME: SessionStore trait plus an in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One message stored in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
}

/// A conversation session addressed by `"{channel}:{chat_id}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    pub messages: Vec<SessionMessage>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            messages: Vec::new(),
        }
    }

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.messages.push(SessionMessage {
            role: role.into(),
            content: content.into(),
        });
    }
}

/// Trait for loading and saving sessions.
///
/// Implement this trait to route announcements into a real session backend
/// (file system, database, chat gateway).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for `key`, creating an empty one if none exists.
    async fn get_or_create(&self, key: &str) -> Result<Session, anyhow::Error>;

    /// Persist a session, replacing any previous version.
    async fn save(&self, session: &Session) -> Result<(), anyhow::Error>;
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store wrapped in Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Read a saved session.
    pub async fn get(&self, key: &str) -> Option<Session> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Keys of every saved session.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, key: &str) -> Result<Session, anyhow::Error> {
        Ok(self
            .get(key)
            .await
            .unwrap_or_else(|| Session::new(key)))
    }

    async fn save(&self, session: &Session) -> Result<(), anyhow::Error> {
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session.clone());
        Ok(())
    }
}
