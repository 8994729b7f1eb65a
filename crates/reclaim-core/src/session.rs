//! Per-user session store
//!
//! Tracks which input each user is currently expected to send.
//! Transport-agnostic: keyed by the chat platform's stable user id.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Conversation state of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    /// Nothing pending (session absent)
    #[default]
    Idle,
    /// Next free text is a single target
    AwaitingSingleTarget,
    /// Next free text is a newline-separated target list
    AwaitingBulkTargets,
}

/// Stored session value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSession {
    /// Current state (never `Idle`; idle sessions are removed)
    pub state: ConversationState,
    /// When the state was entered
    pub entered_at: Instant,
}

/// Session storage keyed by user id
///
/// Implementations must keep at most one state per user; storing
/// [`ConversationState::Idle`] deletes the entry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, if any
    async fn get(&self, user_id: i64) -> Option<UserSession>;

    /// Move the user into `state`
    async fn set(&self, user_id: i64, state: ConversationState);

    /// Drop any pending session
    async fn clear(&self, user_id: i64);

    /// Current state, `Idle` when no session exists
    async fn state(&self, user_id: i64) -> ConversationState {
        self.get(user_id)
            .await
            .map_or(ConversationState::Idle, |session| session.state)
    }
}

/// Process-lifetime session store guarded by an async lock
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<i64, UserSession>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a pending session
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no user has a pending session
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: i64) -> Option<UserSession> {
        let sessions = self.sessions.read().await;
        sessions.get(&user_id).copied()
    }

    async fn set(&self, user_id: i64, state: ConversationState) {
        if state == ConversationState::Idle {
            self.clear(user_id).await;
            return;
        }

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            user_id,
            UserSession {
                state,
                entered_at: Instant::now(),
            },
        );
        debug!(user_id, ?state, "Session state updated");
    }

    async fn clear(&self, user_id: i64) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.remove(&user_id) {
            debug!(
                user_id,
                state = ?session.state,
                age_ms = session.entered_at.elapsed().as_millis(),
                "Session cleared"
            );
        }
    }
}
