//! # Session Module
//!
//! Ephemeral per-upload session state for the conversational layer.
//!
//! This module handles:
//! - Generating session identifiers (UUID v4)
//! - Holding the metrics and residual signals of one analysed flight
//! - Recording the append-only chat history of that session
//!
//! Sessions live in memory only. Access is serialized through a tokio
//! `RwLock`, so concurrent uploads and chat turns never interleave on the
//! same session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{AnalystError, Result};
use crate::telemetry::filter::FilteredMap;
use crate::telemetry::metrics::MetricsMap;
use crate::telemetry::FlightAnalysis;

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| AnalystError::SessionNotFound(s.to_string()))
    }
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

/// Everything kept for one uploaded flight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub created_at: DateTime<Utc>,
    /// Signals as extracted, before metric derivation
    pub filtered: FilteredMap,
    pub metrics: MetricsMap,
    /// Signals left after metric derivation
    pub residual: FilteredMap,
    pub history: Vec<ChatTurn>,
}

impl SessionState {
    /// Start a session from a finished analysis
    pub fn from_analysis(analysis: FlightAnalysis) -> Self {
        Self {
            created_at: Utc::now(),
            filtered: analysis.filtered,
            metrics: analysis.metrics,
            residual: analysis.residual,
            history: Vec::new(),
        }
    }
}

/// Storage for session state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session and return its identifier
    async fn create(&self, state: SessionState) -> SessionId;

    /// Snapshot of a session, `None` if unknown
    async fn get(&self, id: &SessionId) -> Option<SessionState>;

    /// Append a chat turn to an existing session
    async fn append_turn(&self, id: &SessionId, turn: ChatTurn) -> Result<()>;

    /// Number of live sessions
    async fn count(&self) -> usize;
}

/// Live sessions plus their creation order
#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<SessionId, SessionState>,
    /// Ids in insertion order, oldest first
    order: VecDeque<SessionId>,
}

/// In-memory session store
///
/// Bounded: once `max_sessions` is reached the earliest-created session is
/// evicted. Each session keeps at most `max_history_turns` turns, dropping
/// the oldest.
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<Sessions>>,
    max_sessions: usize,
    max_history_turns: usize,
}

impl InMemorySessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Sessions::default())),
            max_sessions: config.max_sessions.max(1),
            max_history_turns: config.max_history_turns.max(1),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, state: SessionState) -> SessionId {
        let id = SessionId::new();
        let mut guard = self.sessions.write().await;

        while guard.entries.len() >= self.max_sessions {
            let Some(oldest) = guard.order.pop_front() else {
                break;
            };
            warn!("Session store full ({}), evicting {}", self.max_sessions, oldest);
            guard.entries.remove(&oldest);
        }

        guard.entries.insert(id, state);
        guard.order.push_back(id);
        debug!("Created session {} ({} live)", id, guard.entries.len());
        id
    }

    async fn get(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions.read().await.entries.get(id).cloned()
    }

    async fn append_turn(&self, id: &SessionId, turn: ChatTurn) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let session = guard
            .entries
            .get_mut(id)
            .ok_or_else(|| AnalystError::SessionNotFound(id.to_string()))?;

        session.history.push(turn);
        if session.history.len() > self.max_history_turns {
            let excess = session.history.len() - self.max_history_turns;
            session.history.drain(..excess);
        }
        Ok(())
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config(max_sessions: usize, max_history_turns: usize) -> SessionConfig {
        SessionConfig {
            max_sessions,
            max_history_turns,
        }
    }

    fn empty_state() -> SessionState {
        SessionState {
            created_at: Utc::now(),
            filtered: FilteredMap::new(),
            metrics: MetricsMap::default(),
            residual: FilteredMap::new(),
            history: Vec::new(),
        }
    }

    fn turn(n: usize) -> ChatTurn {
        ChatTurn {
            user: format!("question {}", n),
            assistant: format!("answer {}", n),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemorySessionStore::new(&config(4, 4));
        let id = store.create(empty_state()).await;

        let session = store.get(&id).await.unwrap();
        assert!(session.history.is_empty());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = InMemorySessionStore::new(&config(4, 4));
        assert!(store.get(&SessionId::new()).await.is_none());

        let result = store.append_turn(&SessionId::new(), turn(0)).await;
        assert!(matches!(result, Err(AnalystError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_history_is_ordered() {
        let store = InMemorySessionStore::new(&config(4, 10));
        let id = store.create(empty_state()).await;

        for n in 0..3 {
            store.append_turn(&id, turn(n)).await.unwrap();
        }

        let history = store.get(&id).await.unwrap().history;
        assert_eq!(history, vec![turn(0), turn(1), turn(2)]);
    }

    #[tokio::test]
    async fn test_history_trimmed_from_front() {
        let store = InMemorySessionStore::new(&config(4, 2));
        let id = store.create(empty_state()).await;

        for n in 0..5 {
            store.append_turn(&id, turn(n)).await.unwrap();
        }

        let history = store.get(&id).await.unwrap().history;
        assert_eq!(history, vec![turn(3), turn(4)]);
    }

    #[tokio::test]
    async fn test_oldest_session_evicted() {
        let store = InMemorySessionStore::new(&config(2, 4));

        let first_id = store.create(empty_state()).await;
        let second_id = store.create(empty_state()).await;
        let third_id = store.create(empty_state()).await;

        assert_eq!(store.count().await, 2);
        assert!(store.get(&first_id).await.is_none());
        assert!(store.get(&second_id).await.is_some());
        assert!(store.get(&third_id).await.is_some());
    }

    #[tokio::test]
    async fn test_eviction_follows_insertion_not_timestamp() {
        let store = InMemorySessionStore::new(&config(2, 4));

        // Caller-supplied timestamps run backwards relative to insertion.
        let mut first = empty_state();
        first.created_at = Utc::now() + Duration::seconds(60);
        let first_id = store.create(first).await;

        let mut second = empty_state();
        second.created_at = Utc::now() - Duration::seconds(60);
        let second_id = store.create(second).await;

        let third_id = store.create(empty_state()).await;

        assert!(store.get(&first_id).await.is_none());
        assert!(store.get(&second_id).await.is_some());
        assert!(store.get(&third_id).await.is_some());
    }

    #[tokio::test]
    async fn test_eviction_with_identical_timestamps() {
        let store = InMemorySessionStore::new(&config(3, 4));
        let created_at = Utc::now();

        let mut ids = Vec::new();
        for _ in 0..6 {
            let mut state = empty_state();
            state.created_at = created_at;
            ids.push(store.create(state).await);
        }

        assert_eq!(store.count().await, 3);
        for evicted in &ids[..3] {
            assert!(store.get(evicted).await.is_none());
        }
        for live in &ids[3..] {
            assert!(store.get(live).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let store = InMemorySessionStore::new(&config(4, 100));
        let id = store.create(empty_state()).await;

        let handles: Vec<_> = (0..20)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.append_turn(&id, turn(n)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&id).await.unwrap().history.len(), 20);
    }

    #[test]
    fn test_session_id_round_trip_through_string() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        let result = "not-a-session".parse::<SessionId>();
        assert!(matches!(result, Err(AnalystError::SessionNotFound(_))));
    }
}
