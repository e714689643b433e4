//! Session memory.
//!
//! Conversation history is keyed by an opaque caller-supplied session id.
//! The store is bounded two ways: each session keeps at most `max_turns`
//! turns (oldest dropped first), and the store keeps at most
//! `max_sessions` sessions (least recently touched evicted).
//!
//! Guarantees are per-key only: appends to one session are ordered, but
//! there is no cross-session transaction.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::config::SessionConfig;
use crate::models::ChatTurn;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Full timeline of a session, oldest first. Unknown id → empty.
    async fn history(&self, session_id: &str) -> Vec<ChatTurn>;

    /// Append turns to a session's timeline, creating it if needed.
    async fn append(&self, session_id: &str, turns: Vec<ChatTurn>);

    /// Remove a session entirely.
    async fn delete(&self, session_id: &str);

    /// Number of live sessions.
    async fn len(&self) -> usize;
}

struct SessionEntry {
    turns: Vec<ChatTurn>,
    /// Monotonic touch counter for LRU eviction.
    last_used: u64,
}

/// In-process session store with bounded eviction.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    clock: RwLock<u64>,
    max_turns: usize,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock: RwLock::new(0),
            max_turns: config.max_turns,
            max_sessions: config.max_sessions,
        }
    }

    fn tick(&self) -> u64 {
        let mut clock = self.clock.write().unwrap();
        *clock += 1;
        *clock
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn history(&self, session_id: &str) -> Vec<ChatTurn> {
        let now = self.tick();
        let mut sessions = self.sessions.write().unwrap();
        match sessions.get_mut(session_id) {
            Some(entry) => {
                entry.last_used = now;
                entry.turns.clone()
            }
            None => Vec::new(),
        }
    }

    async fn append(&self, session_id: &str, turns: Vec<ChatTurn>) {
        let now = self.tick();
        let mut sessions = self.sessions.write().unwrap();

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                turns: Vec::new(),
                last_used: now,
            });
        entry.last_used = now;
        entry.turns.extend(turns);

        // Drop oldest turns beyond the per-session bound.
        if entry.turns.len() > self.max_turns {
            let excess = entry.turns.len() - self.max_turns;
            entry.turns.drain(..excess);
        }

        // Evict least-recently-used sessions beyond the store bound.
        while sessions.len() > self.max_sessions {
            let victim = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }

    async fn delete(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(session_id);
    }

    async fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap();
        sessions.len()
    }
}
