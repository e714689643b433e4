//! Response reliability cache.
//!
//! After the agent produces an answer, the full response payload is kept
//! for a short TTL keyed by a fingerprint of the normalized message. A
//! client whose connection dropped mid-response re-sends the same message
//! and gets the stored payload back without re-invoking the model, or
//! polls `pending_responses` for everything still live in its session.
//!
//! The fingerprint is SHA-256 over `"{message}_{with_speech}"`, matching
//! the hash the web client computes on its side.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::ResponsePayload;

struct CacheEntry {
    payload: ResponsePayload,
    stored_at: Instant,
    /// Unix timestamp exposed to clients polling for pending responses.
    stored_at_epoch: i64,
}

/// One unexpired entry, as reported by [`ResponseCache::list_pending`].
#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    pub message_hash: String,
    pub response: ResponsePayload,
    pub timestamp: i64,
}

/// Short-TTL per-session store of finished responses.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Fingerprint of a normalized message plus the speech-mode flag.
    pub fn compute_key(message: &str, with_speech: bool) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}", message, with_speech).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up an unexpired entry. A stale entry found here is removed.
    pub fn get(&self, session_id: &str, key: &str) -> Option<ResponsePayload> {
        let mut entries = self.entries.write().unwrap();
        let session = entries.get_mut(session_id)?;
        match session.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.payload.clone()),
            Some(_) => {
                session.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a payload, overwriting any previous entry under the key,
    /// then sweep expired entries across all sessions.
    pub fn put(&self, session_id: &str, key: &str, payload: ResponsePayload) {
        {
            let mut entries = self.entries.write().unwrap();
            entries.entry(session_id.to_string()).or_default().insert(
                key.to_string(),
                CacheEntry {
                    payload,
                    stored_at: Instant::now(),
                    stored_at_epoch: chrono::Utc::now().timestamp(),
                },
            );
        }
        self.sweep();
    }

    /// Remove every expired entry; sessions left empty are dropped.
    pub fn sweep(&self) {
        let mut entries = self.entries.write().unwrap();
        for session in entries.values_mut() {
            session.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        }
        entries.retain(|_, session| !session.is_empty());
    }

    /// Every unexpired payload for one session, annotated with its key
    /// and store timestamp.
    pub fn list_pending(&self, session_id: &str) -> Vec<PendingResponse> {
        let entries = self.entries.read().unwrap();
        let Some(session) = entries.get(session_id) else {
            return Vec::new();
        };
        session
            .iter()
            .filter(|(_, entry)| entry.stored_at.elapsed() < self.ttl)
            .map(|(key, entry)| PendingResponse {
                message_hash: key.clone(),
                response: entry.payload.clone(),
                timestamp: entry.stored_at_epoch,
            })
            .collect()
    }
}
