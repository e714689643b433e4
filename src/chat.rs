//! Chat service facade.
//!
//! Ties the per-turn control flow together: normalize the incoming
//! message, consult the reliability cache, run the agent, normalize the
//! output (plus the speech variant when requested), store the payload,
//! return it. A cache hit short-circuits before the agent — no model or
//! tool invocation happens, and the returned payload is byte-identical
//! to the original computation.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::cache::{PendingResponse, ResponseCache};
use crate::config::Config;
use crate::models::ResponsePayload;
use crate::normalize::{normalize_for_speech, normalize_input, normalize_output};
use crate::speech::SpeechSynthesizer;

pub struct ChatService {
    agent: Agent,
    cache: ResponseCache,
    synthesizer: Box<dyn SpeechSynthesizer>,
}

impl ChatService {
    pub fn new(agent: Agent, synthesizer: Box<dyn SpeechSynthesizer>, config: &Config) -> Self {
        Self {
            agent,
            cache: ResponseCache::new(Duration::from_secs(config.cache.ttl_secs)),
            synthesizer,
        }
    }

    /// Handle one user message for a session.
    pub async fn respond(
        &self,
        message: &str,
        session_id: &str,
        with_speech: bool,
    ) -> Result<ResponsePayload> {
        let message = normalize_input(message);
        let key = ResponseCache::compute_key(&message, with_speech);

        if let Some(payload) = self.cache.get(session_id, &key) {
            info!(session_id, "serving cached response");
            return Ok(payload);
        }

        let raw = self.agent.respond(&message, session_id).await?;
        let text = normalize_output(&raw);

        let mut payload = ResponsePayload::text_only(text);
        if with_speech {
            let speech_text = normalize_for_speech(&raw);
            match self.synthesizer.synthesize(&speech_text).await {
                Ok(Some(clip)) => {
                    payload.audio = Some(clip.audio);
                    payload.audio_format = Some(clip.format);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "speech synthesis failed, serving text only"),
            }
        }

        self.cache.put(session_id, &key, payload.clone());
        Ok(payload)
    }

    /// Unexpired cached responses for a session, for client recovery.
    pub fn pending_responses(&self, session_id: &str) -> Vec<PendingResponse> {
        self.cache.list_pending(session_id)
    }

    /// One synthetic model round at startup; see [`Agent::warm_up`].
    pub async fn warm_up(&self) {
        self.agent.warm_up().await;
    }
}
