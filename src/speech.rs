//! Speech synthesis interface.
//!
//! Synthesis itself is an external concern; this module only carries the
//! seam. The speech-enabled chat mode flows through cache keys and
//! response payloads either way, so a deployment can plug a synthesizer
//! in without touching the pipeline.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::SpeechConfig;

/// Synthesized audio for one response.
#[derive(Debug, Clone)]
pub struct SpeechClip {
    /// Base64-encoded audio bytes.
    pub audio: String,
    /// Container format, e.g. `"mp3"`.
    pub format: String,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech for the given text. `None` means synthesis is
    /// unavailable; the response is then served as text only.
    async fn synthesize(&self, text: &str) -> Result<Option<SpeechClip>>;
}

/// No-op synthesizer used when speech is not configured.
pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Option<SpeechClip>> {
        Ok(None)
    }
}

pub fn create_synthesizer(config: &SpeechConfig) -> Box<dyn SpeechSynthesizer> {
    // Only the disabled backend ships; `enabled` is reserved for
    // deployments that wire in an external engine.
    let _ = config.enabled;
    Box::new(DisabledSynthesizer)
}
