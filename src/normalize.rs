//! Text normalization for user input and model output.
//!
//! Two independent transforms sit at the edges of the chat pipeline:
//!
//! - **Input**: inline thinking-mode toggles (`/think`, `/no_think`) are
//!   control directives for the model runtime, not content. They are
//!   stripped before the message is used as a cache-key input or handed
//!   to the agent, so cosmetic directive differences never cause cache
//!   misses for the same semantic request.
//! - **Output**: reasoning models emit `<think>…</think>` blocks that must
//!   never reach the user, on screen or spoken aloud. Removal also tidies
//!   the whitespace the excision leaves behind.

use regex::Regex;
use std::sync::LazyLock;

static THINK_TOGGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|\s)/(no_?think|think)\b").unwrap());

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());

static UNCLOSED_THINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<think>.*$").unwrap());

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

static ANY_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_`#]+").unwrap());

/// Strip recognized control directives from a raw user message.
///
/// Idempotent: a message without directives is returned unchanged
/// (modulo surrounding whitespace, which is trimmed).
pub fn normalize_input(message: &str) -> String {
    // Replacing a mid-message directive leaves its surrounding whitespace
    // behind; collapse it so the result (and the cache key derived from
    // it) matches the directive-free message exactly.
    let stripped = THINK_TOGGLE.replace_all(message, " ");
    HORIZONTAL_WS.replace_all(&stripped, " ").trim().to_string()
}

/// Clean a raw model answer for display.
///
/// Removes `<think>` blocks (an unclosed block swallows the rest of the
/// text), collapses runs of spaces and tabs to a single space while
/// preserving line structure, and collapses two-or-more consecutive
/// blank lines to one.
pub fn normalize_output(raw: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(raw, "");
    let stripped = UNCLOSED_THINK.replace(&stripped, "");
    let collapsed = HORIZONTAL_WS.replace_all(&stripped, " ");
    // Drop the spaces HORIZONTAL_WS leaves on otherwise-empty lines so
    // the blank-run collapse sees them as consecutive newlines.
    let tidy: String = collapsed
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS.replace_all(&tidy, "\n\n").trim().to_string()
}

/// Clean a raw model answer for speech synthesis.
///
/// Spoken output has no use for layout or emphasis markup: on top of the
/// display normalization, emphasis punctuation is removed and all
/// whitespace (newlines included) collapses to single spaces.
pub fn normalize_for_speech(raw: &str) -> String {
    let display = normalize_output(raw);
    let plain = EMPHASIS.replace_all(&display, "");
    ANY_WS.replace_all(&plain, " ").trim().to_string()
}
