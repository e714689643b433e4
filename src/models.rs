//! Core data models used throughout docent.
//!
//! These types represent the indexed document chunks, conversation turns,
//! and response payloads that flow through the retrieval and chat pipeline.

use serde::{Deserialize, Serialize};

/// Payload attached to one indexed point in the vector store.
///
/// Every chunk belongs to exactly one source document and one person
/// identifier. The payload is written by the external ingestion job and
/// read verbatim by the retrieval tools. Wire keys match the deployed
/// collection schema, which is in Portuguese.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Stable identifier of the source person.
    #[serde(rename = "id_professor", default)]
    pub person_id: String,
    /// Display name of the professor.
    #[serde(rename = "nome_professor", default)]
    pub professor: String,
    /// Organizational unit (department).
    #[serde(rename = "departamento", default)]
    pub department: String,
    /// Document type: `"article"` or `"profile"`.
    #[serde(rename = "tipo", default)]
    pub doc_type: String,
    /// Free text of the chunk.
    #[serde(default)]
    pub text: String,
    /// Title of the source document, when known.
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    /// Publication year, when known.
    #[serde(rename = "ano", default)]
    pub year: Option<i32>,
    /// Path of the source document this chunk was cut from.
    #[serde(rename = "arquivo_origem", default)]
    pub source_path: String,
}

/// A payload plus its similarity score, as returned by vector search.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub payload: ChunkPayload,
    pub score: f32,
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One turn in a session's timeline.
///
/// Assistant turns that requested tools carry the requested calls so the
/// model sees its own tool use on later rounds; tool turns carry the call
/// id they answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<RequestedCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_with_calls(text: impl Into<String>, calls: Vec<RequestedCall>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_calls: calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
            tool_name: Some(name.into()),
        }
    }
}

/// A tool invocation requested by the language model.
///
/// `arguments` is the raw JSON string exactly as the model produced it;
/// parsing happens in [`crate::tools::ToolCall::parse`] so a malformed
/// request degrades to a tool-level error instead of a turn failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The exact response returned to the client for one turn.
///
/// Also the unit stored in the reliability cache — a cache hit returns
/// this struct byte-identical to the original computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Normalized answer text.
    pub text: String,
    /// Base64 audio, present only when speech synthesis ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Audio container format (e.g. `"mp3"`), set alongside `audio`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<String>,
}

impl ResponsePayload {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            audio_format: None,
        }
    }
}
