//! Language model interface.
//!
//! The [`LanguageModel`] trait is the seam between the agent loop and
//! the model backend: one call with the system instruction, the running
//! turn history, and the tool catalogue; one [`ChatOutcome`] back —
//! either a final text answer or a batch of requested tool invocations.
//!
//! [`OpenAiCompatModel`] is the single concrete backend. It speaks the
//! OpenAI chat-completions wire format with function-calling `tools`,
//! which both OpenAI and Ollama's `/v1/chat/completions` endpoint accept.
//!
//! Failures here are *not* absorbed: a model that cannot be reached or
//! answers malformed JSON fails the turn, and the transport layer turns
//! that into a 5xx.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::{ChatTurn, RequestedCall, Role};

/// What the model decided to do with a turn.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    /// A final answer; the turn is complete.
    Final(String),
    /// The model wants tool results before answering.
    ToolCalls(Vec<RequestedCall>),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(
        &self,
        system: &str,
        history: &[ChatTurn],
        tools: &[serde_json::Value],
    ) -> Result<ChatOutcome>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiCompatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = match config.api_key_env.as_deref() {
            Some(env) if !env.is_empty() => Some(
                std::env::var(env)
                    .with_context(|| format!("environment variable '{}' not set", env))?,
            ),
            _ => None,
        };

        let endpoint = match config.provider.as_str() {
            "openai" => {
                if api_key.is_none() {
                    bail!("llm.api_key_env is required for the openai provider");
                }
                config
                    .url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com".to_string())
            }
            "ollama" => config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            other => bail!("Unknown llm provider: {}", other),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn build_messages(system: &str, history: &[ChatTurn]) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(serde_json::json!({ "role": "system", "content": system }));

        for turn in history {
            match turn.role {
                Role::User => {
                    messages.push(serde_json::json!({ "role": "user", "content": turn.text }));
                }
                Role::Assistant => {
                    let mut msg = serde_json::json!({
                        "role": "assistant",
                        "content": turn.text,
                    });
                    if !turn.tool_calls.is_empty() {
                        msg["tool_calls"] = turn
                            .tool_calls
                            .iter()
                            .map(|tc| {
                                serde_json::json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments,
                                    }
                                })
                            })
                            .collect();
                    }
                    messages.push(msg);
                }
                Role::Tool => {
                    messages.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": turn.tool_call_id.as_deref().unwrap_or(""),
                        "content": turn.text,
                    }));
                }
            }
        }
        messages
    }

    fn parse_outcome(json: &serde_json::Value) -> Result<ChatOutcome> {
        let message = json
            .pointer("/choices/0/message")
            .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message"))?;

        if let Some(calls) = message.get("tool_calls").and_then(|tc| tc.as_array()) {
            if !calls.is_empty() {
                let mut requested = Vec::with_capacity(calls.len());
                for (i, call) in calls.iter().enumerate() {
                    let id = call
                        .get("id")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("call_{}", i));
                    let name = call
                        .pointer("/function/name")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| anyhow::anyhow!("Invalid tool call: missing function.name"))?
                        .to_string();
                    let arguments = call
                        .pointer("/function/arguments")
                        .and_then(|v| v.as_str())
                        .unwrap_or("{}")
                        .to_string();
                    requested.push(RequestedCall {
                        id,
                        name,
                        arguments,
                    });
                }
                return Ok(ChatOutcome::ToolCalls(requested));
            }
        }

        // No tool calls and no textual content is a malformed response,
        // not an empty answer.
        let Some(content) = message.get("content").and_then(|c| c.as_str()) else {
            bail!("Invalid chat response: message has neither content nor tool_calls");
        };
        Ok(ChatOutcome::Final(content.to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    async fn chat(
        &self,
        system: &str,
        history: &[ChatTurn],
        tools: &[serde_json::Value],
    ) -> Result<ChatOutcome> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::build_messages(system, history),
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools.to_vec());
        }

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .json(&body)
            .send()
            .await
            .context("Chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Chat completion error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        Self::parse_outcome(&json)
    }
}
