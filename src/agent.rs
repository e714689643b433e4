//! Conversational agent: the tool-dispatch loop around the model.
//!
//! One [`Agent::respond`] call is one turn. The user message is appended
//! to the session, the model is invoked with the system instruction, the
//! session history, and the tool catalogue, and while the model keeps
//! requesting tools they are executed strictly in order and fed back as
//! tool-result turns. The loop is bounded by `llm.max_tool_rounds`; a
//! model that never stops asking gets one last invocation with the tool
//! catalogue withheld, so the turn result is always model text and never
//! a tool's raw output.
//!
//! Retrieval failures were already absorbed at the tool layer; what
//! reaches this module from a tool is always text. Model failures are
//! the opposite: they propagate and fail the turn.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{ChatOutcome, LanguageModel};
use crate::models::ChatTurn;
use crate::session::SessionStore;
use crate::tools::{ToolCall, ToolRunner};

const SYSTEM_PROMPT: &str = "\
Você é um assistente simpático e informativo que responde dúvidas sobre os \
professores do CCEN da UFPE.

Você tem acesso a ferramentas de busca sobre a base de documentos dos \
docentes. Use-as sempre que a pergunta envolver fatos sobre professores, \
departamentos, áreas de pesquisa ou publicações; nunca invente informações \
que as buscas não retornaram. Se a pergunta mencionar um professor pelo \
nome, prefira a busca restrita a esse professor.

Evite frases genéricas como \"com base nas informações fornecidas\". Em vez \
disso, seja direto e útil. Por exemplo:
- Se não souber a resposta, diga isso de forma natural e oriente o usuário.
- Se souber parcialmente, explique o que é conhecido e o que pode ser \
consultado depois.

Fale como se estivesse ajudando um visitante num evento ou feira. Seja \
claro, acolhedor e evite termos técnicos ou linguagem robótica. Responda \
sempre em português, de forma clara e acessível ao público geral.";

/// Served when even the tools-withheld invocation fails to produce text.
const FALLBACK_ANSWER: &str =
    "Desculpe, não consegui concluir a resposta agora. Pode tentar novamente?";

/// Session-scoped, tool-augmented responder.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: ToolRunner,
    sessions: Arc<dyn SessionStore>,
    catalog: Vec<serde_json::Value>,
    max_tool_rounds: u32,
}

impl Agent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: ToolRunner,
        sessions: Arc<dyn SessionStore>,
        max_tool_rounds: u32,
    ) -> Self {
        Self {
            model,
            tools,
            sessions,
            catalog: ToolCall::catalog(),
            max_tool_rounds,
        }
    }

    /// Run one full turn for a session and return the raw answer text.
    pub async fn respond(&self, message: &str, session_id: &str) -> Result<String> {
        self.sessions
            .append(session_id, vec![ChatTurn::user(message)])
            .await;

        for round in 0..self.max_tool_rounds {
            let history = self.sessions.history(session_id).await;
            let outcome = self
                .model
                .chat(SYSTEM_PROMPT, &history, &self.catalog)
                .await
                .context("model invocation failed")?;

            match outcome {
                ChatOutcome::Final(text) => {
                    self.sessions
                        .append(session_id, vec![ChatTurn::assistant(&text)])
                        .await;
                    return Ok(text);
                }
                ChatOutcome::ToolCalls(calls) => {
                    debug!(round, count = calls.len(), "model requested tools");
                    let mut turns = Vec::with_capacity(calls.len() + 1);
                    turns.push(ChatTurn::assistant_with_calls("", calls.clone()));
                    for call in &calls {
                        let result = match ToolCall::parse(&call.name, &call.arguments) {
                            Ok(parsed) => self.tools.run(&parsed).await,
                            Err(e) => format!("Erro na ferramenta: {}", e),
                        };
                        turns.push(ChatTurn::tool_result(&call.id, &call.name, result));
                    }
                    self.sessions.append(session_id, turns).await;
                }
            }
        }

        // Round limit reached: one last invocation with the tool catalogue
        // withheld, so the model must compose a textual answer from the
        // results it already has. The turn result is always model text,
        // never a tool's raw output.
        warn!(session_id, "tool round limit reached, forcing a text answer");
        let history = self.sessions.history(session_id).await;
        let outcome = self
            .model
            .chat(SYSTEM_PROMPT, &history, &[])
            .await
            .context("model invocation failed")?;

        let text = match outcome {
            ChatOutcome::Final(text) => text,
            ChatOutcome::ToolCalls(_) => FALLBACK_ANSWER.to_string(),
        };
        self.sessions
            .append(session_id, vec![ChatTurn::assistant(&text)])
            .await;
        Ok(text)
    }

    /// One synthetic turn under a throwaway session id, so the first real
    /// request does not pay model cold-start. The session is deleted
    /// afterwards and never appears in real memory.
    pub async fn warm_up(&self) {
        let session_id = format!("warmup-{}", Uuid::new_v4());
        match self.respond("Olá", &session_id).await {
            Ok(_) => info!("warm-up turn completed"),
            Err(e) => warn!(error = %e, "warm-up turn failed"),
        }
        self.sessions.delete(&session_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrievalConfig, SessionConfig};
    use crate::embedding::Embedder;
    use crate::models::RequestedCall;
    use crate::session::InMemorySessionStore;
    use crate::vector_store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    /// Scripted model: emits each outcome once, then repeats the last.
    struct ScriptedModel {
        script: Vec<ChatOutcome>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: Vec<ChatOutcome>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn chat(
            &self,
            _system: &str,
            _history: &[ChatTurn],
            _tools: &[serde_json::Value],
        ) -> Result<ChatOutcome> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script[i.min(self.script.len() - 1)].clone())
        }
    }

    fn agent(model: ScriptedModel, max_rounds: u32) -> (Agent, Arc<InMemorySessionStore>) {
        let sessions = Arc::new(InMemorySessionStore::new(&SessionConfig::default()));
        let tools = ToolRunner::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NullEmbedder),
            RetrievalConfig::default(),
        );
        (
            Agent::new(Arc::new(model), tools, sessions.clone(), max_rounds),
            sessions,
        )
    }

    fn list_call() -> ChatOutcome {
        ChatOutcome::ToolCalls(vec![RequestedCall {
            id: "call_1".to_string(),
            name: "list_professors".to_string(),
            arguments: "{}".to_string(),
        }])
    }

    #[tokio::test]
    async fn test_direct_answer_appends_two_turns() {
        let (agent, sessions) =
            agent(ScriptedModel::new(vec![ChatOutcome::Final("Oi!".into())]), 4);
        let answer = agent.respond("Olá", "s1").await.unwrap();
        assert_eq!(answer, "Oi!");

        let history = sessions.history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "Olá");
        assert_eq!(history[1].text, "Oi!");
    }

    #[tokio::test]
    async fn test_tool_round_then_final() {
        let (agent, sessions) = agent(
            ScriptedModel::new(vec![list_call(), ChatOutcome::Final("Pronto".into())]),
            4,
        );
        let answer = agent.respond("Quem são os professores?", "s1").await.unwrap();
        assert_eq!(answer, "Pronto");

        // user, assistant-with-calls, tool result, final assistant.
        let history = sessions.history("s1").await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].tool_calls.len(), 1);
        assert_eq!(history[2].tool_name.as_deref(), Some("list_professors"));
    }

    /// Requests tools whenever the catalogue is offered; answers in text
    /// only once it is withheld.
    struct ToolHungryModel;

    #[async_trait]
    impl LanguageModel for ToolHungryModel {
        async fn chat(
            &self,
            _system: &str,
            _history: &[ChatTurn],
            tools: &[serde_json::Value],
        ) -> Result<ChatOutcome> {
            if tools.is_empty() {
                Ok(ChatOutcome::Final("Resumo do que encontrei.".into()))
            } else {
                Ok(list_call())
            }
        }
    }

    #[tokio::test]
    async fn test_round_limit_forces_model_text_answer() {
        let sessions = Arc::new(InMemorySessionStore::new(&SessionConfig::default()));
        let tools = ToolRunner::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NullEmbedder),
            RetrievalConfig::default(),
        );
        let agent = Agent::new(Arc::new(ToolHungryModel), tools, sessions.clone(), 2);

        let answer = agent.respond("loop", "s1").await.unwrap();
        // The answer is the model's text, never a tool result verbatim.
        assert_eq!(answer, "Resumo do que encontrei.");
        assert_ne!(answer, crate::tools::NO_RESULTS);

        let history = sessions.history("s1").await;
        assert_eq!(history.last().unwrap().text, "Resumo do que encontrei.");
    }

    #[tokio::test]
    async fn test_round_limit_with_stubborn_model_yields_fallback() {
        // Keeps requesting tools even with the catalogue withheld.
        let (agent, _) = agent(ScriptedModel::new(vec![list_call()]), 2);
        let answer = agent.respond("loop", "s1").await.unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_text_not_failure() {
        let bad_call = ChatOutcome::ToolCalls(vec![RequestedCall {
            id: "call_1".to_string(),
            name: "explode".to_string(),
            arguments: "{}".to_string(),
        }]);
        let (agent, sessions) = agent(
            ScriptedModel::new(vec![bad_call, ChatOutcome::Final("ok".into())]),
            4,
        );
        assert_eq!(agent.respond("x", "s1").await.unwrap(), "ok");
        let history = sessions.history("s1").await;
        assert!(history[2].text.contains("Erro na ferramenta"));
    }

    #[tokio::test]
    async fn test_warm_up_leaves_no_session() {
        let (agent, sessions) =
            agent(ScriptedModel::new(vec![ChatOutcome::Final("oi".into())]), 4);
        agent.warm_up().await;
        assert_eq!(sessions.len().await, 0);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        struct FailingModel;

        #[async_trait]
        impl LanguageModel for FailingModel {
            async fn chat(
                &self,
                _system: &str,
                _history: &[ChatTurn],
                _tools: &[serde_json::Value],
            ) -> Result<ChatOutcome> {
                anyhow::bail!("connection refused")
            }
        }

        let sessions = Arc::new(InMemorySessionStore::new(&SessionConfig::default()));
        let tools = ToolRunner::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NullEmbedder),
            RetrievalConfig::default(),
        );
        let agent = Agent::new(Arc::new(FailingModel), tools, sessions, 4);
        assert!(agent.respond("x", "s1").await.is_err());
    }
}
