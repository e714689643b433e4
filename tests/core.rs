//! End-to-end tests of the chat pipeline against in-memory backends.
//!
//! A scripted language model drives the agent through real tool
//! execution over the in-memory vector store, so these tests cover the
//! whole path a request takes below the HTTP layer: normalization,
//! cache, agent loop, tools, session memory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use docent::agent::Agent;
use docent::chat::ChatService;
use docent::config::{Config, RetrievalConfig, SessionConfig};
use docent::embedding::Embedder;
use docent::llm::{ChatOutcome, LanguageModel};
use docent::models::{ChatTurn, ChunkPayload, RequestedCall};
use docent::session::{InMemorySessionStore, SessionStore};
use docent::speech::DisabledSynthesizer;
use docent::tools::{ToolRunner, NO_RESULTS, SEARCH_FAILED};
use docent::vector_store::{InMemoryStore, SearchFilter, VectorStore};

/// Deterministic embedder: character histogram, L2-normalized.
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; 16];
        for (i, b) in text.bytes().enumerate() {
            v[(i + b as usize) % 16] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        Ok(v.into_iter().map(|x| x / norm).collect())
    }
}

/// Vector store whose every operation fails, for degradation tests.
struct DownStore;

#[async_trait]
impl VectorStore for DownStore {
    async fn search(
        &self,
        _vector: &[f32],
        _filter: &SearchFilter,
        _limit: u64,
    ) -> Result<Vec<docent::models::ScoredPoint>> {
        anyhow::bail!("connection timed out")
    }

    async fn facet(&self, _field: &str, _limit: u64) -> Result<Vec<String>> {
        anyhow::bail!("connection timed out")
    }

    async fn ensure_collection(&self, _dims: usize) -> Result<()> {
        anyhow::bail!("connection timed out")
    }
}

/// Scripted model: plays each outcome once, repeats the last, counts calls.
struct ScriptedModel {
    script: Vec<ChatOutcome>,
    calls: Arc<AtomicUsize>,
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

fn tool_call(name: &str, arguments: &str) -> ChatOutcome {
    ChatOutcome::ToolCalls(vec![RequestedCall {
        id: "call_1".to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }])
}

fn final_answer(text: &str) -> ChatOutcome {
    ChatOutcome::Final(text.to_string())
}

fn chunk(professor: &str, department: &str, doc_type: &str, text: &str) -> ChunkPayload {
    ChunkPayload {
        person_id: professor.to_lowercase().replace(' ', "-"),
        professor: professor.to_string(),
        department: department.to_string(),
        doc_type: doc_type.to_string(),
        text: text.to_string(),
        ..Default::default()
    }
}

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let embedder = HashEmbedder;
    for (id, payload) in [
        (
            "1",
            chunk("Maria Souza", "Matemática", "profile", "Pesquisa em topologia algébrica."),
        ),
        (
            "2",
            chunk("Maria Souza", "Matemática", "article", "Artigo sobre grupos de homotopia."),
        ),
        (
            "3",
            chunk("João Pereira", "Física", "profile", "Pesquisa em matéria condensada."),
        ),
        (
            "4",
            chunk("João Pereira", "Física", "article", "Artigo sobre supercondutividade."),
        ),
    ] {
        let vector = embedder.embed(&payload.text).await.unwrap();
        store.insert(id, vector, payload);
    }
    store
}

struct Harness {
    service: ChatService,
    sessions: Arc<InMemorySessionStore>,
    model_calls: Arc<AtomicUsize>,
}

fn harness_with_store(store: Arc<dyn VectorStore>, script: Vec<ChatOutcome>) -> Harness {
    let model_calls = Arc::new(AtomicUsize::new(0));
    let sessions = Arc::new(InMemorySessionStore::new(&SessionConfig::default()));
    let model = ScriptedModel {
        script,
        calls: model_calls.clone(),
    };
    let tools = ToolRunner::new(store, Arc::new(HashEmbedder), RetrievalConfig::default());
    let agent = Agent::new(Arc::new(model), tools, sessions.clone(), 4);
    Harness {
        service: ChatService::new(agent, Box::new(DisabledSynthesizer), &Config::default()),
        sessions,
        model_calls,
    }
}

async fn harness(script: Vec<ChatOutcome>) -> Harness {
    harness_with_store(Arc::new(seeded_store().await), script)
}

#[tokio::test]
async fn cached_response_is_identical_and_skips_the_model() {
    let h = harness(vec![final_answer("<think>x</think>A   resposta.")]).await;

    let first = h.service.respond("Olá", "s1", false).await.unwrap();
    let second = h.service.respond("Olá", "s1", false).await.unwrap();

    assert_eq!(first.text, "A resposta.");
    assert_eq!(first, second);
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn normalized_message_shares_the_cache_entry() {
    let h = harness(vec![final_answer("oi")]).await;

    h.service.respond("/no_think  Olá", "s1", false).await.unwrap();
    h.service.respond("Olá", "s1", false).await.unwrap();

    assert_eq!(h.model_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mid_message_directive_shares_the_cache_entry() {
    let h = harness(vec![final_answer("oi")]).await;

    h.service.respond("Olá /think tudo bem?", "s1", false).await.unwrap();
    h.service.respond("Olá tudo bem?", "s1", false).await.unwrap();

    assert_eq!(h.model_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sessions_do_not_share_cache_or_memory() {
    let h = harness(vec![final_answer("oi")]).await;

    h.service.respond("Olá", "s1", false).await.unwrap();
    h.service.respond("Olá", "s2", false).await.unwrap();

    // Same message, different session: the model runs again.
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.sessions.history("s1").await.len(), 2);
    assert_eq!(h.sessions.history("s2").await.len(), 2);
}

#[tokio::test]
async fn tool_results_reach_the_session_history() {
    let h = harness(vec![
        tool_call("search_professor", r#"{"professor":"Maria Souza","query":"topologia"}"#),
        final_answer("Maria Souza pesquisa topologia algébrica."),
    ])
    .await;

    let payload = h
        .service
        .respond("O que a professora Maria pesquisa?", "s1", false)
        .await
        .unwrap();
    assert_eq!(payload.text, "Maria Souza pesquisa topologia algébrica.");

    let history = h.sessions.history("s1").await;
    let tool_turn = history
        .iter()
        .find(|t| t.tool_name.is_some())
        .expect("tool result turn");
    assert!(tool_turn.text.contains("Maria Souza"));
    assert!(tool_turn.text.contains("Departamento: Matemática"));
    assert!(!tool_turn.text.contains("João"));
}

#[tokio::test]
async fn article_search_conjoins_type_and_professor_filters() {
    let h = harness(vec![
        tool_call(
            "search_articles",
            r#"{"query":"supercondutividade","professor":"João Pereira"}"#,
        ),
        final_answer("ok"),
    ])
    .await;

    h.service.respond("artigos do João?", "s1", false).await.unwrap();

    let history = h.sessions.history("s1").await;
    let tool_turn = history.iter().find(|t| t.tool_name.is_some()).unwrap();
    assert!(tool_turn.text.contains("supercondutividade"));
    assert!(!tool_turn.text.contains("Maria"));
    assert!(!tool_turn.text.contains("topologia"));
}

#[tokio::test]
async fn directory_lists_each_professor_once() {
    let h = harness(vec![tool_call("list_professors", "{}"), final_answer("ok")]).await;

    h.service.respond("quem são?", "s1", false).await.unwrap();

    let history = h.sessions.history("s1").await;
    let tool_turn = history.iter().find(|t| t.tool_name.is_some()).unwrap();
    let mut names: Vec<&str> = tool_turn.text.lines().collect();
    names.sort();
    assert_eq!(names, vec!["João Pereira", "Maria Souza"]);
}

#[tokio::test]
async fn a_down_vector_store_degrades_to_a_message_not_an_error() {
    let h = harness_with_store(
        Arc::new(DownStore),
        vec![
            tool_call("search_faculty", r#"{"query":"qualquer"}"#),
            final_answer("Desculpe, não consegui consultar a base agora."),
        ],
    );

    let payload = h.service.respond("Olá", "s1", false).await.unwrap();
    assert_eq!(payload.text, "Desculpe, não consegui consultar a base agora.");

    let history = h.sessions.history("s1").await;
    let tool_turn = history.iter().find(|t| t.tool_name.is_some()).unwrap();
    assert_eq!(tool_turn.text, SEARCH_FAILED);
}

#[tokio::test]
async fn empty_results_render_the_sentinel() {
    let h = harness_with_store(
        Arc::new(InMemoryStore::new()),
        vec![tool_call("search_faculty", r#"{"query":"x"}"#), final_answer("ok")],
    );

    h.service.respond("Olá", "s1", false).await.unwrap();

    let history = h.sessions.history("s1").await;
    let tool_turn = history.iter().find(|t| t.tool_name.is_some()).unwrap();
    assert_eq!(tool_turn.text, NO_RESULTS);
}

#[tokio::test]
async fn exhausted_tool_rounds_never_serve_raw_tool_output() {
    // Requests the directory tool on every round the catalogue is
    // offered; answers in text once it is withheld.
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
                Ok(final_answer("Temos duas professoras e um professor."))
            } else {
                Ok(tool_call("list_professors", "{}"))
            }
        }
    }

    let sessions = Arc::new(InMemorySessionStore::new(&SessionConfig::default()));
    let tools = ToolRunner::new(
        Arc::new(seeded_store().await),
        Arc::new(HashEmbedder),
        RetrievalConfig::default(),
    );
    let agent = Agent::new(Arc::new(ToolHungryModel), tools, sessions, 2);
    let service = ChatService::new(agent, Box::new(DisabledSynthesizer), &Config::default());

    let payload = service.respond("Quem são?", "s1", false).await.unwrap();
    // The served answer is model text, never the directory listing itself.
    assert_eq!(payload.text, "Temos duas professoras e um professor.");
    assert!(!payload.text.contains("Maria Souza"));
}

#[tokio::test]
async fn pending_responses_expose_recoverable_payloads() {
    let h = harness(vec![final_answer("resposta")]).await;

    h.service.respond("Olá", "s1", false).await.unwrap();

    let pending = h.service.pending_responses("s1");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].response.text, "resposta");
    // The reported hash matches what the client computes.
    assert_eq!(
        pending[0].message_hash,
        docent::cache::ResponseCache::compute_key("Olá", false)
    );
    assert!(h.service.pending_responses("s9").is_empty());
}

#[tokio::test]
async fn speech_mode_without_synthesizer_serves_text_only() {
    let h = harness(vec![final_answer("**Olá** visitante")]).await;

    let payload = h.service.respond("Oi", "s1", true).await.unwrap();
    assert!(payload.audio.is_none());
    assert_eq!(payload.text, "**Olá** visitante");
}
