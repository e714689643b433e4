//! Retrieval tools exposed to the language model.
//!
//! Every tool the model may invoke is a variant of the closed [`ToolCall`]
//! enum. The dispatcher parses the model's function-call request into a
//! variant, executes it against the vector store, and hands the rendered
//! text back as a tool-result turn. There is no open-ended dispatch table:
//! an unknown tool name fails that call with a message, never the turn.
//!
//! Tool execution never propagates errors. A vector store that times out
//! or an embedding backend that is down degrades to an apologetic
//! Portuguese failure string, and the model answers from what it has.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::models::ScoredPoint;
use crate::vector_store::{SearchFilter, VectorStore, PROFESSOR_FIELD};

/// Document type tag for article chunks, as stored in the collection.
pub const ARTICLE_TYPE: &str = "article";

/// Rendered when a semantic search matches nothing.
pub const NO_RESULTS: &str = "Nenhum resultado encontrado.";

/// Rendered when retrieval itself failed (store or embedding error).
pub const SEARCH_FAILED: &str =
    "Desculpe, ocorreu um erro ao consultar a base de dados. Tente novamente.";

/// A parsed, validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// General semantic search across all faculty documents.
    SearchFaculty { query: String },
    /// Semantic search restricted to one professor's documents.
    SearchProfessor { professor: String, query: String },
    /// Semantic search restricted to published articles, optionally
    /// restricted to one professor.
    SearchArticles {
        query: String,
        professor: Option<String>,
    },
    /// Distinct professor names in the collection, no ranking.
    ListProfessors,
}

impl ToolCall {
    /// Map a model function-call request onto a variant.
    ///
    /// Arguments arrive as the raw JSON string the model produced;
    /// missing required fields and malformed JSON are errors the caller
    /// renders as that call's result text.
    pub fn parse(name: &str, arguments: &str) -> Result<Self> {
        let args: serde_json::Value = if arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| anyhow!("malformed arguments for '{}': {}", name, e))?
        };

        let required = |field: &str| -> Result<String> {
            args.get(field)
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .ok_or_else(|| anyhow!("tool '{}' requires a '{}' argument", name, field))
        };
        let optional = |field: &str| -> Option<String> {
            args.get(field)
                .and_then(|v| v.as_str())
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        match name {
            "search_faculty" => Ok(Self::SearchFaculty {
                query: required("query")?,
            }),
            "search_professor" => Ok(Self::SearchProfessor {
                professor: required("professor")?,
                query: required("query")?,
            }),
            "search_articles" => Ok(Self::SearchArticles {
                query: required("query")?,
                professor: optional("professor"),
            }),
            "list_professors" => Ok(Self::ListProfessors),
            other => Err(anyhow!("unknown tool: {}", other)),
        }
    }

    /// OpenAI function-calling descriptors for every variant.
    pub fn catalog() -> Vec<serde_json::Value> {
        vec![
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "search_faculty",
                    "description": "Busca semântica geral sobre os docentes do centro: perfis, áreas de pesquisa, publicações. Use para perguntas abertas sobre o corpo docente.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "query": { "type": "string", "description": "Texto da busca semântica." }
                        },
                        "required": ["query"]
                    }
                }
            }),
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "search_professor",
                    "description": "Busca semântica restrita aos documentos de um professor específico. Use quando a pergunta menciona um professor pelo nome.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "professor": { "type": "string", "description": "Nome (ou parte do nome) do professor." },
                            "query": { "type": "string", "description": "Texto da busca semântica." }
                        },
                        "required": ["professor", "query"]
                    }
                }
            }),
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "search_articles",
                    "description": "Busca semântica restrita a artigos publicados, opcionalmente de um professor específico. Use para perguntas sobre publicações.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "query": { "type": "string", "description": "Texto da busca semântica." },
                            "professor": { "type": "string", "description": "Nome do professor, se a pergunta restringir a um." }
                        },
                        "required": ["query"]
                    }
                }
            }),
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "list_professors",
                    "description": "Lista os nomes de todos os professores presentes na base. Use para perguntas do tipo 'quem são os professores'.",
                    "parameters": { "type": "object", "properties": {} }
                }
            }),
        ]
    }
}

/// Executes parsed tool calls against the store and embedder.
pub struct ToolRunner {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalConfig,
}

impl ToolRunner {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            retrieval,
        }
    }

    /// Run one tool call and render its result as model-facing text.
    ///
    /// Infallible by contract: retrieval failures are logged and rendered
    /// as [`SEARCH_FAILED`].
    pub async fn run(&self, call: &ToolCall) -> String {
        match self.try_run(call).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "tool execution failed");
                SEARCH_FAILED.to_string()
            }
        }
    }

    async fn try_run(&self, call: &ToolCall) -> Result<String> {
        match call {
            ToolCall::SearchFaculty { query } => {
                let points = self
                    .search(query, SearchFilter::default(), self.retrieval.general_limit)
                    .await?;
                if points.is_empty() {
                    return Ok(NO_RESULTS.to_string());
                }
                Ok(render_context(&points))
            }
            ToolCall::SearchProfessor { professor, query } => {
                let filter = SearchFilter {
                    professor: Some(professor.clone()),
                    ..Default::default()
                };
                let points = self
                    .search(query, filter, self.retrieval.filtered_limit)
                    .await?;
                if points.is_empty() {
                    return Ok(format!(
                        "Nenhum resultado encontrado para o professor '{}'.",
                        professor
                    ));
                }
                Ok(render_context(&points))
            }
            ToolCall::SearchArticles { query, professor } => {
                let filter = SearchFilter {
                    professor: professor.clone(),
                    doc_type: Some(ARTICLE_TYPE.to_string()),
                };
                let points = self
                    .search(query, filter, self.retrieval.filtered_limit)
                    .await?;
                if points.is_empty() {
                    return Ok(match professor {
                        Some(p) => format!(
                            "Nenhum artigo encontrado para o professor '{}'.",
                            p
                        ),
                        None => "Nenhum artigo encontrado.".to_string(),
                    });
                }
                Ok(render_articles(&points))
            }
            ToolCall::ListProfessors => {
                let names = self
                    .store
                    .facet(PROFESSOR_FIELD, self.retrieval.directory_limit)
                    .await?;
                if names.is_empty() {
                    return Ok(NO_RESULTS.to_string());
                }
                Ok(names.join("\n"))
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        filter: SearchFilter,
        limit: u64,
    ) -> Result<Vec<ScoredPoint>> {
        let vector = self.embedder.embed(query).await?;
        self.store.search(&vector, &filter, limit).await
    }
}

/// Render retrieved chunks as the grounding context block the model reads.
fn render_context(points: &[ScoredPoint]) -> String {
    let mut out = String::new();
    for point in points {
        let p = &point.payload;
        out.push_str(&format!(
            "Professor: {}\nDepartamento: {}\nInformação: {}\n\n",
            p.professor, p.department, p.text
        ));
    }
    out.trim_end().to_string()
}

/// Article rendering carries title and year when the payload has them.
fn render_articles(points: &[ScoredPoint]) -> String {
    let mut out = String::new();
    for point in points {
        let p = &point.payload;
        out.push_str(&format!("Professor: {}\n", p.professor));
        if let Some(title) = &p.title {
            out.push_str(&format!("Título: {}\n", title));
        }
        if let Some(year) = p.year {
            out.push_str(&format!("Ano: {}\n", year));
        }
        out.push_str(&format!("Informação: {}\n\n", p.text));
    }
    out.trim_end().to_string()
}
