//! # Docent
//!
//! A retrieval-augmented Q&A service about university faculty.
//!
//! Docent answers natural-language questions about the professors of a
//! university center by combining semantic retrieval over a Qdrant
//! collection with a tool-calling language model. Sessions keep
//! conversational memory, and every finished answer is held in a
//! short-TTL cache so a client whose connection dropped can recover it
//! without re-running the model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐   ┌──────────┐
//! │   HTTP   │──▶│ ChatService│──▶│    Agent    │──▶│   LLM    │
//! │  (axum)  │   │ norm+cache │   │  tool loop  │   │ (OpenAI/ │
//! └──────────┘   └───────────┘   └──────┬──────┘   │  Ollama) │
//!                                       │          └──────────┘
//!                                ┌──────┴──────┐
//!                                │ ToolRunner  │
//!                                │ embed+Qdrant│
//!                                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Input/output text normalization |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`vector_store`] | Vector store abstraction (Qdrant, in-memory) |
//! | [`tools`] | Retrieval tools the model can call |
//! | [`llm`] | Language model interface |
//! | [`agent`] | Tool-dispatch loop and session wiring |
//! | [`session`] | Bounded session memory |
//! | [`cache`] | Response reliability cache |
//! | [`speech`] | Speech synthesis interface |
//! | [`chat`] | Service facade |
//! | [`server`] | HTTP transport |

pub mod agent;
pub mod cache;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod server;
pub mod session;
pub mod speech;
pub mod tools;
pub mod vector_store;
