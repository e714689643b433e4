//! # Docent CLI (`docent`)
//!
//! The `docent` binary starts the faculty Q&A service and provides a few
//! terminal conveniences for poking at it without a client.
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent serve` | Validate config, check the collection, warm up, serve HTTP |
//! | `docent ask "<question>"` | One question-answer turn from the terminal |
//! | `docent directory` | Print the distinct professor names in the collection |

use std::sync::Arc;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docent::agent::Agent;
use docent::chat::ChatService;
use docent::config::{self, Config};
use docent::embedding::ConfiguredEmbedder;
use docent::llm::OpenAiCompatModel;
use docent::server;
use docent::session::InMemorySessionStore;
use docent::speech::create_synthesizer;
use docent::tools::ToolRunner;
use docent::vector_store::{QdrantStore, VectorStore, PROFESSOR_FIELD};

/// Docent — a retrieval-augmented Q&A service about university faculty.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docent.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docent",
    about = "Docent — a retrieval-augmented Q&A service about university faculty",
    version,
    long_about = "Docent answers natural-language questions about university professors by \
    combining semantic retrieval over a vector collection with a tool-calling language model, \
    with session memory and a short-TTL response reliability cache."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docent.toml`. All embedding, model, vector
    /// store, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat service.
    ///
    /// Validates the configuration, verifies the vector collection exists
    /// with the configured dimension, runs one warm-up model turn, and
    /// binds to the address in `[server].bind`.
    Serve,

    /// Ask one question from the terminal.
    ///
    /// Runs a single chat turn through the full pipeline (tools, session,
    /// normalization) and prints the answer.
    Ask {
        /// The question to ask.
        question: String,

        /// Session id to use; turns under the same id share memory.
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Print the professor directory.
    ///
    /// Lists the distinct professor names present in the collection,
    /// one per line. No semantic ranking involved.
    Directory,
}

/// Wire the full service from configuration.
fn build_service(cfg: &Config) -> anyhow::Result<(Arc<ChatService>, Arc<QdrantStore>)> {
    let store = Arc::new(QdrantStore::new(&cfg.vector_store)?);
    let embedder = Arc::new(ConfiguredEmbedder::new(&cfg.embedding)?);
    let model = Arc::new(OpenAiCompatModel::new(&cfg.llm)?);
    let sessions = Arc::new(InMemorySessionStore::new(&cfg.session));

    let tools = ToolRunner::new(store.clone(), embedder, cfg.retrieval.clone());
    let agent = Agent::new(model, tools, sessions, cfg.llm.max_tool_rounds);
    let chat = ChatService::new(agent, create_synthesizer(&cfg.speech), cfg);

    Ok((Arc::new(chat), store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let (chat, store) = build_service(&cfg)?;
            if let Some(dims) = cfg.embedding.dims {
                store.ensure_collection(dims).await?;
            }
            chat.warm_up().await;
            server::run_server(chat, &cfg.server.bind).await?;
        }
        Commands::Ask { question, session } => {
            let (chat, _) = build_service(&cfg)?;
            let payload = chat.respond(&question, &session, false).await?;
            println!("{}", payload.text);
        }
        Commands::Directory => {
            let store = QdrantStore::new(&cfg.vector_store)?;
            let names = store
                .facet(PROFESSOR_FIELD, cfg.retrieval.directory_limit)
                .await?;
            if names.is_empty() {
                println!("No professors found in the collection.");
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}
