//! # Knowledge Chat CLI (`kchat`)
//!
//! ## Usage
//!
//! ```bash
//! kchat --config ./config/kchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kchat init` | Create the SQLite database and run schema migrations |
//! | `kchat import <paths...>` | Replace the knowledge base with the given files/directories |
//! | `kchat ask "<question>"` | Answer one question |
//! | `kchat chat` | Interactive multi-turn chat |
//! | `kchat status` | Show the number of indexed chunks |
//!
//! Logs go to stderr; set `RUST_LOG` or pass `--verbose` for more detail.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use knowledge_chat::config;
use knowledge_chat::knowledge_base::{expand_paths, ChatSession, KnowledgeBase};
use knowledge_chat::loader::SUPPORTED_EXTENSIONS;
use knowledge_chat::migrate;
use knowledge_chat_core::Message;

/// Knowledge Chat: ask questions about your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kchat",
    about = "Knowledge Chat: a local-first knowledge base chat assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kchat.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Import documents, replacing everything previously imported.
    ///
    /// Directories are searched recursively for .txt, .md, .markdown,
    /// .json and .pdf files.
    Import {
        /// Files or directories to import.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ask a single question and print the answer.
    Ask {
        /// The question.
        question: String,

        /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start an interactive chat. `/reset` clears the conversation, `/exit` quits.
    Chat {
        /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show how many chunks are indexed.
    Status,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { paths } => {
            let files = expand_paths(&paths)?;
            if files.is_empty() {
                anyhow::bail!(
                    "No supported files found ({})",
                    SUPPORTED_EXTENSIONS.join(", ")
                );
            }
            let kb = KnowledgeBase::from_config(&cfg).await?;
            let chunks = kb.import(&files).await?;
            println!("Imported {} files ({} chunks).", files.len(), chunks);
        }
        Commands::Ask { question, top_k } => {
            let kb = KnowledgeBase::from_config(&cfg).await?;
            let top_k = top_k.unwrap_or_else(|| kb.default_top_k());
            let reply = kb.ask(&[Message::user(question)], top_k).await?;
            println!("{}", reply.content());
        }
        Commands::Chat { top_k } => {
            let kb = Arc::new(KnowledgeBase::from_config(&cfg).await?);
            let top_k = top_k.unwrap_or_else(|| kb.default_top_k());
            run_repl(ChatSession::new(kb, top_k)).await?;
        }
        Commands::Status => {
            let kb = KnowledgeBase::from_config(&cfg).await?;
            println!("Indexed chunks: {}", kb.record_count().await?);
        }
    }

    Ok(())
}

/// Read questions from stdin until EOF or `/exit`.
///
/// A failed turn is reported and the session continues.
async fn run_repl(mut session: ChatSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Knowledge Chat. Type /reset to start over, /exit to quit.");
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match session.send(input).await {
            Ok(reply) => println!("{}", reply.content()),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
