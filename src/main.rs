//! # Notes Harness CLI (`notes`)
//!
//! Interactive study assistant: paste a link to a folder of lecture notes,
//! get structured notes and practice questions, then ask questions answered
//! from the folder's contents.
//!
//! ## Usage
//!
//! ```bash
//! notes --config ./config/notes.toml
//! ```
//!
//! Without a config file the built-in defaults are used: Google Drive for
//! documents, OpenAI for embeddings and Cohere for chat. Credentials are read
//! from the environment (`GOOGLE_DRIVE_ACCESS_TOKEN` or `GOOGLE_API_KEY`,
//! `OPENAI_API_KEY`, `CO_API_KEY`).
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use notes_harness::config::load_config_or_default;
use notes_harness::repl;
use notes_harness::session::Session;

/// Chat with a folder of study notes.
#[derive(Parser)]
#[command(
    name = "notes",
    about = "Notes Harness: study notes, practice questions and chat over a folder of documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/notes.toml`. If the file does not exist the
    /// built-in defaults are used.
    #[arg(long, default_value = "./config/notes.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config_or_default(&cli.config)?;
    let mut session = Session::from_config(config)?;
    tracing::info!(session_id = %session.id(), "session started");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(&mut session, stdin, &mut stdout).await
}
