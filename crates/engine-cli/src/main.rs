//! context-engine CLI
//!
//! A thin embedded-host shell over `engine-core`: ingest files or raw
//! content, run a search, trigger a backup, or send a chat turn.

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine_core::scribe::{Generator, Role, Turn};
use engine_core::{Engine, EngineConfig};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "context-engine", version, about = "Local-first context engine")]
struct Cli {
    /// Override the configured watched directory.
    #[arg(long, global = true)]
    watched_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a file already present under the watched directory.
    Ingest {
        path: String,
        #[arg(long)]
        bucket: Vec<String>,
    },
    /// Ingest raw content from stdin or an inline string.
    IngestText {
        content: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        bucket: Vec<String>,
    },
    /// Run a Tag-Walker search and print the inflated context.
    Search {
        query: String,
        #[arg(long, default_value_t = 2000)]
        max_chars: usize,
        #[arg(long, default_value = "all")]
        provenance: String,
        #[arg(long)]
        bucket: Vec<String>,
    },
    /// List the deduplicated, lex-sorted bucket labels.
    Buckets,
    /// Re-tag compounds stuck in the default bucket.
    Dream,
    /// Eject the store to a timestamped backup file.
    Backup,
    /// Send a single chat turn through Context Weaving.
    Chat { message: String },
}

/// No external model is configured for the CLI host; chat and scribe
/// summarization simply echo the prompt back. A real deployment supplies
/// its own `Generator` wired to a local inference process.
struct EchoGenerator;

impl Generator for EchoGenerator {
    fn generate(&self, prompt: &str) -> engine_core::Result<String> {
        Ok(prompt.to_string())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(dir) = cli.watched_dir {
        config.watched_dir = dir;
    }

    let engine = match Engine::boot(config) {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "failed to boot engine");
            std::process::exit(1);
        }
    };

    let result = run(&engine, cli.command);
    if let Err(err) = result {
        error!(error = %err, "command failed");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(engine: &Engine, command: Command) -> engine_core::Result<()> {
    match command {
        Command::Ingest { path, bucket } => {
            let content = std::fs::read_to_string(engine.config().watched_dir.join(&path))
                .map_err(|e| engine_core::EngineError::bad_request(e.to_string()))?;
            let buckets = if bucket.is_empty() { None } else { Some(bucket) };
            let outcome = engine.ingest(&content, Some(&path), None, buckets)?;
            println!("{:?} {}", outcome.status, outcome.id);
            Ok(())
        }
        Command::IngestText { content, source, bucket } => {
            let buckets = if bucket.is_empty() { None } else { Some(bucket) };
            let outcome = engine.ingest(&content, source.as_deref(), None, buckets)?;
            println!("{:?} {}", outcome.status, outcome.id);
            Ok(())
        }
        Command::Search { query, max_chars, provenance, bucket } => {
            let buckets = if bucket.is_empty() { None } else { Some(bucket) };
            let result = engine.search(&query, buckets, max_chars, &provenance)?;
            println!("{}", result.context);
            info!(hits = result.results.len(), partial = result.partial, "search complete");
            Ok(())
        }
        Command::Buckets => {
            for bucket in engine.buckets()? {
                println!("{bucket}");
            }
            Ok(())
        }
        Command::Dream => {
            let retagged = engine.dream()?;
            println!("retagged {retagged} compounds");
            Ok(())
        }
        Command::Backup => {
            let now = chrono::Utc::now().timestamp_millis();
            let path = engine.backup(now)?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Command::Chat { message } => {
            let generator = EchoGenerator;
            let turns = vec![Turn { role: Role::User, content: message }];
            let result = engine.chat(&turns, &generator)?;
            println!("{}", result.response);
            Ok(())
        }
    }
}
