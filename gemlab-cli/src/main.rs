//! Gemlab - command-line front end for the gemlab building blocks

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gemlab")]
#[command(about = "Gemini API workbench: chat, planning, critique, vision, RAG and agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (YAML or JSON); defaults are built from GEMINI_API_KEY otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the API key and configuration
    CheckEnv,

    /// Interactive multi-turn chat
    Chat {
        /// Use the step-by-step architect persona
        #[arg(long)]
        architect: bool,

        /// Custom system instruction
        #[arg(long, conflicts_with = "architect")]
        system: Option<String>,
    },

    /// Review a source file with the senior-architect persona
    Review {
        file: PathBuf,

        /// Save the Markdown review here
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Break a requirement document into a validated task plan
    Plan { requirement: PathBuf },

    /// Run the architect / auditor / refactorer loop
    Critique {
        /// Design JSON to build on; defaults to the latest saved plan
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Analyze a pet photo
    Vision {
        image: PathBuf,

        /// Do not archive the analysis
        #[arg(long)]
        no_log: bool,
    },

    /// Compare texts by embedding similarity
    Embed {
        base: String,
        others: Vec<String>,

        /// Use the offline hashing embedder
        #[arg(long)]
        local: bool,
    },

    /// Index Markdown notes and JSON diaries into the vector store
    Index { dir: PathBuf },

    /// Answer a question from the knowledge base
    Ask {
        question: String,

        /// Restrict retrieval to one category (tech or diary)
        #[arg(long)]
        category: Option<String>,
    },

    /// Tool-calling steward agent; interactive without a query
    Agent { query: Option<String> },

    /// Ask the hosted workflow app
    Dify { query: String },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::CheckEnv => commands::check_env(config),
        Commands::Chat { architect, system } => commands::chat(config, architect, system).await,
        Commands::Review { file, out } => commands::review(config, &file, out.as_deref()).await,
        Commands::Plan { requirement } => commands::plan(config, &requirement).await,
        Commands::Critique { context } => commands::critique(config, context.as_deref()).await,
        Commands::Vision { image, no_log } => commands::vision(config, &image, no_log).await,
        Commands::Embed {
            base,
            others,
            local,
        } => commands::embed(config, base, others, local).await,
        Commands::Index { dir } => commands::index(config, &dir).await,
        Commands::Ask { question, category } => {
            commands::ask(config, &question, category.as_deref()).await
        }
        Commands::Agent { query } => commands::agent(config, query).await,
        Commands::Dify { query } => commands::dify(config, &query).await,
    }
}
