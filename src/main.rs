//! # ragbot CLI
//!
//! ## Usage
//!
//! ```bash
//! ragbot --config ./config/ragbot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragbot` / `ragbot chat` | Interactive chat with guided knowledge-base setup |
//! | `ragbot serve` | Web UI and JSON API on `[server].bind` |
//! | `ragbot ingest` | Load the documents folder into the store |
//! | `ragbot scrape <url>` | Scrape one page into the store |
//! | `ragbot stats` | Knowledge-base statistics |
//! | `ragbot clear` | Remove every document from the store |
//! | `ragbot init` | Create the store and its schema |
//!
//! Configuration is checked before anything else runs; a missing key prints
//! a "Configuration error" panel and exits with status 2.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ragbot::app::{self, App};
use ragbot::config::{self, Config, Requirement};
use ragbot::knowledge::KnowledgeBase;
use ragbot::progress::default_reporter;
use ragbot::stats::{format_bytes, KnowledgeStats};
use ragbot::{cli, logging, server};
use ragbot_core::store::VectorStore;

/// ragbot: chat with your documents and web pages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragbot.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "ragbot",
    about = "A retrieval-augmented chatbot over local documents and scraped web pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/ragbot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal (the default).
    Chat,

    /// Serve the web UI and JSON API.
    Serve,

    /// Load every supported file from the documents folder.
    Ingest,

    /// Scrape one web page and add it to the knowledge base.
    Scrape {
        /// Page URL; `https://` is assumed when no scheme is given.
        url: String,
    },

    /// Show knowledge-base statistics.
    Stats,

    /// Remove every document and chunk from the store.
    Clear,

    /// Create the store file and its schema. Safe to run repeatedly.
    Init,
}

impl Commands {
    fn requirement(&self) -> Requirement {
        match self {
            Commands::Chat | Commands::Serve => Requirement::Chat,
            Commands::Ingest | Commands::Scrape { .. } => Requirement::Embedding,
            Commands::Stats | Commands::Clear | Commands::Init => Requirement::Store,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    let cfg = match config::load_config(&cli.config)
        .and_then(|cfg| cfg.require(command.requirement()).map(|()| cfg))
    {
        Ok(cfg) => cfg,
        Err(e) => {
            cli::print_config_error(&e);
            return ExitCode::from(2);
        }
    };

    logging::init_with_config(&cfg.logging);

    match run(cfg, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Chat => {
            let app = App::build(cfg).await?;
            cli::run_chat(app).await?;
        }
        Commands::Serve => {
            let app = App::build(cfg).await?;
            server::run_server(app).await?;
        }
        Commands::Ingest => {
            let kb = app::knowledge_base(&cfg).await?;
            ingest_folder(&kb).await?;
        }
        Commands::Scrape { url } => {
            let kb = app::knowledge_base(&cfg).await?;
            let page = kb.scrape(&url).await?;
            println!(
                "Scraped {} \"{}\": {} characters, {} chunks.",
                page.url, page.title, page.chars, page.chunks
            );
        }
        Commands::Stats => {
            let store = app::open_store(&cfg).await?;
            let stats = KnowledgeStats::collect(
                store.as_ref(),
                &cfg.embedding.model_name(),
                Some(store.path()),
            )
            .await?;
            store.close().await;
            print!("{}", cli::panel("Knowledge base", &stats.render()));
        }
        Commands::Clear => {
            let store = app::open_store(&cfg).await?;
            store.clear().await?;
            store.close().await;
            println!("Knowledge base cleared.");
        }
        Commands::Init => {
            let store = app::open_store(&cfg).await?;
            store.close().await;
            println!(
                "Store initialized at {} ({}).",
                store.path().display(),
                format_bytes(store.size_bytes())
            );
        }
    }
    Ok(())
}

async fn ingest_folder(kb: &KnowledgeBase) -> anyhow::Result<()> {
    let reporter = default_reporter();
    let report = kb.load_documents_with_progress(reporter.as_ref()).await?;
    print!("{}", cli::folder_report(&report));
    if report.documents == 0 && report.failures.is_empty() {
        println!("Add files to {} and run again.", report.folder);
    }
    Ok(())
}
