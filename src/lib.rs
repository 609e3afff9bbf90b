//! # ragbot
//!
//! A retrieval-augmented chatbot. Documents from a local folder and
//! scraped web pages are chunked, embedded and stored in SQLite; each chat
//! turn optionally retrieves the closest chunks and lets the model call
//! tools before answering.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ Loaders     │──▶│  Ingestor   │──▶│  SQLite  │
//! │ Folder/Web  │   │ Chunk+Embed │   │  Vectors │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ Retriever
//!                                     ┌────▼─────┐
//!                                     │  Agent   │◀── tools
//!                                     │  graph   │
//!                                     └────┬─────┘
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │  Web UI  │
//!                 │  (chat)  │       │ (serve)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! ragbot init                   # create the store
//! ragbot ingest                 # load ./rawdata
//! ragbot scrape example.com     # add a web page
//! ragbot                        # chat in the terminal
//! ragbot serve                  # web UI on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, environment overlay, validation |
//! | [`logging`] | `tracing-subscriber` setup |
//! | [`loader`] | Folder walking and per-format loading |
//! | [`extract`] | PDF, DOCX, PPTX and CSV text extraction |
//! | [`html`] | Markup stripping for HTML files and pages |
//! | [`scrape`] | Web page fetching |
//! | [`embedding`] | OpenAI and local embedders |
//! | [`ingest`] | Chunk, embed and store documents |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`knowledge`] | Knowledge-base facade |
//! | [`llm`] | OpenAI chat model |
//! | [`tools`] | Knowledge-base tools for the agent |
//! | [`trace`] | Conversation tracing |
//! | [`stats`] | Knowledge and conversation statistics |
//! | [`progress`] | Ingestion progress output |
//! | [`app`] | Wiring for the front ends |
//! | [`cli`] | Terminal chat |
//! | [`server`] | Web UI and JSON API |

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod html;
pub mod ingest;
pub mod knowledge;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod scrape;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod tools;
pub mod trace;
