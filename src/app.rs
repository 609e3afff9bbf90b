//! Dependency wiring shared by the CLI, the web server and the
//! non-interactive subcommands.

use std::sync::Arc;

use anyhow::{Context, Result};
use ragbot_core::agent::{AgentGraph, AgentSettings, ChatModel, TurnOutcome};
use ragbot_core::embedding::Embedder;
use ragbot_core::models::Session;
use ragbot_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::knowledge::KnowledgeBase;
use crate::llm::OpenAiChatModel;
use crate::sqlite_store::SqliteStore;
use crate::tools::default_registry;
use crate::trace::Tracer;

/// Open the configured SQLite store.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.store.path)
        .await
        .with_context(|| format!("failed to open store at {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

/// Knowledge base over the configured embedder and SQLite store.
pub async fn knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    let embedder = create_embedder(config)?;
    let store = open_store(config).await?;
    Ok(KnowledgeBase::new(config, embedder, store)?.with_store_path(&config.store.path))
}

/// Everything a chat front end needs.
pub struct App {
    pub config: Config,
    pub kb: KnowledgeBase,
    pub agent: AgentGraph,
    pub tracer: Tracer,
}

impl App {
    /// Production wiring: OpenAI chat model, configured embedder, SQLite
    /// store, tracer from config.
    pub async fn build(config: Config) -> Result<Self> {
        let kb = knowledge_base(&config).await?;
        let model = Arc::new(OpenAiChatModel::from_config(&config)?);
        let tracer = Tracer::from_config(&config.tracing)?;
        Ok(Self::assemble(config, kb, model, tracer))
    }

    /// Wiring with caller-supplied clients.
    pub fn with_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        tracer: Tracer,
    ) -> Result<Self> {
        let kb = KnowledgeBase::new(&config, embedder, store)?;
        Ok(Self::assemble(config, kb, model, tracer))
    }

    fn assemble(config: Config, kb: KnowledgeBase, model: Arc<dyn ChatModel>, tracer: Tracer) -> Self {
        let settings = agent_settings(&config);
        let tools = Arc::new(default_registry(&kb));
        let agent = AgentGraph::new(model, kb.retriever(), tools, settings);
        Self {
            config,
            kb,
            agent,
            tracer,
        }
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.config.agent.rag_enabled)
    }

    /// Run one turn and trace it.
    pub async fn chat(&self, session: &mut Session, input: &str) -> TurnOutcome {
        let outcome = self.agent.run_turn(session, input).await;
        self.tracer
            .record_turn(&session.id, self.agent.model_name(), &outcome)
            .await;
        outcome
    }
}

fn agent_settings(config: &Config) -> AgentSettings {
    let mut settings = AgentSettings {
        top_k: config.retrieval.top_k,
        context_chars: config.agent.context_chars,
        ..AgentSettings::default()
    };
    if let Some(prompt) = config.agent.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        settings.system_prompt = prompt.to_string();
    }
    settings
}
