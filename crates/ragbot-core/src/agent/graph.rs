//! Agent graph execution.
//!
//! [`AgentGraph::run_turn`] drives one user input through the [`Step`]
//! machine. Every failure is turned into a visible assistant turn, so the
//! call itself never fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::{ChatModel, ModelReply, ToolRegistry};
use crate::error::GenerationError;
use crate::models::{ConversationTurn, ScoredChunk, Session, ToolCall};
use crate::retrieve::{Retriever, DEFAULT_TOP_K};

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to a knowledge base. \
Use the available tools to help users and provide accurate information based on the documents and data available.";

/// Characters of each retrieved chunk quoted in the system prompt.
pub const DEFAULT_CONTEXT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Start,
    Retrieve,
    Generate,
    ToolCall,
    End,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub top_k: usize,
    pub system_prompt: String,
    pub context_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }
}

/// One executed tool call, as reported to front ends and the tracer.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: String,
    pub ok: bool,
    pub output: String,
}

/// Result of one [`AgentGraph::run_turn`].
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub input: String,
    /// The assistant turn that was appended; an error message on failure.
    pub reply: String,
    pub steps: Vec<Step>,
    pub retrieved: Vec<ScoredChunk>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TurnOutcome {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Mutable state carried between steps of a single turn.
#[derive(Default)]
struct TurnState {
    passes: usize,
    stored_chunks: usize,
    retrieved: Vec<ScoredChunk>,
    pending: Option<(String, Vec<ToolCall>)>,
    tool_calls: Vec<ToolCallRecord>,
    reply: Option<String>,
    error: Option<GenerationError>,
}

impl TurnState {
    fn fail(&mut self, err: GenerationError) -> Step {
        warn!(error = %err, "turn failed");
        self.error = Some(err);
        Step::End
    }
}

pub struct AgentGraph {
    model: Arc<dyn ChatModel>,
    retriever: Retriever,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl AgentGraph {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: Retriever,
        tools: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            model,
            retriever,
            tools,
            settings,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Process one user input to completion, appending the user turn, any
    /// tool turns and exactly one final assistant turn to `session`.
    pub async fn run_turn(&self, session: &mut Session, input: &str) -> TurnOutcome {
        let started_at = Utc::now();
        let mut state = TurnState::default();
        let mut steps = Vec::new();
        let mut step = Step::Start;

        loop {
            steps.push(step);
            debug!(?step, "agent step");
            step = match step {
                Step::Start => {
                    session.push(ConversationTurn::user(input));
                    session.context.clear();
                    if session.rag_enabled {
                        Step::Retrieve
                    } else {
                        Step::Generate
                    }
                }
                Step::Retrieve => {
                    self.retrieve(input, &mut state).await;
                    session.context = state.retrieved.clone();
                    Step::Generate
                }
                Step::Generate => self.generate(session, &mut state).await,
                Step::ToolCall => self.call_tools(session, &mut state).await,
                Step::End => break,
            };
        }

        let reply = match (&state.error, state.reply.take()) {
            (Some(err), _) => format!("Sorry, I couldn't complete that request: {}", err),
            (None, Some(text)) => text,
            (None, None) => format!(
                "Sorry, I couldn't complete that request: {}",
                GenerationError::EmptyReply
            ),
        };
        session.push(ConversationTurn::assistant(reply.clone()));

        TurnOutcome {
            input: input.to_string(),
            reply,
            steps,
            retrieved: state.retrieved,
            tool_calls: state.tool_calls,
            error: state.error.map(|e| e.to_string()),
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn retrieve(&self, input: &str, state: &mut TurnState) {
        match self.retriever.retrieve(input, self.settings.top_k).await {
            Ok(chunks) => {
                if !chunks.is_empty() {
                    state.stored_chunks = self
                        .retriever
                        .chunk_count()
                        .await
                        .unwrap_or(chunks.len());
                }
                state.retrieved = chunks;
            }
            Err(e) => {
                warn!(error = %e, "continuing without context");
            }
        }
    }

    async fn generate(&self, session: &Session, state: &mut TurnState) -> Step {
        let first_pass = state.passes == 0;
        state.passes += 1;

        let mut messages = Vec::with_capacity(session.turns.len() + 1);
        messages.push(ConversationTurn::system(self.system_prompt(state)));
        messages.extend(session.turns.iter().cloned());

        let specs = if first_pass {
            self.tools.specs()
        } else {
            Vec::new()
        };

        match self.model.complete(&messages, &specs).await {
            Ok(ModelReply::Text(text)) => {
                if text.trim().is_empty() {
                    return state.fail(GenerationError::EmptyReply);
                }
                state.reply = Some(text);
                Step::End
            }
            Ok(ModelReply::ToolRequest { content, calls }) if first_pass && !calls.is_empty() => {
                state.pending = Some((content, calls));
                Step::ToolCall
            }
            Ok(ModelReply::ToolRequest { content, .. }) => {
                if content.trim().is_empty() {
                    return state.fail(GenerationError::EmptyReply);
                }
                state.reply = Some(content);
                Step::End
            }
            Err(e) => state.fail(GenerationError::Model(e)),
        }
    }

    async fn call_tools(&self, session: &mut Session, state: &mut TurnState) -> Step {
        let Some((content, calls)) = state.pending.take() else {
            return state.fail(GenerationError::EmptyReply);
        };
        session.push(ConversationTurn::tool_request(content, calls.clone()));

        // Every call gets a result turn, even after a failure, so the
        // request/result pairing stays intact for the next turn.
        let mut first_error = None;
        for call in &calls {
            let (ok, output) = match self.tools.invoke(call).await {
                Ok(output) => (true, output),
                Err(e) => {
                    let text = format!("Error: {}", e);
                    first_error.get_or_insert(e);
                    (false, text)
                }
            };
            session.push(ConversationTurn::tool_result(call, output.clone()));
            state.tool_calls.push(ToolCallRecord {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                ok,
                output,
            });
        }

        match first_error {
            Some(err) => state.fail(err),
            None => Step::Generate,
        }
    }

    fn system_prompt(&self, state: &TurnState) -> String {
        if state.retrieved.is_empty() {
            return self.settings.system_prompt.clone();
        }

        let context = state
            .retrieved
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "Document {} (Source: {}):\n{}",
                    i + 1,
                    chunk.source_id,
                    truncate_chars(&chunk.text, self.settings.context_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\nThe knowledge base currently holds {} chunks.\n\n\
             Relevant context for the current query:\n{}\n\n\
             Use this information to provide accurate and helpful responses. \
             If the question relates to the documents, incorporate relevant information from them; \
             otherwise use your general knowledge.\n\n\
             Available tools: {}",
            self.settings.system_prompt,
            state.stored_chunks,
            context,
            self.tools.names().join(", ")
        )
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}
