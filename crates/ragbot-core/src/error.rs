//! Error taxonomy.
//!
//! Only [`ConfigError`] is fatal, and only at startup. Ingestion errors are
//! collected per item, retrieval errors degrade to "no context", and
//! generation errors are shown to the user as an assistant turn.

use thiserror::Error;

/// Missing or invalid configuration, detected before any front end starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {key}: {description}")]
    Missing {
        key: &'static str,
        description: &'static str,
    },
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{}", join_problems(.0))]
    Many(Vec<ConfigError>),
}

impl ConfigError {
    /// Flattens the error into its individual problems.
    pub fn problems(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Many(all) => all.iter().flat_map(|e| e.problems()).collect(),
            other => vec![other],
        }
    }
}

fn join_problems(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single source (file or URL) that could not be turned into a document
/// or stored. Never aborts the batch it belongs to.
#[derive(Debug, Clone, Error)]
#[error("{source_id}: {reason}")]
pub struct IngestionError {
    pub source_id: String,
    pub reason: String,
}

impl IngestionError {
    pub fn new(source_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// The store or the query embedding was unavailable.
#[derive(Debug, Error)]
#[error("retrieval failed: {0}")]
pub struct RetrievalError(#[from] pub anyhow::Error);

/// The model or a tool call failed while producing a reply.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model call failed: {0}")]
    Model(anyhow::Error),
    #[error("tool '{name}' failed: {reason}")]
    Tool { name: String, reason: String },
    #[error("model requested unknown tool '{0}'")]
    UnknownTool(String),
    #[error("model returned no usable reply")]
    EmptyReply,
}

/// Umbrella error for callers that need to carry any of the above.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}
