//! Conversation tracing.
//!
//! Each chat turn is posted as one run to a LangSmith-compatible endpoint
//! (`POST {endpoint}/runs`, authenticated with `x-api-key`). The run carries
//! the user input, the reply, the visited steps, the retrieved sources and
//! the tool calls, grouped under the configured project.
//!
//! Tracing never affects a turn: a disabled tracer does nothing, and a
//! failed post is logged at `warn` and dropped.

use std::time::Duration;

use anyhow::{bail, Result};
use ragbot_core::agent::TurnOutcome;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TracingConfig;

pub const RUN_NAME: &str = "ragbot-turn";

pub struct Tracer {
    inner: Option<Inner>,
}

struct Inner {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    project: String,
}

impl Tracer {
    /// A tracer that does nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Build from config. Tracing is off when disabled or when the key or
    /// project is missing.
    pub fn from_config(config: &TracingConfig) -> Result<Self> {
        let (Some(api_key), Some(project)) = (config.api_key.as_deref(), config.project.as_deref()) else {
            return Ok(Self::disabled());
        };
        if !config.enabled || api_key.is_empty() || project.is_empty() {
            return Ok(Self::disabled());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            inner: Some(Inner {
                client,
                endpoint: format!("{}/runs", config.endpoint.trim_end_matches('/')),
                api_key: api_key.to_string(),
                project: project.to_string(),
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn project(&self) -> Option<&str> {
        self.inner.as_ref().map(|i| i.project.as_str())
    }

    /// Post the run for one turn. Failures are logged, never returned.
    pub async fn record_turn(&self, session_id: &str, model: &str, outcome: &TurnOutcome) {
        let Some(inner) = &self.inner else {
            return;
        };
        let run = run_payload(&inner.project, session_id, model, outcome);
        match inner.post(&run).await {
            Ok(()) => debug!(project = %inner.project, "trace posted"),
            Err(e) => warn!(error = %format!("{:#}", e), "failed to post trace"),
        }
    }
}

impl Inner {
    async fn post(&self, run: &Value) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(run)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("tracing endpoint returned {}: {}", status, body);
        }
        Ok(())
    }
}

/// The JSON body of one run.
pub fn run_payload(project: &str, session_id: &str, model: &str, outcome: &TurnOutcome) -> Value {
    let sources: Vec<Value> = outcome
        .retrieved
        .iter()
        .map(|c| json!({ "source": c.source_id, "offset": c.offset, "distance": c.distance }))
        .collect();

    json!({
        "id": Uuid::new_v4().to_string(),
        "name": RUN_NAME,
        "run_type": "chain",
        "session_name": project,
        "start_time": outcome.started_at.to_rfc3339(),
        "end_time": outcome.finished_at.to_rfc3339(),
        "inputs": { "input": outcome.input },
        "outputs": { "output": outcome.reply },
        "error": outcome.error,
        "extra": {
            "metadata": {
                "session_id": session_id,
                "model": model,
                "steps": outcome.steps,
                "retrieved": sources,
                "tool_calls": outcome.tool_calls,
            }
        },
        "tags": ["ragbot"],
    })
}
