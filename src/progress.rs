//! Ingestion progress reporting.
//!
//! Progress goes to **stderr** so stdout stays clean for the chat transcript
//! and for scripts reading command output.

use std::io::Write;

/// A single progress event emitted by the ingestion pipeline.
#[derive(Clone, Debug)]
pub enum IngestEvent {
    /// A source was chunked, embedded and stored. `n` counts sources done
    /// so far in this batch.
    Stored {
        source_id: String,
        chunks: usize,
        n: u64,
    },
    /// A source could not be ingested; the batch continues.
    Failed { source_id: String, reason: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress on stderr: `ingest  12  rawdata/faq.md (4 chunks)`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Stored {
                source_id,
                chunks,
                n,
            } => format!(
                "ingest  {:>5}  {} ({} chunks)\n",
                format_number(*n),
                source_id,
                chunks
            ),
            IngestEvent::Failed { source_id, reason } => {
                format!("ingest  error  {}: {}\n", source_id, reason)
            }
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Human progress when stderr is a terminal, otherwise none.
pub fn default_reporter() -> Box<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Box::new(StderrProgress)
    } else {
        Box::new(NoProgress)
    }
}
