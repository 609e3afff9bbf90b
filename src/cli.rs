//! Interactive terminal front end (`ragbot chat`).
//!
//! Startup prints a configuration summary, then walks through an optional
//! knowledge-base setup (load the documents folder, scrape pages) before
//! entering the chat loop. Input and output are generic so the whole flow
//! can be driven from a script.
//!
//! Chat loop commands:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `exit`, `quit` | leave |
//! | `help` | list commands and tools |
//! | `stats` | chunk and document counts |
//! | `rag on`, `rag off` | toggle retrieval |
//! | `clear` | start a new conversation |
//! | anything else | one chat turn |

use std::io::{self, BufRead, Write};

use anyhow::Result;
use console::{measure_text_width, style};
use ragbot_core::agent::TurnOutcome;
use ragbot_core::error::ConfigError;

use crate::app::App;
use crate::config::Config;
use crate::knowledge::FolderIngest;
use crate::progress::StderrProgress;

/// One line of chat-loop input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Exit,
    Help,
    Stats,
    Rag(bool),
    Clear,
    Chat(String),
}

pub fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    let lower = trimmed.to_ascii_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    match words.as_slice() {
        [] => ReplCommand::Empty,
        ["exit"] | ["quit"] => ReplCommand::Exit,
        ["help"] => ReplCommand::Help,
        ["stats"] => ReplCommand::Stats,
        ["clear"] => ReplCommand::Clear,
        ["rag", "on"] => ReplCommand::Rag(true),
        ["rag", "off"] => ReplCommand::Rag(false),
        _ => ReplCommand::Chat(trimmed.to_string()),
    }
}

/// Draw `body` inside a rounded box with `title` in the top border.
pub fn panel(title: &str, body: &str) -> String {
    let lines: Vec<&str> = body.trim_end_matches('\n').lines().collect();
    let inner = lines
        .iter()
        .map(|l| measure_text_width(l))
        .chain(std::iter::once(measure_text_width(title) + 2))
        .max()
        .unwrap_or(0)
        + 2;

    let mut out = String::new();
    let title_width = measure_text_width(title) + 2;
    out.push_str(&format!(
        "╭─ {} {}╮\n",
        title,
        "─".repeat(inner.saturating_sub(title_width + 1))
    ));
    for line in lines {
        let pad = inner - 2 - measure_text_width(line);
        out.push_str(&format!("│ {}{} │\n", line, " ".repeat(pad)));
    }
    out.push_str(&format!("╰{}╯\n", "─".repeat(inner)));
    out
}

/// The panel shown when configuration is missing or invalid.
pub fn config_error_panel(err: &ConfigError) -> String {
    let mut body = String::new();
    for problem in err.problems() {
        match problem {
            ConfigError::Missing { key, description } => {
                body.push_str(&format!("✗ {} is not set ({})\n", key, description));
            }
            other => body.push_str(&format!("✗ {}\n", other)),
        }
    }
    body.push_str("\nSet the variables in the environment or in the config file.");
    panel("Configuration error", &body)
}

/// Print [`config_error_panel`] to stderr.
pub fn print_config_error(err: &ConfigError) {
    eprint!("{}", style(config_error_panel(err)).red());
}

/// Model, embeddings and tracing at a glance.
pub fn config_summary(config: &Config, tracing_project: Option<&str>) -> String {
    let tracing = match tracing_project {
        Some(project) => format!("on (project {})", project),
        None => "off".to_string(),
    };
    let mut body = String::new();
    body.push_str(&format!("Model:       {}\n", config.model.name));
    body.push_str(&format!("Embeddings:  {}\n", config.embedding.model_name()));
    body.push_str(&format!("Store:       {}\n", config.store.path.display()));
    body.push_str(&format!("Documents:   {}\n", config.documents.folder.display()));
    body.push_str(&format!("Tracing:     {}\n", tracing));
    body.push_str(&format!(
        "Retrieval:   {}",
        if config.agent.rag_enabled { "on" } else { "off" }
    ));
    panel("ragbot", &body)
}

/// Line-oriented prompts over any reader/writer pair.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn print(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        self.output.write_all(text.as_ref().as_bytes())?;
        self.output.flush()
    }

    pub fn println(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        self.print(format!("{}\n", text.as_ref()))
    }

    /// Show `prompt` and read one line. `None` at end of input.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.print(format!("{}: ", prompt))?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Yes/no question. Empty input takes `default`; end of input is "no".
    pub fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{} {}", question, hint))? else {
                return Ok(false);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.println("Please answer y or n.")?,
            }
        }
    }
}

/// Run the full interactive session on stdin/stdout.
pub async fn run_chat(app: App) -> Result<()> {
    let mut console = Console::stdio();
    run_with(&app, &mut console).await
}

/// Summary, guided setup, then the chat loop.
pub async fn run_with<R: BufRead, W: Write>(app: &App, console: &mut Console<R, W>) -> Result<()> {
    console.print(config_summary(&app.config, app.tracer.project()))?;
    console.println("")?;
    guided_setup(app, console).await?;
    chat_loop(app, console).await
}

async fn guided_setup<R: BufRead, W: Write>(app: &App, console: &mut Console<R, W>) -> Result<()> {
    if !console.confirm("Set up the knowledge base?", true)? {
        return Ok(());
    }

    let folder = app.kb.documents_folder().display().to_string();
    if app.kb.folder_has_documents() {
        if console.confirm(&format!("Load documents from {}?", folder), true)? {
            match app.kb.load_documents_with_progress(&StderrProgress).await {
                Ok(report) => console.print(folder_report(&report))?,
                Err(e) => console.println(error_line(&e))?,
            }
        }
    } else {
        console.println(format!(
            "No documents found in {}. Add files there to load them later.",
            folder
        ))?;
    }

    if console.confirm("Scrape a website?", false)? {
        loop {
            let Some(url) = console.ask("Enter website URL (or 'skip')")? else {
                break;
            };
            if matches!(url.to_ascii_lowercase().as_str(), "" | "skip" | "no" | "exit") {
                break;
            }
            match app.kb.scrape(&url).await {
                Ok(page) => console.println(format!(
                    "{} {} \"{}\" ({} chunks)",
                    style("✓").green(),
                    page.url,
                    page.title,
                    page.chunks
                ))?,
                Err(e) => console.println(format!("{} {}", style("✗").red(), e))?,
            }
            if !console.confirm("Scrape another website?", false)? {
                break;
            }
        }
    }

    console.println("")?;
    match app.kb.stats().await {
        Ok(stats) => console.print(panel("Knowledge base", &stats.render()))?,
        Err(e) => console.println(error_line(&e))?,
    }
    Ok(())
}

/// A store or loader failure, shown in the transcript instead of ending it.
fn error_line(err: &anyhow::Error) -> String {
    style(format!("✗ {:#}", err)).red().to_string()
}

/// Summary lines after loading the documents folder.
pub fn folder_report(report: &FolderIngest) -> String {
    let mut out = format!(
        "Loaded {} documents ({} chunks) from {}",
        report.documents, report.chunks, report.folder
    );
    if report.skipped > 0 {
        out.push_str(&format!(", skipped {} unsupported files", report.skipped));
    }
    out.push('\n');
    for f in &report.failures {
        out.push_str(&format!("  {} {}: {}\n", style("✗").red(), f.source, f.reason));
    }
    out
}

async fn chat_loop<R: BufRead, W: Write>(app: &App, console: &mut Console<R, W>) -> Result<()> {
    let mut session = app.new_session();
    console.println(format!(
        "\nType a question, or {} for commands.",
        style("help").bold()
    ))?;

    loop {
        console.print(format!("\n{} ", style("You:").cyan().bold()))?;
        let mut line = String::new();
        if console.input.read_line(&mut line)? == 0 {
            break;
        }

        match parse_command(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => console.print(help_text(app))?,
            ReplCommand::Stats => match store_counts(app).await {
                Ok((chunks, documents)) => console.println(format!(
                    "Knowledge base contains {} document chunks from {} sources.",
                    chunks, documents
                ))?,
                Err(e) => console.println(error_line(&e))?,
            },
            ReplCommand::Rag(on) => {
                session.rag_enabled = on;
                console.println(format!("Retrieval {}.", if on { "enabled" } else { "disabled" }))?;
            }
            ReplCommand::Clear => {
                let rag = session.rag_enabled;
                session = app.new_session();
                session.rag_enabled = rag;
                console.println("Conversation cleared.")?;
            }
            ReplCommand::Chat(input) => {
                let outcome = app.chat(&mut session, &input).await;
                console.print(render_outcome(&outcome))?;
            }
        }
    }

    console.println("Goodbye!")?;
    Ok(())
}

async fn store_counts(app: &App) -> Result<(usize, usize)> {
    Ok((app.kb.chunk_count().await?, app.kb.document_count().await?))
}

fn help_text(app: &App) -> String {
    let mut out = String::from("Commands:\n");
    for (cmd, what) in [
        ("exit, quit", "leave the chat"),
        ("help", "show this list"),
        ("stats", "knowledge base counts"),
        ("rag on|off", "toggle retrieval"),
        ("clear", "start a new conversation"),
    ] {
        out.push_str(&format!("  {:<12} {}\n", cmd, what));
    }
    out.push_str("\nTools the assistant can use:\n");
    for tool in app.agent.tools().tools() {
        out.push_str(&format!("  {:<26} {}\n", tool.name(), tool.description()));
    }
    out
}

fn render_outcome(outcome: &TurnOutcome) -> String {
    let mut out = String::new();
    for call in &outcome.tool_calls {
        let mark = if call.ok { style("→").dim() } else { style("✗").red() };
        out.push_str(&format!("{} {}\n", mark, style(&call.name).dim()));
    }
    let label = style("Assistant:").green().bold();
    if outcome.is_error() {
        out.push_str(&format!("{} {}\n", label, style(&outcome.reply).red()));
    } else {
        out.push_str(&format!("{} {}\n", label, outcome.reply));
    }
    if !outcome.retrieved.is_empty() {
        let mut sources: Vec<&str> = outcome.retrieved.iter().map(|c| c.source_id.as_str()).collect();
        sources.dedup();
        out.push_str(&format!("{}\n", style(format!("Sources: {}", sources.join(", "))).dim()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ragbot_core::agent::{ChatModel, ModelReply, ToolSpec};
    use ragbot_core::embedding::Embedder;
    use ragbot_core::models::{ConversationTurn, Document, EmbeddedChunk, ScoredChunk, StoredDocument};
    use ragbot_core::store::VectorStore;
    use tempfile::TempDir;

    use crate::trace::Tracer;

    /// Every operation fails, as a store on an unplugged disk would.
    struct OfflineStore;

    #[async_trait]
    impl VectorStore for OfflineStore {
        async fn replace_source(&self, _: &Document, _: &[EmbeddedChunk], _: &str) -> Result<()> {
            anyhow::bail!("store offline")
        }
        async fn nearest(&self, _: &[f32], _: usize) -> Result<Vec<ScoredChunk>> {
            anyhow::bail!("store offline")
        }
        async fn chunk_count(&self) -> Result<usize> {
            anyhow::bail!("store offline")
        }
        async fn document_count(&self) -> Result<usize> {
            anyhow::bail!("store offline")
        }
        async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
            anyhow::bail!("store offline")
        }
        async fn remove_source(&self, _: &str) -> Result<bool> {
            anyhow::bail!("store offline")
        }
        async fn clear(&self) -> Result<()> {
            anyhow::bail!("store offline")
        }
    }

    struct ZeroEmbedder;

    #[async_trait]
    impl Embedder for ZeroEmbedder {
        fn model_name(&self) -> &str {
            "zero"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, messages: &[ConversationTurn], _: &[ToolSpec]) -> Result<ModelReply> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ModelReply::Text(format!("you said {}", last)))
        }
    }

    #[tokio::test]
    async fn store_failures_keep_the_session_alive() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "some notes").unwrap();
        let mut config = Config::default();
        config.documents.folder = tmp.path().to_path_buf();
        let app = App::with_parts(
            config,
            Arc::new(ZeroEmbedder),
            Arc::new(OfflineStore),
            Arc::new(EchoModel),
            Tracer::disabled(),
        )
        .unwrap();

        let input = Cursor::new("y\ny\nn\nstats\nhello\nexit\n");
        let mut console = Console::new(input, Vec::new());
        run_with(&app, &mut console).await.unwrap();

        let out = String::from_utf8(console.into_output()).unwrap();
        assert!(out.contains("notes.txt: store write failed"), "{}", out);
        assert!(out.matches("store offline").count() >= 3, "{}", out);
        assert!(out.contains("you said hello"), "{}", out);
        assert!(out.trim_end().ends_with("Goodbye!"), "{}", out);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   \n"), ReplCommand::Empty);
        assert_eq!(parse_command("EXIT"), ReplCommand::Exit);
        assert_eq!(parse_command("quit\n"), ReplCommand::Exit);
        assert_eq!(parse_command("rag  off"), ReplCommand::Rag(false));
        assert_eq!(parse_command("Rag On"), ReplCommand::Rag(true));
        assert_eq!(
            parse_command("  what is rag?  "),
            ReplCommand::Chat("what is rag?".into())
        );
        assert_eq!(parse_command("clear the cache"), ReplCommand::Chat("clear the cache".into()));
    }

    #[test]
    fn panel_lines_align() {
        let text = panel("Title", "short\na much longer line");
        let widths: Vec<usize> = text.lines().map(measure_text_width).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{}", text);
        assert!(text.starts_with("╭─ Title "));
    }

    #[test]
    fn config_error_lists_each_missing_key() {
        let err = ConfigError::Many(vec![
            ConfigError::Missing {
                key: "OPENAI_API_KEY",
                description: "API key for the language model provider",
            },
            ConfigError::Missing {
                key: "LANGCHAIN_PROJECT",
                description: "project name for conversation tracing",
            },
        ]);
        let text = config_error_panel(&err);
        assert!(text.contains("Configuration error"));
        assert!(text.contains("OPENAI_API_KEY is not set"));
        assert!(text.contains("LANGCHAIN_PROJECT is not set"));
    }

    #[test]
    fn confirm_defaults_and_retries() {
        let mut console = Console::new(&b"\nmaybe\nn\n"[..], Vec::new());
        assert!(console.confirm("Go?", true).unwrap());
        assert!(!console.confirm("Go?", true).unwrap());
        assert!(!console.confirm("Go?", true).unwrap());
        let out = String::from_utf8(console.into_output()).unwrap();
        assert!(out.contains("Please answer y or n."));
    }

    #[test]
    fn summary_shows_tracing_state() {
        let config = Config::default();
        assert!(config_summary(&config, None).contains("Tracing:     off"));
        assert!(config_summary(&config, Some("demo")).contains("on (project demo)"));
    }
}
