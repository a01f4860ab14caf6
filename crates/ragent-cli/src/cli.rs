//! CLI definition and command dispatch for ragent.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to the engine.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--config`, `--verbose`)
//! 2. Environment variables (`RAGENT_CONFIG`, `RAGENT_VERBOSE`, `RUST_LOG`)
//! 3. Config file (`~/.ragent/config.yaml` or path from `--config`/`RAGENT_CONFIG`)
//! 4. Built-in defaults

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use crate::ui::{format, table, ColorMode, MessageType, Progress, ProgressMode, Style};

use ragent_core::{
    ChatRequest, Citation, Message, Mode, Passage, QueryRequest, RagConfig, RagEngine,
    StreamEvent,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// ragent – retrieval-augmented answering over your own passages
#[derive(Parser, Debug)]
#[command(name = "ragent")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "RAGENT_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.ragent/config.yaml)
    #[arg(long, global = true, env = "RAGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "RAGENT_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer one question from the indexed passages
    #[command(after_help = r#"EXAMPLES:
    # Answer with the default (simple) mode
    ragent ask "What is FAISS?"

    # Expanded, reranked retrieval
    ragent ask "How does hybrid search work?" --mode advanced

    # Keep conversation memory across questions
    ragent ask "And BM25?" --session demo

    # Machine-readable answer
    ragent ask "What is FAISS?" --json | jq '.citations'
"#)]
    Ask {
        /// The question to answer
        query: String,

        /// Retrieval mode: fast, simple or advanced
        #[arg(short, long, default_value = "simple")]
        mode: String,

        /// Session id for conversation memory
        #[arg(short, long)]
        session: Option<String>,

        /// Generation provider (groq, openai, gemini, local)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model name overriding the provider's configured model
        #[arg(long)]
        model: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Stream answers; reads questions from stdin when no message is given
    #[command(after_help = r#"EXAMPLES:
    # One streamed answer
    ragent chat "What is reciprocal rank fusion?"

    # Interactive conversation (empty line or `exit` to quit)
    ragent chat --mode advanced

    # Talk to the model without retrieval
    ragent chat "Tell me a joke" --no-rag

    # One JSON event per line
    ragent chat "What is FAISS?" --json
"#)]
    Chat {
        /// Single message to answer; omit for an interactive session
        message: Option<String>,

        /// Retrieval mode: fast, simple or advanced
        #[arg(short, long, default_value = "simple")]
        mode: String,

        /// Generation provider (groq, openai, gemini, local)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model name overriding the provider's configured model
        #[arg(long)]
        model: Option<String>,

        /// Skip retrieval and answer from the model alone
        #[arg(long)]
        no_rag: bool,

        /// Print every stream event as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Replace the index with passages from a JSONL file
    #[command(after_help = r#"EXAMPLES:
    # One {"content": ..., "metadata": {...}} object per line
    ragent index passages.jsonl
"#)]
    Index {
        /// JSONL file of passages
        file: PathBuf,

        /// Output the index manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the index
    Clear,

    /// List conversation sessions
    Sessions {
        /// Delete every session's history
        #[arg(long)]
        clear: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show (or clear) one session's history
    History {
        /// Session id
        session: String,

        /// Delete this session's history
        #[arg(long)]
        clear: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index state and probe generation providers
    #[command(after_help = r#"EXAMPLES:
    ragent status
    ragent status --json | jq '.providers'
"#)]
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Entry point
// ============================================================================

/// Run the CLI and map the outcome to an exit code.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always; debug with --verbose. RUST_LOG overrides both.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ragent_core={log_level},ragent_cli={log_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color_mode = ColorMode::parse(&cli.color).unwrap_or_default();
    let style = Style::new(color_mode);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!(
                "{}",
                style.message(MessageType::Err, &format!("Failed to start async runtime: {}", e))
            );
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async_main(cli, style, color_mode))
}

async fn async_main(cli: Cli, style: Style, color_mode: ColorMode) -> ExitCode {
    let engine = match build_engine(cli.config.as_deref()).await {
        Ok(engine) => engine,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your global config at ~/.ragent/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context(
                    "Failed to initialize ragent engine",
                    Some(&format!("{:#}", e)),
                    Some(&hint),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Ask {
            query,
            mode,
            session,
            provider,
            model,
            json,
        } => {
            let request = QueryRequest {
                query,
                session_id: session,
                mode: Mode::resolve(&mode),
                provider,
                model,
            };
            handle_ask(&style, &engine, request, json, color_mode).await
        }
        Command::Chat {
            message,
            mode,
            provider,
            model,
            no_rag,
            json,
        } => {
            let template = ChatRequest::new(Vec::new())
                .with_mode(Mode::resolve(&mode))
                .with_rag(!no_rag)
                .with_provider(provider)
                .with_model(model);
            match message {
                Some(message) => handle_chat_once(&style, &engine, template, message, json).await,
                None => handle_chat_interactive(&style, &engine, template, json).await,
            }
        }
        Command::Index { file, json } => handle_index(&style, &engine, &file, json, color_mode).await,
        Command::Clear => handle_clear(&style, &engine).await,
        Command::Sessions { clear, json } => handle_sessions(&style, &engine, clear, json).await,
        Command::History {
            session,
            clear,
            json,
        } => handle_history(&style, &engine, &session, clear, json).await,
        Command::Status { json } => handle_status(&style, &engine, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style.message(MessageType::Err, &format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn build_engine(config_path: Option<&Path>) -> anyhow::Result<RagEngine> {
    let config = RagConfig::load(config_path)?;
    Ok(RagEngine::from_config(config).await?)
}

// ============================================================================
// Command handlers
// ============================================================================

async fn handle_ask(
    style: &Style,
    engine: &RagEngine,
    request: QueryRequest,
    json: bool,
    color_mode: ColorMode,
) -> anyhow::Result<()> {
    let progress = Progress::spinner(
        &format!("Answering ({} mode)...", request.mode),
        ProgressMode::detect(json, color_mode),
    );
    let response = engine.process_query(request).await;
    progress.finish_clear();
    let response = response?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer.trim_end());
    print_citations(style, &response.citations);
    println!();
    println!(
        "{}",
        style.message(
            MessageType::Info,
            &format!(
                "{} ({}) in {}",
                response.provider_used,
                response.model,
                format::format_latency(response.latency())
            )
        )
    );
    Ok(())
}

async fn handle_chat_once(
    style: &Style,
    engine: &RagEngine,
    template: ChatRequest,
    message: String,
    json: bool,
) -> anyhow::Result<()> {
    let request = ChatRequest {
        messages: vec![Message::user(message)],
        ..template
    };
    stream_answer(style, engine, request, json).await?;
    Ok(())
}

async fn handle_chat_interactive(
    style: &Style,
    engine: &RagEngine,
    template: ChatRequest,
    json: bool,
) -> anyhow::Result<()> {
    let mut messages: Vec<Message> = Vec::new();

    if !json {
        eprintln!(
            "{}",
            style.message(MessageType::Hint, "Type a question; an empty line or `exit` quits.")
        );
    }

    loop {
        if !json {
            eprint!("> ");
            std::io::stderr().flush()?;
        }
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|n| (n, line))
        })
        .await??;

        let question = match line {
            (0, _) => break,
            (_, text) => text.trim().to_string(),
        };
        if question.is_empty() || question == "exit" {
            break;
        }

        messages.push(Message::user(question));
        let request = ChatRequest {
            messages: messages.clone(),
            ..template.clone()
        };
        match stream_answer(style, engine, request, json).await {
            Ok(answer) => messages.push(Message::assistant(answer)),
            Err(e) => {
                // Keep the conversation going; drop the unanswered question
                eprintln!("{}", style.message(MessageType::Err, &format!("{:#}", e)));
                messages.pop();
            }
        }
    }
    Ok(())
}

/// Print one streamed answer and return its full text.
async fn stream_answer(
    style: &Style,
    engine: &RagEngine,
    request: ChatRequest,
    json: bool,
) -> anyhow::Result<String> {
    let mut stream = engine.stream_chat(request);
    let mut answer = String::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        }
        match event {
            StreamEvent::Status(stage) => {
                if !json {
                    eprintln!("{}", style.status(stage.label()));
                }
            }
            StreamEvent::Text(fragment) => {
                if !json {
                    write!(stdout, "{}", fragment)?;
                    stdout.flush()?;
                }
                answer.push_str(&fragment);
            }
            StreamEvent::Citations(citations) => {
                if !json {
                    println!();
                    print_citations(style, &citations);
                }
            }
            StreamEvent::Error(message) => bail!(message),
        }
    }

    if !json && !answer.ends_with('\n') {
        println!();
    }
    Ok(answer)
}

async fn handle_index(
    style: &Style,
    engine: &RagEngine,
    file: &Path,
    json: bool,
    color_mode: ColorMode,
) -> anyhow::Result<()> {
    let passages = read_passages(file)?;

    let progress = Progress::spinner(
        &format!("Indexing {} passages...", passages.len()),
        ProgressMode::detect(json, color_mode),
    );
    let manifest = engine.index_documents(passages).await;
    progress.finish_clear();
    let manifest = manifest?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("Indexed {} passages from {}", manifest.passage_count, file.display())
        )
    );
    println!(
        "{}",
        style.message_detail(
            "Embeddings",
            &format!("{} (dim {})", manifest.embedding_model, manifest.dimension)
        )
    );
    if let Some(store) = engine.orchestrator().retriever().store() {
        println!(
            "{}",
            style.message_detail("Stored in", &store.root().display().to_string())
        );
    }
    Ok(())
}

/// Parse one passage per non-empty line.
fn read_passages(file: &Path) -> anyhow::Result<Vec<Passage>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<Passage>(line)
                .with_context(|| format!("{}:{}: not a passage object", file.display(), i + 1))
        })
        .collect()
}

async fn handle_clear(style: &Style, engine: &RagEngine) -> anyhow::Result<()> {
    engine.clear_index().await?;
    println!("{}", style.message(MessageType::Ok, "Index cleared"));
    Ok(())
}

async fn handle_sessions(style: &Style, engine: &RagEngine, clear: bool, json: bool) -> anyhow::Result<()> {
    if clear {
        engine.clear_all_sessions().await;
        if !json {
            println!("{}", style.message(MessageType::Ok, "Cleared all sessions"));
            return Ok(());
        }
    }

    let sessions = engine.list_sessions();
    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", style.message(MessageType::Info, "No sessions."));
        if engine.config().memory.persist_path.is_none() {
            println!(
                "{}",
                style.message(
                    MessageType::Hint,
                    "Set memory.persistPath to keep sessions between runs"
                )
            );
        }
        return Ok(());
    }

    println!("{}", style.section("SESSIONS"));
    println!();
    for id in sessions {
        let turns = engine.history(&id).len() / 2;
        println!("  {}", style.key_value(&id, &format!("{} turns", turns)));
    }
    Ok(())
}

async fn handle_history(
    style: &Style,
    engine: &RagEngine,
    session: &str,
    clear: bool,
    json: bool,
) -> anyhow::Result<()> {
    if clear {
        engine.clear_session(session).await;
        println!(
            "{}",
            style.message(MessageType::Ok, &format!("Cleared session `{}`", session))
        );
        return Ok(());
    }

    let history = engine.history(session);
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Info, &format!("No history for session `{}`.", session))
        );
        return Ok(());
    }

    for message in &history {
        println!("{}", style.key_value(message.role.label(), &message.content));
    }
    Ok(())
}

async fn handle_status(style: &Style, engine: &RagEngine, json: bool) -> anyhow::Result<()> {
    let status = engine.status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", style.section("INDEX"));
    println!();
    if status.index_loaded {
        println!(
            "  {}",
            style.key_value("Passages", &status.passage_count.to_string())
        );
    } else {
        println!("  {}", style.key_value("Passages", "no index loaded"));
    }
    if let Some(dir) = &status.index_dir {
        println!("  {}", style.key_value("Location", &dir.display().to_string()));
    }
    println!(
        "  {}",
        style.key_value(
            "Reranker",
            if status.reranker_enabled { "enabled" } else { "disabled" }
        )
    );
    println!("  {}", style.key_value("Sessions", &status.sessions.to_string()));

    println!();
    println!("{}", style.section("PROVIDERS"));
    println!();
    println!(
        "  {}",
        style.key_value("Default", status.default_provider.as_str())
    );
    if status.providers.is_empty() {
        println!(
            "{}",
            style.message(
                MessageType::Warn,
                "No provider is configured; set an API key or enable providers.local"
            )
        );
    } else {
        println!();
        println!("{}", table::render_providers_table(style, &status.providers));
    }

    if !status.index_loaded {
        println!();
        println!(
            "{}",
            style.message(MessageType::Hint, "Build an index with: ragent index passages.jsonl")
        );
    }
    Ok(())
}

fn print_citations(style: &Style, citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!();
    println!("{}", style.section("SOURCES"));
    println!("{}", table::render_citations_table(style, citations));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_defaults_to_simple_mode() {
        let cli = Cli::try_parse_from(["ragent", "ask", "What is FAISS?"]).unwrap();
        match cli.command {
            Command::Ask { query, mode, json, .. } => {
                assert_eq!(query, "What is FAISS?");
                assert_eq!(Mode::resolve(&mode), Mode::Simple);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_read_passages_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("passages.jsonl");
        std::fs::write(
            &path,
            "{\"content\": \"FAISS is a library.\", \"metadata\": {\"source\": \"doc1\"}}\n\n{\"content\": \"BM25 ranks terms.\"}\n",
        )
        .unwrap();

        let passages = read_passages(&path).unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].metadata.get("source").and_then(|v| v.as_str()), Some("doc1"));
        assert!(passages[1].metadata.is_empty());
    }

    #[test]
    fn test_read_passages_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"content\": \"ok\"}\nnot json\n").unwrap();

        let err = read_passages(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.jsonl:2"));
    }
}
