//! CLI binary for lexishield.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! to `RelayConfig`, then either serves HTTP or runs one extraction/analysis
//! locally.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lexishield::{
    extract_text, run_analysis, AnalysisMode, AnalysisRequest, AppState, HistoryEntry,
    RelayConfig, ResilientClient, RetryPolicy, SystemPromptTable,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API on port 5000
  GEMINI_API_KEY=... lexishield serve --port 5000

  # Print the text of a PDF (no API key needed)
  lexishield extract lease.pdf

  # One-shot analysis
  lexishield analyze lease.pdf --mode asymmetry

  # Ask a question about a document
  lexishield analyze lease.pdf --mode chatbot --question "Can the landlord end the lease early?"

HTTP API:
  POST /upload    multipart field `file` (PDF)     → {"document_text", "page_count"}
  POST /analyze   {"document_text", "analysis_type", "history"?, "question"?}
                                                    → {"analysis_result"}
  GET  /health                                      → {"status", "service", "version", "analyze_enabled"}

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY              Google Gemini API key (required for analysis)
  LEXISHIELD_MODEL            Override model ID
  LEXISHIELD_API_BASE_URL     Override API base URL
  LEXISHIELD_UPLOAD_DIR       Temporary upload directory
  LEXISHIELD_PROMPT_DIR       Directory of <mode>.txt system prompt overrides
  HOST / PORT                 Bind address for `serve`
"#;

/// Legal document analysis relay: PDF text extraction + Gemini analysis.
#[derive(Parser, Debug)]
#[command(
    name = "lexishield",
    version,
    about = "Legal document analysis relay: PDF text extraction + Gemini analysis",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    relay: RelayArgs,

    #[command(flatten)]
    serve: ServeArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "LEXISHIELD_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, global = true, env = "LEXISHIELD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Print the extracted text of a PDF.
    Extract {
        /// Local PDF file.
        input: PathBuf,
    },
    /// Analyze a PDF once and print the result.
    Analyze {
        /// Local PDF file.
        input: PathBuf,
        /// Analysis mode.
        #[arg(short, long, value_enum, default_value = "summary")]
        mode: ModeArg,
        /// Question for chatbot mode.
        #[arg(long)]
        question: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0", global = true)]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5000, global = true)]
    port: u16,
}

#[derive(Args, Debug)]
struct RelayArgs {
    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Gemini model ID.
    #[arg(long, env = "LEXISHIELD_MODEL", default_value = lexishield::config::DEFAULT_MODEL, global = true)]
    model: String,

    /// Generation API base URL.
    #[arg(long, env = "LEXISHIELD_API_BASE_URL", default_value = lexishield::config::DEFAULT_API_BASE_URL, global = true)]
    api_base_url: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "LEXISHIELD_TEMPERATURE", default_value_t = 0.5, global = true)]
    temperature: f32,

    /// Max output tokens per analysis.
    #[arg(long, env = "LEXISHIELD_MAX_OUTPUT_TOKENS", default_value_t = 4096, global = true)]
    max_output_tokens: u32,

    /// Per-attempt API timeout in seconds.
    #[arg(long, env = "LEXISHIELD_API_TIMEOUT", default_value_t = 90, global = true)]
    api_timeout: u64,

    /// Attempts per analysis before giving up.
    #[arg(long, env = "LEXISHIELD_MAX_ATTEMPTS", default_value_t = 3, global = true)]
    max_attempts: u32,

    /// Base backoff in milliseconds (doubles per retry).
    #[arg(long, env = "LEXISHIELD_RETRY_BASE_MS", default_value_t = 1000, global = true)]
    retry_base_ms: u64,

    /// Max random jitter added to each backoff, in milliseconds.
    #[arg(long, env = "LEXISHIELD_RETRY_JITTER_MS", default_value_t = 0, global = true)]
    retry_jitter_ms: u64,

    /// Directory for temporary upload files.
    #[arg(long, env = "LEXISHIELD_UPLOAD_DIR", global = true)]
    upload_dir: Option<PathBuf>,

    /// Max upload size in MiB.
    #[arg(long, env = "LEXISHIELD_MAX_UPLOAD_MB", default_value_t = 25, global = true)]
    max_upload_mb: usize,

    /// Clip document text to this many characters before prompting.
    #[arg(long, env = "LEXISHIELD_MAX_DOCUMENT_CHARS", global = true)]
    max_document_chars: Option<usize>,

    /// Directory with <mode>.txt system prompt overrides.
    #[arg(long, env = "LEXISHIELD_PROMPT_DIR", global = true)]
    prompt_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Summary,
    Jargon,
    Loopholes,
    Asymmetry,
    Chatbot,
}

impl From<ModeArg> for AnalysisMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Summary => AnalysisMode::Summary,
            ModeArg::Jargon => AnalysisMode::Jargon,
            ModeArg::Loopholes => AnalysisMode::Loopholes,
            ModeArg::Asymmetry => AnalysisMode::Asymmetry,
            ModeArg::Chatbot => AnalysisMode::Chatbot,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.relay)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config, &cli.serve).await,
        Command::Extract { input } => {
            let text = extract_local(&input).await?;
            write_stdout(&text)
        }
        Command::Analyze {
            input,
            mode,
            question,
        } => {
            let mode = AnalysisMode::from(mode);
            if mode.is_chat() && question.as_deref().map_or(true, str::is_empty) {
                bail!("--question is required with --mode chatbot");
            }
            if !config.is_api_configured() {
                bail!("GEMINI_API_KEY is not set; analysis needs an API key");
            }
            let text = extract_local(&input).await?;
            let client = ResilientClient::gemini(&config).context("Failed to build API client")?;
            let request = AnalysisRequest::new(text, mode)
                .with_chat(Vec::<HistoryEntry>::new(), question.unwrap_or_default());
            let result = run_analysis(&config, &client, &request)
                .await
                .context("Analysis failed")?;
            write_stdout(&result)
        }
    }
}

/// Map CLI args to `RelayConfig`.
fn build_config(args: &RelayArgs) -> Result<RelayConfig> {
    let mut prompts = SystemPromptTable::builtin();
    if let Some(ref dir) = args.prompt_dir {
        prompts = prompts
            .load_overrides(dir)
            .with_context(|| format!("Failed to load prompt overrides from {:?}", dir))?;
    }

    let retry = RetryPolicy::new(args.max_attempts, Duration::from_millis(args.retry_base_ms))
        .with_jitter(Duration::from_millis(args.retry_jitter_ms));

    let mut builder = RelayConfig::builder()
        .maybe_api_key(args.api_key.clone())
        .model(&args.model)
        .api_base_url(&args.api_base_url)
        .temperature(args.temperature)
        .max_output_tokens(args.max_output_tokens)
        .request_timeout_secs(args.api_timeout)
        .retry(retry)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .max_document_chars(args.max_document_chars)
        .prompts(prompts);
    if let Some(ref dir) = args.upload_dir {
        builder = builder.upload_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

async fn run_server(config: RelayConfig, args: &ServeArgs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;

    info!("Starting lexishield on {} (model {})", addr, config.model);
    info!(
        "Retry policy: {} attempts, {}ms base backoff",
        config.retry.max_attempts,
        config.retry.base_delay.as_millis()
    );

    let state = AppState::new(config).context("Failed to initialise server state")?;
    lexishield::serve(state, addr, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn extract_local(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let extracted = tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .context("Extraction task panicked")?
        .with_context(|| format!("Failed to extract text from {:?}", path))?;
    info!("Extracted {} pages", extracted.page_count);
    Ok(extracted.text)
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
