//! CLI binary for pocket-counsel.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReviewConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pocket_counsel::prompts::DISCLAIMER;
use pocket_counsel::{
    inspect, list_gemini_models, write_atomic, AnalysisPipeline, Document, ProgressCallback, ReviewConfig,
    ReviewProgressCallback, Stage,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner whose message follows the
/// current stage, plus a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_prefix(format!("{stage:?}"));
        self.bar.set_message(format!("{}…", stage.label()));
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let what = match stage {
            Stage::Extraction => "characters read",
            Stage::Analysis | Stage::Negotiation => "characters written",
        };
        self.bar.println(format!(
            "  {} {:<28}  {}  {}",
            green("✓"),
            stage.label(),
            dim(&format!("{output_len:>6} {what}")),
            dim(&self.stage_elapsed()),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // Keep long provider messages on one line.
        let msg = match error.char_indices().nth(80) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {:<28}  {}  {}",
            red("✗"),
            stage.label(),
            red(&msg),
            dim(&self.stage_elapsed()),
        ));
    }

    fn on_review_complete(&self, generated_sections: usize) {
        self.bar.finish_and_clear();
        match generated_sections {
            2 => eprintln!("{} Review complete", green("✔")),
            0 => eprintln!(
                "{} No section could be generated; fallback texts shown",
                red("✘")
            ),
            n => eprintln!(
                "{} {}/2 sections generated; fallback text shown for the rest",
                cyan("⚠"),
                bold(&n.to_string())
            ),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review a contract (Markdown on stdout)
  pocket-counsel analyze --accept-disclaimer lease.pdf

  # Write the review to a file
  pocket-counsel analyze --accept-disclaimer lease.pdf -o review.md

  # JSON output with outcomes, document summary and stats
  pocket-counsel analyze --accept-disclaimer --json lease.pdf > review.json

  # Use a specific provider and model
  pocket-counsel analyze --accept-disclaimer --provider openai --model gpt-4.1-mini lease.pdf

  # Check that the PDF has extractable text (no API key needed)
  pocket-counsel inspect lease.pdf

  # List the Gemini models usable with --model
  pocket-counsel models

  # Serve the HTTP API
  POCKET_COUNSEL_PASSPHRASE=... pocket-counsel serve --port 8080

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. pocket_counsel=debug

This tool does NOT replace a real lawyer.
"#;

/// Review rental contracts with an LLM: risk analysis plus a negotiation letter.
#[derive(Parser, Debug)]
#[command(
    name = "pocket-counsel",
    version,
    about = "Review rental contracts with an LLM: risk analysis plus a negotiation letter",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "POCKET_COUNSEL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "POCKET_COUNSEL_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a contract and draft a negotiation letter.
    Analyze(AnalyzeArgs),
    /// Extract the text only and report page and character counts.
    Inspect(InspectArgs),
    /// List the Gemini models that can generate text with the current key.
    Models(ModelsArgs),
    /// Serve the JSON/multipart HTTP API.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

/// Flags shared by every subcommand that runs reviews.
#[derive(Args, Debug, Clone)]
struct ReviewArgs {
    /// LLM model ID (e.g. gemini-flash-latest, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: gemini, openai, anthropic, mistral, ollama, lmstudio."
    )]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "POCKET_COUNSEL_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "POCKET_COUNSEL_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "POCKET_COUNSEL_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per call on transient LLM failures.
    #[arg(long, env = "POCKET_COUNSEL_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "POCKET_COUNSEL_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Refuse documents with more pages than this.
    #[arg(long, env = "POCKET_COUNSEL_MAX_PAGES", default_value_t = 200)]
    max_pages: usize,

    /// Refuse documents larger than this many bytes.
    #[arg(long, env = "POCKET_COUNSEL_MAX_BYTES", default_value_t = 20 * 1024 * 1024)]
    max_bytes: u64,

    /// Cut the contract text to this many characters before prompting.
    #[arg(long, env = "POCKET_COUNSEL_MAX_PROMPT_CHARS", default_value_t = 200_000)]
    max_prompt_chars: usize,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the review to this file instead of stdout.
    #[arg(short, long, env = "POCKET_COUNSEL_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (ContractReview) instead of Markdown.
    #[arg(long, env = "POCKET_COUNSEL_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "POCKET_COUNSEL_NO_PROGRESS")]
    no_progress: bool,

    /// Acknowledge that this tool does not replace a real lawyer.
    #[arg(long, env = "POCKET_COUNSEL_ACCEPT_DISCLAIMER")]
    accept_disclaimer: bool,

    #[command(flatten)]
    review: ReviewArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF file path.
    input: PathBuf,

    /// Output JSON instead of text.
    #[arg(long)]
    json: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "POCKET_COUNSEL_PASSWORD")]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ModelsArgs {
    /// Output JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind to.
    #[arg(long, env = "POCKET_COUNSEL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "POCKET_COUNSEL_PORT", default_value_t = 8080)]
    port: u16,

    /// Shared passphrase clients send as `Authorization: Bearer …`.
    #[arg(long, env = "POCKET_COUNSEL_PASSPHRASE", hide_env_values = true)]
    passphrase: String,

    /// Allow `?test_mode=true` requests that read a local file path.
    #[arg(long, env = "POCKET_COUNSEL_ALLOW_TEST_MODE")]
    allow_test_mode: bool,

    #[command(flatten)]
    review: ReviewArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Analyze(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    match cli.command {
        Command::Analyze(args) => run_analyze(args, cli.quiet, show_progress).await,
        Command::Inspect(args) => run_inspect(args).await,
        Command::Models(args) => run_models(args).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
    }
}

// ── analyze ──────────────────────────────────────────────────────────────────

async fn run_analyze(args: AnalyzeArgs, quiet: bool, show_progress: bool) -> Result<()> {
    if !args.accept_disclaimer {
        anyhow::bail!(
            "{DISCLAIMER}\nPass --accept-disclaimer (or set POCKET_COUNSEL_ACCEPT_DISCLAIMER=true) to confirm."
        );
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReviewProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args.review, progress_cb)?;
    let pipeline = AnalysisPipeline::from_config(config).context("Could not set up the LLM provider")?;
    let document = Document::from_path(&args.input, pipeline.config().max_document_bytes)
        .await
        .context("Could not read the contract")?;

    let review = pipeline.review(&document).await;

    let rendered = if args.json {
        serde_json::to_string_pretty(&review).context("Failed to serialise review")?
    } else {
        review.to_markdown()
    };

    if let Some(ref output_path) = args.output {
        write_atomic(output_path, &rendered)
            .await
            .context("Failed to write review")?;
        if !quiet {
            eprintln!("   →  {}", bold(&output_path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure a trailing newline on stdout.
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !quiet && !args.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {} calls, {}ms total",
            dim(&review.stats.total_input_tokens.to_string()),
            dim(&review.stats.total_output_tokens.to_string()),
            review.stats.generation_calls,
            review.stats.total_ms,
        );
        if review.stats.prompt_truncated {
            eprintln!(
                "   {} the contract was longer than {} characters and was cut",
                cyan("⚠"),
                args.review.max_prompt_chars
            );
        }
    }

    Ok(())
}

// ── inspect ──────────────────────────────────────────────────────────────────

async fn run_inspect(args: InspectArgs) -> Result<()> {
    let mut builder = ReviewConfig::builder();
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    let summary = inspect(&args.input, &config)
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else {
        println!("File:         {}", args.input.display());
        println!("Size:         {} bytes", summary.byte_len);
        println!("Pages:        {}", summary.page_count);
        println!("Characters:   {}", summary.char_count);
        if summary.char_count == 0 {
            println!("{}", cyan("No extractable text: scanned contracts need OCR first."));
        } else {
            println!(
                "{} Document read successfully ({} characters)",
                green("✔"),
                summary.char_count
            );
        }
    }
    Ok(())
}

// ── models ───────────────────────────────────────────────────────────────────

async fn run_models(args: ModelsArgs) -> Result<()> {
    let models = list_gemini_models()
        .await
        .context("Failed to list Gemini models")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&models).context("Failed to serialise model list")?
        );
        return Ok(());
    }

    for model in &models {
        let limit = model
            .input_token_limit
            .map(|n| format!("{n} input tokens"))
            .unwrap_or_default();
        println!("{:<40} {:<36} {}", bold(&model.id), model.display_name, dim(&limit));
    }
    eprintln!("{} {} models support text generation", green("✔"), models.len());
    Ok(())
}

// ── serve ────────────────────────────────────────────────────────────────────

#[cfg(feature = "server")]
async fn run_serve(args: ServeArgs) -> Result<()> {
    use pocket_counsel::server::{serve, AppState};
    use std::net::SocketAddr;

    let config = build_config(&args.review, None)?;
    let pipeline = AnalysisPipeline::from_config(config).context("Could not set up the LLM provider")?;
    let state = AppState::new(pipeline, &args.passphrase, args.allow_test_mode)
        .context("Invalid server configuration")?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;

    serve(addr, state).await.context("Server failed")?;
    Ok(())
}

/// Map CLI args to `ReviewConfig`.
fn build_config(args: &ReviewArgs, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .max_pages(args.max_pages)
        .max_document_bytes(args.max_bytes)
        .max_prompt_chars(args.max_prompt_chars);

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
