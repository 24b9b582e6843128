//! # pocket-counsel
//!
//! Review a residential rental contract with a large language model: a risk
//! analysis for the tenant, then a negotiation letter to the landlord.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     uploaded bytes, or a local file under a size cap
//!  ├─ 2. Extract   PDF → text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Analyse   1st model call: dangerous clauses / points of attention / verdict
//!  ├─ 4. Negotiate 2nd model call, fed with the analysis (or its fallback)
//!  └─ 5. Output    two rendered sections + document summary + stats
//! ```
//!
//! A failed model call never aborts a review. Its section is replaced by a
//! fixed fallback text, so both sections are always populated. Only
//! configuration and input-path problems are returned as `Err`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pocket_counsel::{review_file, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ReviewConfig::default();
//!     let review = review_file("lease.pdf", &config).await?;
//!     println!("{}", review.to_markdown());
//!     eprintln!("calls: {}, tokens: {} in / {} out",
//!         review.stats.generation_calls,
//!         review.stats.total_input_tokens,
//!         review.stats.total_output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pocket-counsel` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`] and the `serve` subcommand (axum + tower-http) |
//!
//! Disable both when using only the library:
//! ```toml
//! pocket-counsel = { version = "0.1", default-features = false }
//! ```
//!
//! This tool does not replace a lawyer, and the model's legal judgement is
//! not checked. Contract text can try to steer the model; the prompts fence
//! it and ask the model to treat it as data, which is best-effort only.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod access;
pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use access::{AccessDenied, AccessGate, RequestContext};
pub use analyze::{inspect, review_bytes, review_file, review_to_file, write_atomic, AnalysisPipeline};
pub use config::{ReviewConfig, ReviewConfigBuilder, DEFAULT_MODEL};
pub use error::{CounselError, ExtractionError, GenerationError};
pub use output::{
    AnalysisOutcome, Completion, ContractReview, DocumentSummary, FailureResult,
    NegotiationOutcome, ReviewStats,
};
pub use pipeline::extract::{ExtractedText, PdfiumExtractor, TextExtractor};
pub use pipeline::input::Document;
pub use pipeline::llm::{list_gemini_models, AvailableModel, GenerationClient, LlmClient};
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback, Stage};
