//! Error types for the pocket-counsel library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`CounselError`] is **fatal**: nothing can be reviewed at all (missing
//!   API credential, unreadable input path, invalid configuration). Returned
//!   as `Err(CounselError)` from constructors and the `review_*` helpers,
//!   normally at startup.
//!
//! * [`ExtractionError`] is **recovered**: the uploaded bytes could not be
//!   turned into text. Stored inside
//!   [`crate::output::AnalysisOutcome::ExtractionFailed`]; no generation call
//!   is made afterwards.
//!
//! * [`GenerationError`] is **recovered**: one remote completion call failed.
//!   Stored inside [`crate::output::FailureResult`] next to the fixed
//!   fallback text, so the caller still renders two populated sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pocket-counsel library.
#[derive(Debug, Error)]
pub enum CounselError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The chosen provider needs an API key that is not set.
    #[error(
        "No API credential for provider '{provider}'.\nSet {} before starting.",
        .env_vars.join(" or ")
    )]
    MissingCredential {
        provider: String,
        env_vars: Vec<String>,
    },

    /// The provider factory refused to build a client.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The document exceeds the configured byte cap.
    #[error("Document is {size} bytes; the limit is {limit} bytes")]
    DocumentTooLarge { size: u64, limit: u64 },

    /// Only returned by [`crate::inspect`]; a review records this as an
    /// outcome instead.
    #[error("Could not read the PDF: {0}")]
    Unreadable(#[from] ExtractionError),

    // ── Provider errors ───────────────────────────────────────────────────
    /// A provider request made outside a review (model listing) failed.
    #[error("Model provider request failed: {0}")]
    ProviderRequest(#[source] GenerationError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CounselError {
    /// True for the configuration tier of the taxonomy: these block every
    /// request and should stop the process at startup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CounselError::MissingCredential { .. }
                | CounselError::ProviderNotConfigured { .. }
                | CounselError::InvalidConfig(_)
        )
    }
}

/// The uploaded bytes could not be turned into text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The bytes do not start with the `%PDF` signature.
    #[error("The file is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The document exceeds the byte cap.
    #[error("The PDF is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The document exceeds the page cap.
    #[error("The PDF has {pages} pages; the limit is {limit}")]
    TooManyPages { pages: usize, limit: usize },

    /// Header, trailer or cross-reference table could not be parsed.
    #[error("The PDF is corrupt or unreadable: {detail}")]
    Corrupt { detail: String },

    /// The PDF is encrypted and no password was supplied.
    #[error("The PDF is encrypted and requires a password")]
    PasswordRequired,

    /// A password was supplied but pdfium rejected it.
    #[error("The password supplied for the PDF is wrong")]
    WrongPassword,

    /// A single page could not be decoded.
    #[error("Page {page} could not be decoded: {detail}")]
    PageDecodeFailed { page: usize, detail: String },

    /// No pdfium library could be bound.
    #[error(
        "PDF engine unavailable: {detail}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    LibraryUnavailable { detail: String },

    /// The extraction task itself failed (panic, cancelled join).
    #[error("Text extraction failed unexpectedly: {detail}")]
    Internal { detail: String },
}

/// A single remote completion call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// Connection, DNS or TLS failure before a response arrived.
    #[error("Network error talking to the model provider: {detail}")]
    Network { detail: String },

    /// The provider rejected the credential (401/403).
    #[error("The model provider rejected the API credential: {detail}")]
    Auth { detail: String },

    /// The provider throttled the request (429).
    #[error("The model provider is rate limiting requests: {detail}")]
    RateLimited { detail: String },

    /// The provider is up but cannot serve right now (5xx, overloaded).
    #[error("The model provider is temporarily unavailable: {detail}")]
    Unavailable { detail: String },

    /// Any other provider-side rejection: invalid model name, content
    /// policy, malformed request.
    #[error("The model provider returned an error: {detail}")]
    Provider { detail: String },

    /// No response within the per-call timeout.
    #[error("The model did not answer within {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered, but with nothing usable.
    #[error("The model returned an empty answer")]
    EmptyCompletion,
}

impl GenerationError {
    /// Classify a provider error message.
    ///
    /// Providers surface status codes and transport failures as free text,
    /// so classification is keyword based. Anything unrecognised becomes
    /// [`GenerationError::Provider`].
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lower = detail.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["429", "rate limit", "rate_limit", "too many requests", "quota"]) {
            GenerationError::RateLimited { detail }
        } else if has(&[
            "401",
            "403",
            "unauthorized",
            "unauthenticated",
            "permission denied",
            "invalid api key",
            "api key not valid",
            "api_key_invalid",
        ]) {
            GenerationError::Auth { detail }
        } else if has(&[
            "500 internal",
            "internal server error",
            "502",
            "503",
            "504",
            "bad gateway",
            "service unavailable",
            "gateway timeout",
            "overloaded",
            "unavailable",
        ]) {
            GenerationError::Unavailable { detail }
        } else if has(&[
            "timed out",
            "timeout",
            "connection",
            "connect error",
            "dns",
            "network",
            "broken pipe",
            "reset by peer",
        ]) {
            GenerationError::Network { detail }
        } else {
            GenerationError::Provider { detail }
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Network { .. }
                | GenerationError::RateLimited { .. }
                | GenerationError::Unavailable { .. }
                | GenerationError::Timeout { .. }
        )
    }

    /// Short machine-readable category, used in logs and HTTP bodies.
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::Network { .. } => "network",
            GenerationError::Auth { .. } => "auth",
            GenerationError::RateLimited { .. } => "rate_limited",
            GenerationError::Unavailable { .. } => "unavailable",
            GenerationError::Provider { .. } => "provider",
            GenerationError::Timeout { .. } => "timeout",
            GenerationError::EmptyCompletion => "empty_completion",
        }
    }
}
