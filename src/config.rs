//! Configuration types for contract review.
//!
//! All review behaviour is controlled through [`ReviewConfig`], built via its
//! [`ReviewConfigBuilder`]. One struct holds every knob so the same config
//! can be shared between the CLI, the HTTP server and tests, and so the two
//! generation calls of a review always run with identical settings.

use crate::error::CounselError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model identifier used when the caller names none and Gemini is selected.
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

/// Default byte cap for an uploaded contract (20 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Default page cap for an uploaded contract.
pub const DEFAULT_MAX_PAGES: usize = 200;

/// Default cap on extracted characters substituted into the analysis prompt.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 200_000;

/// Configuration for a contract review.
///
/// Built via [`ReviewConfig::builder()`] or using [`ReviewConfig::default()`].
///
/// # Example
/// ```rust
/// use pocket_counsel::ReviewConfig;
///
/// let config = ReviewConfig::builder()
///     .model("gemini-flash-latest")
///     .api_timeout_secs(45)
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// LLM model identifier, e.g. "gemini-flash-latest", "gpt-4.1-mini".
    /// If None, the provider's default from [`crate::pipeline::llm::default_model_for`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Low enough that two runs over the same contract flag the same clauses,
    /// high enough that the negotiation letter does not read like a form.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 2048.
    pub max_tokens: usize,

    /// Retries per call on transient failures (network, 429, timeout). Default: 2.
    ///
    /// Authentication and content-policy rejections are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted contracts.
    pub password: Option<String>,

    /// Byte cap on the uploaded document. Default: 20 MiB.
    pub max_document_bytes: u64,

    /// Page cap on the uploaded document. Default: 200.
    pub max_pages: usize,

    /// Character cap on extracted text placed into the analysis prompt.
    /// Default: 200 000. Longer text is cut and the cut is reported in
    /// [`crate::output::ReviewStats::prompt_truncated`].
    pub max_prompt_chars: usize,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            password: None,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_pages: DEFAULT_MAX_PAGES,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_document_bytes", &self.max_document_bytes)
            .field("max_pages", &self.max_pages)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_document_bytes(mut self, bytes: u64) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    pub fn max_prompt_chars(mut self, chars: usize) -> Self {
        self.config.max_prompt_chars = chars;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, CounselError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 || c.api_timeout_secs > 600 {
            return Err(CounselError::InvalidConfig(format!(
                "API timeout must be 1–600 seconds, got {}",
                c.api_timeout_secs
            )));
        }
        if c.max_tokens == 0 {
            return Err(CounselError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_document_bytes == 0 || c.max_pages == 0 || c.max_prompt_chars == 0 {
            return Err(CounselError::InvalidConfig(
                "Document limits must all be ≥ 1".into(),
            ));
        }
        if matches!(c.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(CounselError::InvalidConfig(
                "Model identifier must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}
