//! Generation: send one prompt to the model provider and wait for the answer.
//!
//! The pipeline talks to a [`GenerationClient`], not to `edgequake-llm`
//! directly, so tests can script completions and failures. [`LlmClient`] is
//! the production implementation on top of an [`LLMProvider`].
//!
//! All prompt engineering lives in [`crate::prompts`]; this module only adds
//! the per-call timeout, the retry loop and the error classification.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Exponential backoff (`retry_backoff_ms * 2^attempt`): with 500 ms
//! base and 2 retries the wait sequence is 500 ms → 1 s. Credential and
//! provider rejections are returned at once since a retry cannot fix them.

use crate::config::{ReviewConfig, DEFAULT_MODEL};
use crate::error::{CounselError, GenerationError};
use crate::output::Completion;
use async_trait::async_trait;
use edgequake_llm::providers::gemini::GeminiModelsResponse;
use edgequake_llm::{ChatMessage, CompletionOptions, GeminiProvider, LLMProvider, ProviderFactory};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Provider selected when no other hint is available and a Gemini key is set.
pub const GEMINI_PROVIDER: &str = "gemini";

/// Sends a prompt and returns the model's answer.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Completion, GenerationError>;
}

/// [`GenerationClient`] backed by an `edgequake-llm` provider.
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl LlmClient {
    /// Wrap an already-built provider with the config's call settings.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ReviewConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve the provider (see [`resolve_provider`]) and wrap it.
    ///
    /// Fails when no credential is available, so a misconfigured process
    /// stops before it accepts any document.
    pub fn from_config(config: &ReviewConfig) -> Result<Self, CounselError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn attempt(&self, prompt: &str) -> Result<Completion, GenerationError> {
        let messages = [ChatMessage::user(prompt)];
        let start = Instant::now();

        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| GenerationError::Timeout {
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| GenerationError::classify(e.to_string()))?;

        let duration = start.elapsed();
        debug!(
            "Completion: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens, response.completion_tokens, duration
        );

        Ok(Completion {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
            duration_ms: duration.as_millis() as u64,
            retries: 0,
        })
    }
}

#[async_trait]
impl GenerationClient for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<Completion, GenerationError> {
        let (result, retries) =
            with_retries(self.max_retries, self.retry_backoff_ms, |_| self.attempt(prompt)).await;
        result.map(|mut completion| {
            completion.retries = retries;
            completion
        })
    }
}

/// Run `call` until it succeeds, fails permanently, or `max_retries` retries
/// have been spent.
///
/// Returns the last result and the number of retries used. Only errors for
/// which [`GenerationError::is_transient`] holds are retried.
pub async fn with_retries<T, F, Fut>(
    max_retries: u32,
    retry_backoff_ms: u64,
    mut call: F,
) -> (Result<T, GenerationError>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let backoff = retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!("Retry {}/{} after {}ms", attempt, max_retries, backoff);
            sleep(Duration::from_millis(backoff)).await;
        }

        match call(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if e.is_transient() && attempt < max_retries => {
                warn!("Attempt {} failed ({}): {}", attempt + 1, e.category(), e);
                attempt += 1;
            }
            Err(e) => {
                warn!("Attempt {} failed ({}): {}", attempt + 1, e.category(), e);
                return (Err(e), attempt);
            }
        }
    }
}

/// Build `CompletionOptions` from the review config.
fn build_options(config: &ReviewConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────────

/// API-key variables read by the provider factory for `provider`.
///
/// Local providers (ollama, lmstudio) need none; unknown names return an
/// empty list and are left to the factory to judge.
pub fn credential_env_vars(provider: &str) -> &'static [&'static str] {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => &["GEMINI_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        _ => &[],
    }
}

/// Model used for `provider` when the caller names none.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => "gpt-4.1-mini",
        "anthropic" => "claude-3-5-haiku-latest",
        "mistral" => "mistral-small-latest",
        "ollama" => "llama3.2",
        _ => DEFAULT_MODEL,
    }
}

/// Fail with [`CounselError::MissingCredential`] unless one of the
/// provider's API-key variables is set to a non-blank value.
pub fn require_credential(provider: &str) -> Result<(), CounselError> {
    require_credential_with(provider, &|var| std::env::var(var).ok())
}

fn require_credential_with(
    provider: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), CounselError> {
    let vars = credential_env_vars(provider);
    if vars.is_empty() {
        return Ok(());
    }
    let present = vars
        .iter()
        .any(|var| lookup(var).is_some_and(|v| !v.trim().is_empty()));
    if present {
        Ok(())
    } else {
        Err(CounselError::MissingCredential {
            provider: provider.to_string(),
            env_vars: vars.iter().map(|v| v.to_string()).collect(),
        })
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, CounselError> {
    info!("Using provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CounselError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Variables that let `ProviderFactory::from_env` find a real provider.
///
/// When none is set the factory would fall back to its mock provider, so
/// resolution stops before calling it.
const AUTO_DETECT_ENV_VARS: &[&str] = &[
    "EDGEQUAKE_LLM_PROVIDER",
    "OLLAMA_HOST",
    "OLLAMA_MODEL",
    "LMSTUDIO_HOST",
    "LMSTUDIO_MODEL",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "MISTRAL_API_KEY",
    "AZURE_OPENAI_CONTENTGEN_API_KEY",
    "AZURE_OPENAI_API_KEY",
    "XAI_API_KEY",
    "HF_TOKEN",
    "HUGGINGFACE_TOKEN",
    "OPENROUTER_API_KEY",
    "OPENAI_API_KEY",
];

/// Name reported by the factory's canned-response provider.
pub const MOCK_PROVIDER: &str = "mock";

fn no_credential_found() -> CounselError {
    CounselError::MissingCredential {
        provider: "auto".to_string(),
        env_vars: [
            "GEMINI_API_KEY",
            "OPENAI_API_KEY",
            "ANTHROPIC_API_KEY",
            "MISTRAL_API_KEY",
        ]
        .iter()
        .map(|v| v.to_string())
        .collect(),
    }
}

/// Refuse the mock provider unless it was asked for by name.
fn reject_implicit_mock(
    provider: Arc<dyn LLMProvider>,
    requested: bool,
) -> Result<Arc<dyn LLMProvider>, CounselError> {
    if provider.name() == MOCK_PROVIDER && !requested {
        warn!("Auto-detection only found the mock provider; refusing it");
        return Err(no_credential_found());
    }
    Ok(provider)
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`): its API key must be set;
///    the model is `config.model` or [`default_model_for`] the provider.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 4. **Gemini key** (`GEMINI_API_KEY`) → `gemini` with `config.model` or
///    [`DEFAULT_MODEL`].
/// 5. **Full auto-detection** (`ProviderFactory::from_env`), attempted only
///    when a key or a local-provider host is set. The mock provider is
///    accepted only when `EDGEQUAKE_LLM_PROVIDER=mock` or `--provider mock`.
///
/// Nothing found → [`CounselError::MissingCredential`].
pub fn resolve_provider(config: &ReviewConfig) -> Result<Arc<dyn LLMProvider>, CounselError> {
    resolve_provider_with(config, &|var| std::env::var(var).ok())
}

fn resolve_provider_with(
    config: &ReviewConfig,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LLMProvider>, CounselError> {
    let non_blank = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        require_credential_with(name, lookup)?;
        let model = config.model.as_deref().unwrap_or_else(|| default_model_for(name));
        return create_provider(name, model);
    }

    // 3) EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    let env_provider = non_blank("EDGEQUAKE_LLM_PROVIDER");
    if let (Some(prov), Some(model)) = (env_provider.as_deref(), non_blank("EDGEQUAKE_MODEL")) {
        return create_provider(prov, &model);
    }

    // 4) Gemini key present
    if require_credential_with(GEMINI_PROVIDER, lookup).is_ok() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(GEMINI_PROVIDER, model);
    }

    // 5) Whatever the factory can find, if there is anything to find
    if !AUTO_DETECT_ENV_VARS.iter().any(|var| non_blank(var).is_some()) {
        debug!("No provider key or local host in the environment");
        return Err(no_credential_found());
    }
    let mock_requested = env_provider
        .as_deref()
        .is_some_and(|p| p.trim().eq_ignore_ascii_case(MOCK_PROVIDER));
    match ProviderFactory::from_env() {
        Ok((llm_provider, _embedding)) => reject_implicit_mock(llm_provider, mock_requested),
        Err(e) => {
            debug!("Provider auto-detection failed: {}", e);
            Err(no_credential_found())
        }
    }
}

// ── Model listing ────────────────────────────────────────────────────────────

/// Generation method a Gemini model must support to be usable here.
const GENERATE_CONTENT: &str = "generateContent";

/// A Gemini model that can answer text prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableModel {
    /// Identifier accepted by `--model` (without the `models/` prefix).
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_token_limit: Option<u32>,
}

/// List the Gemini models the configured key can use for generation.
///
/// # Errors
/// [`CounselError::MissingCredential`] without `GEMINI_API_KEY`;
/// [`CounselError::ProviderRequest`] when the listing call fails.
pub async fn list_gemini_models() -> Result<Vec<AvailableModel>, CounselError> {
    require_credential(GEMINI_PROVIDER)?;
    let provider =
        GeminiProvider::from_env().map_err(|e| CounselError::ProviderNotConfigured {
            provider: GEMINI_PROVIDER.to_string(),
            hint: e.to_string(),
        })?;
    let response = provider
        .list_models()
        .await
        .map_err(|e| CounselError::ProviderRequest(GenerationError::classify(e.to_string())))?;
    let models = generation_models(response);
    info!("{} Gemini models support {}", models.len(), GENERATE_CONTENT);
    Ok(models)
}

/// Keep the models that support `generateContent`, sorted by id.
fn generation_models(response: GeminiModelsResponse) -> Vec<AvailableModel> {
    let mut models: Vec<AvailableModel> = response
        .models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_CONTENT))
        .map(|m| AvailableModel {
            id: m.name.strip_prefix("models/").unwrap_or(&m.name).to_string(),
            display_name: m.display_name,
            input_token_limit: m.input_token_limit,
        })
        .collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    models
}
