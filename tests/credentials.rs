//! Startup behaviour with no provider credential in the environment.
//!
//! Lives in its own test binary because it clears process-wide variables;
//! the other suites may read them concurrently.

use pocket_counsel::pipeline::llm::resolve_provider;
use pocket_counsel::{review_file, CounselError, ReviewConfig};

const PROVIDER_VARS: &[&str] = &[
    "EDGEQUAKE_LLM_PROVIDER",
    "EDGEQUAKE_PROVIDER",
    "EDGEQUAKE_MODEL",
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

#[tokio::test]
async fn no_credential_is_reported_instead_of_a_mock_provider() {
    for var in PROVIDER_VARS {
        std::env::remove_var(var);
    }

    let err = resolve_provider(&ReviewConfig::default()).err().unwrap();
    match err {
        CounselError::MissingCredential { provider, env_vars } => {
            assert_eq!(provider, "auto");
            assert!(!env_vars.is_empty());
        }
        other => panic!("expected MissingCredential, got {other:?}"),
    }

    // A bad path must not hide the missing credential.
    let err = review_file("/no/such/lease.pdf", &ReviewConfig::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, CounselError::MissingCredential { .. }),
        "got: {err:?}"
    );

    // "test-key" is the factory's placeholder and would yield the mock.
    std::env::set_var("OPENAI_API_KEY", "test-key");
    let err = resolve_provider(&ReviewConfig::default()).err().unwrap();
    std::env::remove_var("OPENAI_API_KEY");
    assert!(matches!(err, CounselError::MissingCredential { .. }), "got: {err:?}");
}
