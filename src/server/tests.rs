//! HTTP endpoint integration tests using axum-test

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::{router, AppState};
use crate::analyze::AnalysisPipeline;
use crate::config::ReviewConfig;
use crate::error::{ExtractionError, GenerationError};
use crate::output::Completion;
use crate::pipeline::extract::{check_signature, ExtractedText, TextExtractor};
use crate::pipeline::llm::GenerationClient;
use crate::prompts::{ANALYSIS_FALLBACK, NEGOTIATION_FALLBACK};

const PASSPHRASE: &str = "advogado123";
const ANALYSIS: &str = "Dangerous Clauses: Clause 5 imposes an abusive 50% penalty...";

/// Accepts anything with a PDF signature and returns its tail as text.
struct SignatureText;

impl TextExtractor for SignatureText {
    fn extract(&self, pdf: &[u8]) -> Result<ExtractedText, ExtractionError> {
        check_signature(pdf)?;
        Ok(ExtractedText {
            text: String::from_utf8_lossy(&pdf[4..]).into_owned(),
            page_count: 1,
        })
    }
}

/// Answers every prompt the same way.
struct Always(Result<&'static str, GenerationError>);

#[async_trait]
impl GenerationClient for Always {
    async fn generate(&self, _prompt: &str) -> Result<Completion, GenerationError> {
        self.0.clone().map(|text| Completion {
            text: text.to_string(),
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 1,
            retries: 0,
        })
    }
}

fn server_with(client: Always, allow_test_mode: bool, max_document_bytes: u64) -> TestServer {
    let config = ReviewConfig::builder()
        .max_document_bytes(max_document_bytes)
        .build()
        .unwrap();
    let pipeline = AnalysisPipeline::new(config, Arc::new(SignatureText), Arc::new(client));
    let state = AppState::new(pipeline, PASSPHRASE, allow_test_mode).unwrap();
    TestServer::new(router(state)).unwrap()
}

fn create_test_server() -> TestServer {
    server_with(Always(Ok(ANALYSIS)), false, 1024 * 1024)
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn upload(disclaimer: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("disclaimer_accepted", disclaimer.to_string())
        .add_part(
            "file",
            Part::bytes(b"%PDF-1.4 Clause 5: 50% penalty on early termination.".to_vec())
                .file_name("lease.pdf")
                .mime_type("application/pdf"),
        )
}

#[tokio::test]
async fn test_health_returns_200() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "pocket-counsel");
}

#[tokio::test]
async fn test_login_accepts_passphrase() {
    let server = create_test_server();
    let response = server
        .post("/api/login")
        .json(&json!({ "passphrase": PASSPHRASE }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<serde_json::Value>(),
        json!({ "authenticated": true })
    );
}

#[tokio::test]
async fn test_login_rejects_wrong_passphrase() {
    let server = create_test_server();
    let response = server
        .post("/api/login")
        .json(&json!({ "passphrase": "guess" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_analyze_requires_passphrase() {
    let server = create_test_server();
    let response = server
        .post("/api/analyze")
        .multipart(upload("true"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_analyze_requires_disclaimer() {
    let server = create_test_server();
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(upload("false"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "DISCLAIMER_REQUIRED"
    );
}

#[tokio::test]
async fn test_analyze_returns_both_sections() {
    let server = create_test_server();
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(upload("true"))
        .await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["success"], true);
    assert_eq!(json["analysis"]["status"], "success");
    assert_eq!(json["analysis"]["text"], ANALYSIS);
    assert_eq!(json["negotiation"]["status"], "success");
    assert!(json["analysis"].get("error").is_none());
    assert_eq!(json["document"]["name"], "lease.pdf");
    assert_eq!(json["stats"]["generation_calls"], 2);
    assert!(json["markdown"].as_str().unwrap().contains(ANALYSIS));
}

#[tokio::test]
async fn test_generation_failure_is_still_200() {
    let server = server_with(
        Always(Err(GenerationError::Auth {
            detail: "API key not valid".into(),
        })),
        false,
        1024 * 1024,
    );
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(upload("true"))
        .await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["analysis"]["status"], "failure");
    assert_eq!(json["analysis"]["text"], ANALYSIS_FALLBACK);
    assert!(json["analysis"]["error"]
        .as_str()
        .unwrap()
        .contains("API key not valid"));
    assert_eq!(json["negotiation"]["text"], NEGOTIATION_FALLBACK);
}

#[tokio::test]
async fn test_non_pdf_upload_is_an_extraction_outcome() {
    let server = create_test_server();
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_part("file", Part::bytes(b"not a pdf".to_vec()).file_name("notes.txt"));
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["analysis"]["status"], "extraction_failed");
    assert_eq!(json["negotiation"]["status"], "not_attempted");
    assert_eq!(json["stats"]["generation_calls"], 0);
}

#[tokio::test]
async fn test_missing_file_is_bad_request() {
    let server = create_test_server();
    let form = MultipartForm::new().add_text("disclaimer_accepted", "true");
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status_bad_request();
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "INVALID_REQUEST"
    );
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let server = server_with(Always(Ok(ANALYSIS)), false, 1024);
    let mut big = b"%PDF-1.4 ".to_vec();
    big.resize(64 * 1024, b'a');
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_part("file", Part::bytes(big).file_name("huge.pdf"));
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_upload_just_over_cap_is_413() {
    // Under the cap plus multipart overhead, so only the handler can refuse it.
    let server = server_with(Always(Ok(ANALYSIS)), false, 1024);
    let mut big = b"%PDF-1.4 ".to_vec();
    big.resize(4 * 1024, b'a');
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_part("file", Part::bytes(big).file_name("big.pdf"));
    let response = server
        .post("/api/analyze")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "PAYLOAD_TOO_LARGE"
    );
}

#[tokio::test]
async fn test_mode_without_passphrase_is_401() {
    let server = create_test_server();
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_text("file_path", "/etc/hosts");
    let response = server
        .post("/api/analyze?test_mode=true")
        .multipart(form)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<serde_json::Value>()["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_mode_flag_accepts_numeric_spelling() {
    let server = create_test_server();
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_text("file_path", "/etc/hosts");
    let response = server
        .post("/api/analyze?test_mode=1")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "TEST_MODE_DISABLED");
}

#[tokio::test]
async fn test_mode_off_value_is_a_normal_upload() {
    let server = create_test_server();
    let response = server
        .post("/api/analyze?test_mode=no")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(upload("true"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["analysis"]["status"], "success");
}

#[tokio::test]
async fn test_mode_is_refused_unless_enabled() {
    let server = create_test_server();
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_text("file_path", "/etc/hosts");
    let response = server
        .post("/api/analyze?test_mode=true")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "TEST_MODE_DISABLED"
    );
}

#[tokio::test]
async fn test_mode_reads_local_file_when_enabled() {
    let server = server_with(Always(Ok(ANALYSIS)), true, 1024 * 1024);
    let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    tmp.write_all(b"%PDF-1.4 Clause 5: 50% penalty on early termination.")
        .unwrap();

    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_text("file_path", tmp.path().to_string_lossy().into_owned());
    let response = server
        .post("/api/analyze?test_mode=true")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["analysis"]["status"], "success");
    assert_eq!(json["document"]["page_count"], 1);
}

#[tokio::test]
async fn test_mode_with_missing_path_is_bad_request() {
    let server = server_with(Always(Ok(ANALYSIS)), true, 1024 * 1024);
    let form = MultipartForm::new()
        .add_text("disclaimer_accepted", "true")
        .add_text("file_path", "/no/such/contract.pdf");
    let response = server
        .post("/api/analyze?test_mode=true")
        .add_header(AUTHORIZATION, bearer(PASSPHRASE))
        .multipart(form)
        .await;
    response.assert_status_bad_request();
}
