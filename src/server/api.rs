//! API handlers.
//!
//! - `GET  /health`
//! - `POST /api/login`: check the shared passphrase
//! - `POST /api/analyze`: review one uploaded contract

use axum::{
    extract::{Multipart, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::ServerError;
use super::AppState;
use crate::access::{parse_flag, AccessDenied};
use crate::output::{ContractReview, DocumentSummary, ReviewStats};
use crate::pipeline::input::Document;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pocket-counsel",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub passphrase: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub authenticated: bool,
}

/// Handler: POST /api/login
///
/// Lets a client check the passphrase before uploading; `/api/analyze`
/// checks it again on every request.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    if state.gate.verify(&req.passphrase) {
        Ok(Json(LoginResponse {
            authenticated: true,
        }))
    } else {
        warn!("Login rejected");
        Err(AccessDenied::NotAuthenticated.into())
    }
}

/// Query string of `/api/analyze`. Flags accept the same spellings as form
/// fields (`true`, `1`, `yes`, `on`).
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(default)]
    pub test_mode: Option<String>,
}

impl AnalyzeQuery {
    pub fn test_mode(&self) -> bool {
        self.test_mode.as_deref().is_some_and(parse_flag)
    }
}

/// One rendered section of the response.
#[derive(Debug, Serialize)]
pub struct SectionResponse {
    pub status: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Analyze response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: SectionResponse,
    pub negotiation: SectionResponse,
    pub document: DocumentSummary,
    pub stats: ReviewStats,
    pub markdown: String,
}

impl From<ContractReview> for AnalyzeResponse {
    fn from(review: ContractReview) -> Self {
        let markdown = review.to_markdown();
        let analysis = SectionResponse {
            status: review.analysis.status(),
            text: review.analysis.rendered_text(),
            error: review.analysis.error_message(),
        };
        let negotiation = SectionResponse {
            status: review.negotiation.status(),
            text: review.negotiation.rendered_text(),
            error: review.negotiation.error_message(),
        };
        Self {
            success: true,
            analysis,
            negotiation,
            document: review.document,
            stats: review.stats,
            markdown,
        }
    }
}

/// Multipart fields of an analyze request.
#[derive(Default)]
struct AnalyzeForm {
    file: Option<(Option<String>, Vec<u8>)>,
    file_path: Option<String>,
    disclaimer_accepted: bool,
}

async fn read_form(multipart: &mut Multipart, limit: u64) -> Result<AnalyzeForm, ServerError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::from_multipart(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::from_multipart(e, limit))?;
                form.file = Some((file_name, bytes.to_vec()));
            }
            "file_path" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::from_multipart(e, limit))?;
                form.file_path = Some(text);
            }
            "disclaimer_accepted" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::from_multipart(e, limit))?;
                form.disclaimer_accepted = parse_flag(&text);
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}

/// Handler: POST /api/analyze
///
/// The passphrase is checked first, then the test-mode switch, then the
/// body is read. A review that ran is always a 200, whatever its outcomes.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ServerError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let test_mode = query.test_mode();

    let pre_body = state.gate.context(authorization, false, test_mode);
    if !pre_body.authenticated {
        return Err(AccessDenied::NotAuthenticated.into());
    }

    if test_mode && !state.allow_test_mode {
        return Err(ServerError::TestModeDisabled);
    }

    let limit = state.max_document_bytes;
    let form = read_form(&mut multipart, limit).await?;
    let ctx = state
        .gate
        .context(authorization, form.disclaimer_accepted, test_mode);
    ctx.ensure_ready()?;

    let document = if ctx.test_mode {
        let path = form
            .file_path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ServerError::InvalidRequest("test mode needs a 'file_path' field".into()))?;
        info!("Test mode: reading {}", path);
        Document::from_path(path.trim(), limit).await?
    } else {
        let (file_name, bytes) = form
            .file
            .ok_or_else(|| ServerError::InvalidRequest("missing 'file' field".into()))?;
        if bytes.is_empty() {
            return Err(ServerError::InvalidRequest("uploaded file is empty".into()));
        }
        // The body limit leaves room for multipart framing, so a file can
        // get past it while still over the cap.
        if bytes.len() as u64 > limit {
            warn!("Upload of {} bytes exceeds the {} byte cap", bytes.len(), limit);
            return Err(ServerError::PayloadTooLarge { limit });
        }
        let document = Document::from_bytes(bytes);
        match file_name {
            Some(name) => document.with_name(name),
            None => document,
        }
    };

    let review = state.pipeline.review(&document).await;
    Ok(Json(review.into()))
}
