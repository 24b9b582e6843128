//! Result types returned by a review.
//!
//! Both outcome enums serialise with an internal `status` tag, e.g.
//! `{"status": "failure", "failure": {...}}`, which is the shape the HTTP API
//! and `--json` expose.

use crate::error::{ExtractionError, GenerationError};
use crate::prompts::EMPTY_DOCUMENT_NOTICE;
use serde::{Deserialize, Serialize};

/// A successful model answer, already cleaned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries spent before this answer arrived.
    pub retries: u32,
}

/// A failed generation call together with the text shown instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureResult {
    pub error: GenerationError,
    /// Never empty.
    pub fallback: String,
}

/// Result of the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Success { completion: Completion },
    Failure { failure: FailureResult },
    /// Text extraction failed; no generation call was made.
    ExtractionFailed { error: ExtractionError },
    /// The PDF has no extractable text; no generation call was made.
    EmptyDocument,
}

impl AnalysisOutcome {
    /// The text to show the user. Never empty.
    pub fn rendered_text(&self) -> String {
        match self {
            AnalysisOutcome::Success { completion } => completion.text.clone(),
            AnalysisOutcome::Failure { failure } => failure.fallback.clone(),
            AnalysisOutcome::ExtractionFailed { error } => {
                format!("The document could not be read, so it was not analysed.\n\n{error}")
            }
            AnalysisOutcome::EmptyDocument => EMPTY_DOCUMENT_NOTICE.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    /// The serde tag of this variant.
    pub fn status(&self) -> &'static str {
        match self {
            AnalysisOutcome::Success { .. } => "success",
            AnalysisOutcome::Failure { .. } => "failure",
            AnalysisOutcome::ExtractionFailed { .. } => "extraction_failed",
            AnalysisOutcome::EmptyDocument => "empty_document",
        }
    }

    /// The underlying error message, if the stage did not succeed because of one.
    pub fn error_message(&self) -> Option<String> {
        match self {
            AnalysisOutcome::Failure { failure } => Some(failure.error.to_string()),
            AnalysisOutcome::ExtractionFailed { error } => Some(error.to_string()),
            _ => None,
        }
    }

    pub fn completion(&self) -> Option<&Completion> {
        match self {
            AnalysisOutcome::Success { completion } => Some(completion),
            _ => None,
        }
    }

    /// Whether the analysis stage reached the model at all.
    pub fn generation_attempted(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::Success { .. } | AnalysisOutcome::Failure { .. }
        )
    }
}

/// Result of the negotiation-letter stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NegotiationOutcome {
    Success { completion: Completion },
    Failure { failure: FailureResult },
    /// The analysis never reached the model, so no letter was requested.
    NotAttempted { reason: String },
}

impl NegotiationOutcome {
    /// The text to show the user. Never empty.
    pub fn rendered_text(&self) -> String {
        match self {
            NegotiationOutcome::Success { completion } => completion.text.clone(),
            NegotiationOutcome::Failure { failure } => failure.fallback.clone(),
            NegotiationOutcome::NotAttempted { reason } => reason.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NegotiationOutcome::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            NegotiationOutcome::Success { .. } => "success",
            NegotiationOutcome::Failure { .. } => "failure",
            NegotiationOutcome::NotAttempted { .. } => "not_attempted",
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            NegotiationOutcome::Failure { failure } => Some(failure.error.to_string()),
            _ => None,
        }
    }

    pub fn completion(&self) -> Option<&Completion> {
        match self {
            NegotiationOutcome::Success { completion } => Some(completion),
            _ => None,
        }
    }
}

/// What was uploaded and what was extracted from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: Option<String>,
    pub byte_len: usize,
    /// Zero when extraction failed.
    pub page_count: usize,
    /// Characters of extracted text, before any prompt cap.
    pub char_count: usize,
}

/// Counters and timings for one review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    /// Generation calls made (0, 1 or 2), retries not included.
    pub generation_calls: u32,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extraction_ms: u64,
    pub analysis_ms: u64,
    pub negotiation_ms: u64,
    pub total_ms: u64,
    /// The extracted text was longer than the prompt cap and was cut.
    pub prompt_truncated: bool,
}

/// A finished review: both outcomes plus a summary of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractReview {
    pub analysis: AnalysisOutcome,
    pub negotiation: NegotiationOutcome,
    pub document: DocumentSummary,
    pub stats: ReviewStats,
}

impl ContractReview {
    /// Number of sections (0–2) holding a real completion.
    pub fn generated_sections(&self) -> usize {
        usize::from(self.analysis.is_success()) + usize::from(self.negotiation.is_success())
    }

    /// Render both sections as one Markdown document.
    pub fn to_markdown(&self) -> String {
        format!(
            "## Contract Analysis\n\n{}\n\n---\n\n## Negotiation Message\n\n{}\n",
            self.analysis.rendered_text().trim_end(),
            self.negotiation.rendered_text().trim_end()
        )
    }

    pub fn into_parts(self) -> (AnalysisOutcome, NegotiationOutcome) {
        (self.analysis, self.negotiation)
    }
}
