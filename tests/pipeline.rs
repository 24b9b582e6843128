//! Pipeline behaviour tests with a stub extractor and a scripted client.
//!
//! No pdfium library and no API key are needed: the extractor returns fixed
//! text and the generation client answers from a script while recording
//! every prompt it receives.

use async_trait::async_trait;
use pocket_counsel::prompts::{
    ANALYSIS_FALLBACK, ANALYSIS_PROMPT_HEAD, ANALYSIS_PROMPT_TAIL, NEGOTIATION_FALLBACK,
    NEGOTIATION_PROMPT_HEAD, NEGOTIATION_PROMPT_TAIL,
};
use pocket_counsel::{
    AnalysisOutcome, AnalysisPipeline, Completion, Document, ExtractedText, ExtractionError,
    GenerationClient, GenerationError, NegotiationOutcome, ReviewConfig, ReviewProgressCallback,
    Stage, TextExtractor,
};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Returns a fixed extraction result and counts calls.
struct StubExtractor {
    result: Result<ExtractedText, ExtractionError>,
    calls: Mutex<usize>,
}

impl StubExtractor {
    fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(ExtractedText {
                text: text.to_string(),
                page_count: 1,
            }),
            calls: Mutex::new(0),
        })
    }

    fn failing(error: ExtractionError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            calls: Mutex::new(0),
        })
    }
}

impl TextExtractor for StubExtractor {
    fn extract(&self, _pdf: &[u8]) -> Result<ExtractedText, ExtractionError> {
        *self.calls.lock().unwrap() += 1;
        self.result.clone()
    }
}

/// Answers from a script, one entry per call, and records the prompts.
#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(script: Vec<Result<&str, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, prompt: &str) -> Result<Completion, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected generation call"));
        next.map(|text| Completion {
            text,
            input_tokens: 100,
            output_tokens: 50,
            duration_ms: 1,
            retries: 0,
        })
    }
}

fn pipeline(extractor: Arc<StubExtractor>, client: Arc<ScriptedClient>) -> AnalysisPipeline {
    AnalysisPipeline::new(ReviewConfig::default(), extractor, client)
}

fn pdf() -> Document {
    Document::from_bytes(b"%PDF-1.4 stub".to_vec()).with_name("lease.pdf")
}

fn network_error() -> GenerationError {
    GenerationError::Network {
        detail: "connection refused".into(),
    }
}

const CONTRACT: &str = "Clause 5: 50% penalty on early termination.";
const ANALYSIS: &str = "Dangerous Clauses: Clause 5 imposes an abusive 50% penalty...";
const LETTER: &str = "Dear landlord,\n\nPlease remove the penalty in clause 5.";

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn clause_five_scenario() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Ok(LETTER)]);

    let (analysis, negotiation) = pipeline(extractor, client.clone())
        .analyze_contract(&pdf())
        .await;

    assert_eq!(analysis.rendered_text(), ANALYSIS);
    assert_eq!(negotiation.rendered_text(), LETTER);

    let prompts = client.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(
        prompts[0],
        format!("{ANALYSIS_PROMPT_HEAD}{CONTRACT}{ANALYSIS_PROMPT_TAIL}")
    );
    assert!(prompts[1].starts_with(NEGOTIATION_PROMPT_HEAD));
    assert!(prompts[1].contains(ANALYSIS));
    assert!(prompts[1].ends_with(NEGOTIATION_PROMPT_TAIL));
}

#[tokio::test]
async fn review_reports_document_and_stats() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Ok(LETTER)]);

    let review = pipeline(extractor, client).review(&pdf()).await;

    assert_eq!(review.document.name.as_deref(), Some("lease.pdf"));
    assert_eq!(review.document.page_count, 1);
    assert_eq!(review.document.char_count, CONTRACT.chars().count());
    assert_eq!(review.stats.generation_calls, 2);
    assert_eq!(review.stats.total_input_tokens, 200);
    assert_eq!(review.stats.total_output_tokens, 100);
    assert!(!review.stats.prompt_truncated);
    assert_eq!(review.generated_sections(), 2);
}

#[tokio::test]
async fn both_sections_are_non_empty_for_valid_pdf() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Ok(LETTER)]);

    let review = pipeline(extractor, client).review(&pdf()).await;

    assert!(!review.analysis.rendered_text().trim().is_empty());
    assert!(!review.negotiation.rendered_text().trim().is_empty());
}

// ── Extraction failures and empty documents ──────────────────────────────────

#[tokio::test]
async fn extraction_failure_makes_no_generation_call() {
    let extractor = StubExtractor::failing(ExtractionError::Corrupt {
        detail: "xref table broken".into(),
    });
    let client = ScriptedClient::new(vec![]);

    let review = pipeline(extractor.clone(), client.clone())
        .review(&pdf())
        .await;

    assert!(matches!(
        review.analysis,
        AnalysisOutcome::ExtractionFailed {
            error: ExtractionError::Corrupt { .. }
        }
    ));
    assert!(matches!(
        review.negotiation,
        NegotiationOutcome::NotAttempted { .. }
    ));
    assert!(client.prompts().is_empty());
    assert_eq!(review.stats.generation_calls, 0);
    assert_eq!(*extractor.calls.lock().unwrap(), 1);
    assert!(review.analysis.rendered_text().contains("xref table broken"));
    assert!(!review.negotiation.rendered_text().is_empty());
}

#[tokio::test]
async fn empty_text_short_circuits() {
    let extractor = StubExtractor::text("  \n\u{200B}\n\t");
    let client = ScriptedClient::new(vec![]);

    let review = pipeline(extractor, client.clone()).review(&pdf()).await;

    assert_eq!(review.analysis, AnalysisOutcome::EmptyDocument);
    assert!(matches!(
        review.negotiation,
        NegotiationOutcome::NotAttempted { .. }
    ));
    assert!(client.prompts().is_empty());
    assert!(!review.analysis.rendered_text().is_empty());
}

#[tokio::test]
async fn non_pdf_bytes_fail_extraction_with_real_extractor() {
    let client = ScriptedClient::new(vec![]);
    let pipeline = AnalysisPipeline::new(
        ReviewConfig::default(),
        Arc::new(pocket_counsel::PdfiumExtractor::new()),
        client.clone(),
    );

    let review = pipeline
        .review(&Document::from_bytes(b"PK\x03\x04 a zip file".to_vec()))
        .await;

    assert!(matches!(
        review.analysis,
        AnalysisOutcome::ExtractionFailed {
            error: ExtractionError::NotAPdf { .. }
        }
    ));
    assert!(client.prompts().is_empty());
}

// ── Generation failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_call_failure_feeds_fallback_to_negotiation() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Err(network_error()), Ok(LETTER)]);

    let (analysis, negotiation) = pipeline(extractor, client.clone())
        .analyze_contract(&pdf())
        .await;

    match &analysis {
        AnalysisOutcome::Failure { failure } => {
            assert_eq!(failure.fallback, ANALYSIS_FALLBACK);
            assert_eq!(failure.error.category(), "network");
        }
        other => panic!("unexpected analysis outcome: {other:?}"),
    }
    assert_eq!(
        analysis
            .rendered_text()
            .matches("Could not be determined")
            .count(),
        3
    );

    // The negotiation call still happens, with the fallback as its input.
    let prompts = client.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(
        prompts[1],
        format!("{NEGOTIATION_PROMPT_HEAD}{ANALYSIS_FALLBACK}{NEGOTIATION_PROMPT_TAIL}")
    );
    assert_eq!(negotiation.rendered_text(), LETTER);
}

#[tokio::test]
async fn second_call_failure_keeps_real_analysis() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![
        Ok(ANALYSIS),
        Err(GenerationError::Timeout { secs: 60 }),
    ]);

    let (analysis, negotiation) = pipeline(extractor, client)
        .analyze_contract(&pdf())
        .await;

    assert_eq!(analysis.rendered_text(), ANALYSIS);
    match negotiation {
        NegotiationOutcome::Failure { failure } => {
            assert_eq!(failure.fallback, NEGOTIATION_FALLBACK);
            assert_eq!(failure.error, GenerationError::Timeout { secs: 60 });
        }
        other => panic!("unexpected negotiation outcome: {other:?}"),
    }
}

#[tokio::test]
async fn both_calls_failing_still_renders_both_sections() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Err(network_error()), Err(network_error())]);

    let review = pipeline(extractor, client).review(&pdf()).await;

    assert_eq!(review.analysis.rendered_text(), ANALYSIS_FALLBACK);
    assert_eq!(review.negotiation.rendered_text(), NEGOTIATION_FALLBACK);
    assert_eq!(review.generated_sections(), 0);
    assert_eq!(review.stats.generation_calls, 2);
}

#[tokio::test]
async fn whitespace_completion_counts_as_failure() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok("   \n\n  "), Ok(LETTER)]);

    let (analysis, _) = pipeline(extractor, client).analyze_contract(&pdf()).await;

    match analysis {
        AnalysisOutcome::Failure { failure } => {
            assert_eq!(failure.error, GenerationError::EmptyCompletion);
        }
        other => panic!("unexpected analysis outcome: {other:?}"),
    }
}

// ── Cleanup and limits ───────────────────────────────────────────────────────

#[tokio::test]
async fn completions_are_cleaned() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![
        Ok("```markdown\r\n**Final Verdict**\r\nDo not sign.\r\n```"),
        Ok("Subject: Clause 5\n\nDear landlord,"),
    ]);

    let (analysis, negotiation) = pipeline(extractor, client)
        .analyze_contract(&pdf())
        .await;

    assert_eq!(analysis.rendered_text(), "**Final Verdict**\nDo not sign.");
    assert_eq!(negotiation.rendered_text(), "Dear landlord,");
}

#[tokio::test]
async fn long_contracts_are_truncated_before_prompting() {
    let extractor = StubExtractor::text(&"a".repeat(500));
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Ok(LETTER)]);
    let config = ReviewConfig::builder()
        .max_prompt_chars(100)
        .build()
        .unwrap();

    let review = AnalysisPipeline::new(config, extractor, client.clone())
        .review(&pdf())
        .await;

    assert!(review.stats.prompt_truncated);
    assert_eq!(review.document.char_count, 500);
    let expected = format!("{ANALYSIS_PROMPT_HEAD}{}{ANALYSIS_PROMPT_TAIL}", "a".repeat(100));
    assert_eq!(client.prompts()[0], expected);
}

#[tokio::test]
async fn page_cap_applies_to_any_extractor() {
    let extractor = Arc::new(StubExtractor {
        result: Ok(ExtractedText {
            text: CONTRACT.into(),
            page_count: 12,
        }),
        calls: Mutex::new(0),
    });
    let client = ScriptedClient::new(vec![]);
    let config = ReviewConfig::builder().max_pages(10).build().unwrap();

    let review = AnalysisPipeline::new(config, extractor, client)
        .review(&pdf())
        .await;

    assert!(matches!(
        review.analysis,
        AnalysisOutcome::ExtractionFailed {
            error: ExtractionError::TooManyPages {
                pages: 12,
                limit: 10
            }
        }
    ));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl ReviewProgressCallback for EventLog {
    fn on_stage_start(&self, stage: Stage) {
        self.0.lock().unwrap().push(format!("start {stage:?}"));
    }
    fn on_stage_complete(&self, stage: Stage, _output_len: usize) {
        self.0.lock().unwrap().push(format!("done {stage:?}"));
    }
    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.0.lock().unwrap().push(format!("error {stage:?}"));
    }
    fn on_review_complete(&self, generated_sections: usize) {
        self.0
            .lock()
            .unwrap()
            .push(format!("complete {generated_sections}"));
    }
}

#[tokio::test]
async fn progress_events_follow_stages() {
    let log = Arc::new(EventLog::default());
    let config = ReviewConfig::builder()
        .progress_callback(log.clone() as Arc<dyn ReviewProgressCallback>)
        .build()
        .unwrap();
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Err(network_error())]);

    AnalysisPipeline::new(config, extractor, client)
        .review(&pdf())
        .await;

    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "start Extraction",
            "done Extraction",
            "start Analysis",
            "done Analysis",
            "start Negotiation",
            "error Negotiation",
            "complete 1",
        ]
    );
}

// ── Shared pipeline ──────────────────────────────────────────────────────────

#[test]
fn pipeline_runs_outside_an_async_test() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Ok(LETTER)]);
    let pipeline = pipeline(extractor, client);

    let review = tokio_test::block_on(pipeline.review(&pdf()));
    assert_eq!(review.generated_sections(), 2);
}

#[tokio::test]
async fn concurrent_reviews_share_one_pipeline() {
    let extractor = StubExtractor::text(CONTRACT);
    let client = ScriptedClient::new(vec![Ok(ANALYSIS), Ok(ANALYSIS), Ok(LETTER), Ok(LETTER)]);
    let shared = Arc::new(pipeline(extractor, client.clone()));

    let a = tokio::spawn({
        let shared = Arc::clone(&shared);
        async move { shared.review(&pdf()).await }
    });
    let b = tokio::spawn({
        let shared = Arc::clone(&shared);
        async move { shared.review(&pdf()).await }
    });

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(!a.analysis.rendered_text().is_empty());
    assert!(!b.analysis.rendered_text().is_empty());
    assert_eq!(client.prompts().len(), 4);
}
