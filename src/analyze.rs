//! Contract review entry points.
//!
//! [`AnalysisPipeline`] runs one review: extract the text, ask the model for
//! an analysis, then ask it for a negotiation letter based on that analysis.
//! The two calls are sequential because the second prompt embeds the first
//! answer. A failed call never aborts the review; its section gets a fixed
//! fallback text and the other section is still produced.
//!
//! The free functions ([`review_file`], [`review_bytes`], [`review_to_file`],
//! [`inspect`]) build a production pipeline from a [`ReviewConfig`] for
//! one-off use. Long-lived callers such as the HTTP server build the pipeline
//! once and share it.

use crate::config::ReviewConfig;
use crate::error::{CounselError, ExtractionError, GenerationError};
use crate::output::{
    AnalysisOutcome, Completion, ContractReview, DocumentSummary, FailureResult,
    NegotiationOutcome, ReviewStats,
};
use crate::pipeline::extract::{extract_text, ExtractedText, PdfiumExtractor, TextExtractor};
use crate::pipeline::input::Document;
use crate::pipeline::llm::{GenerationClient, LlmClient};
use crate::pipeline::postprocess;
use crate::progress::{ProgressCallback, Stage};
use crate::prompts::{
    build_analysis_prompt, build_negotiation_prompt, ANALYSIS_FALLBACK, NEGOTIATION_FALLBACK,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const NOT_ATTEMPTED_UNREADABLE: &str = "No negotiation message was written because the \
document could not be read. Fix the problem above and upload the contract again.";

const NOT_ATTEMPTED_EMPTY: &str = "No negotiation message was written because the \
document has no text to analyse.";

/// Runs reviews with a fixed extractor, generation client and config.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct AnalysisPipeline {
    config: ReviewConfig,
    extractor: Arc<dyn TextExtractor>,
    client: Arc<dyn GenerationClient>,
}

impl std::fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalysisPipeline {
    pub fn new(
        config: ReviewConfig,
        extractor: Arc<dyn TextExtractor>,
        client: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            config,
            extractor,
            client,
        }
    }

    /// Production pipeline: pdfium extraction and an `edgequake-llm` client.
    ///
    /// # Errors
    /// [`CounselError::MissingCredential`] or
    /// [`CounselError::ProviderNotConfigured`] when no provider can be built.
    pub fn from_config(config: ReviewConfig) -> Result<Self, CounselError> {
        let client = LlmClient::from_config(&config)?;
        let extractor = PdfiumExtractor::from_config(&config);
        Ok(Self::new(config, Arc::new(extractor), Arc::new(client)))
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Run a review and return only the two outcomes.
    pub async fn analyze_contract(&self, document: &Document) -> (AnalysisOutcome, NegotiationOutcome) {
        self.review(document).await.into_parts()
    }

    /// Run a review.
    ///
    /// Never fails: every problem after construction is recorded in the
    /// returned outcomes, and both of their rendered texts are non-empty.
    pub async fn review(&self, document: &Document) -> ContractReview {
        let total_start = Instant::now();
        let mut stats = ReviewStats::default();
        let mut summary = DocumentSummary {
            name: document.name().map(str::to_string),
            byte_len: document.len(),
            ..Default::default()
        };
        info!(
            "Starting review: {} ({} bytes)",
            summary.name.as_deref().unwrap_or("<upload>"),
            summary.byte_len
        );

        // ── Step 1: Extract text ─────────────────────────────────────────
        self.notify(|cb| cb.on_stage_start(Stage::Extraction));
        let extraction_start = Instant::now();
        let extracted = self.extract(document).await;
        stats.extraction_ms = extraction_start.elapsed().as_millis() as u64;

        let extracted = match extracted {
            Ok(extracted) => cleaned(extracted),
            Err(error) => {
                warn!("Extraction failed: {}", error);
                self.notify(|cb| cb.on_stage_error(Stage::Extraction, &error.to_string()));
                return self.finish(
                    AnalysisOutcome::ExtractionFailed { error },
                    NegotiationOutcome::NotAttempted {
                        reason: NOT_ATTEMPTED_UNREADABLE.to_string(),
                    },
                    summary,
                    stats,
                    total_start,
                );
            }
        };
        summary.page_count = extracted.page_count;
        summary.char_count = extracted.char_count();
        info!(
            "Extracted {} characters from {} pages in {}ms",
            summary.char_count, summary.page_count, stats.extraction_ms
        );
        self.notify(|cb| cb.on_stage_complete(Stage::Extraction, summary.char_count));

        // ── Step 2: Empty-document short-circuit ─────────────────────────
        if extracted.is_blank() {
            info!("Document has no extractable text; skipping generation");
            return self.finish(
                AnalysisOutcome::EmptyDocument,
                NegotiationOutcome::NotAttempted {
                    reason: NOT_ATTEMPTED_EMPTY.to_string(),
                },
                summary,
                stats,
                total_start,
            );
        }

        // ── Step 3: Analysis call ────────────────────────────────────────
        let (contract_text, truncated) =
            postprocess::truncate_chars(&extracted.text, self.config.max_prompt_chars);
        if truncated {
            warn!(
                "Contract text cut to {} of {} characters",
                self.config.max_prompt_chars, summary.char_count
            );
            stats.prompt_truncated = true;
        }
        let prompt = build_analysis_prompt(contract_text);

        let analysis_start = Instant::now();
        let analysis = match self
            .generate(
                Stage::Analysis,
                &prompt,
                postprocess::clean_completion,
                ANALYSIS_FALLBACK,
                &mut stats,
            )
            .await
        {
            Ok(completion) => AnalysisOutcome::Success { completion },
            Err(failure) => AnalysisOutcome::Failure { failure },
        };
        stats.analysis_ms = analysis_start.elapsed().as_millis() as u64;

        // ── Step 4: Negotiation call, fed with the analysis or its fallback ──
        let prompt = build_negotiation_prompt(&analysis.rendered_text());

        let negotiation_start = Instant::now();
        let negotiation = match self
            .generate(
                Stage::Negotiation,
                &prompt,
                postprocess::clean_letter,
                NEGOTIATION_FALLBACK,
                &mut stats,
            )
            .await
        {
            Ok(completion) => NegotiationOutcome::Success { completion },
            Err(failure) => NegotiationOutcome::Failure { failure },
        };
        stats.negotiation_ms = negotiation_start.elapsed().as_millis() as u64;

        self.finish(analysis, negotiation, summary, stats, total_start)
    }

    async fn extract(
        &self,
        document: &Document,
    ) -> Result<crate::pipeline::extract::ExtractedText, ExtractionError> {
        let size = document.len() as u64;
        if size > self.config.max_document_bytes {
            return Err(ExtractionError::TooLarge {
                size,
                limit: self.config.max_document_bytes,
            });
        }

        let extracted = extract_text(Arc::clone(&self.extractor), document.shared_bytes()).await?;
        if extracted.page_count > self.config.max_pages {
            return Err(ExtractionError::TooManyPages {
                pages: extracted.page_count,
                limit: self.config.max_pages,
            });
        }
        Ok(extracted)
    }

    /// One generation call with cleanup. An answer that is empty after
    /// cleanup counts as [`GenerationError::EmptyCompletion`].
    async fn generate(
        &self,
        stage: Stage,
        prompt: &str,
        clean: fn(&str) -> String,
        fallback: &str,
        stats: &mut ReviewStats,
    ) -> Result<Completion, FailureResult> {
        self.notify(|cb| cb.on_stage_start(stage));
        debug!("{}: prompt is {} characters", stage, prompt.chars().count());
        stats.generation_calls += 1;

        let result = self.client.generate(prompt).await.and_then(|mut completion| {
            stats.total_input_tokens += completion.input_tokens as u64;
            stats.total_output_tokens += completion.output_tokens as u64;
            completion.text = clean(&completion.text);
            if completion.text.is_empty() {
                Err(GenerationError::EmptyCompletion)
            } else {
                Ok(completion)
            }
        });

        match result {
            Ok(completion) => {
                info!(
                    "{}: {} characters in {}ms ({} retries)",
                    stage,
                    completion.text.chars().count(),
                    completion.duration_ms,
                    completion.retries
                );
                self.notify(|cb| cb.on_stage_complete(stage, completion.text.chars().count()));
                Ok(completion)
            }
            Err(error) => {
                warn!("{} failed ({}): {}", stage, error.category(), error);
                self.notify(|cb| cb.on_stage_error(stage, &error.to_string()));
                Err(FailureResult {
                    error,
                    fallback: fallback.to_string(),
                })
            }
        }
    }

    fn finish(
        &self,
        analysis: AnalysisOutcome,
        negotiation: NegotiationOutcome,
        document: DocumentSummary,
        mut stats: ReviewStats,
        total_start: Instant,
    ) -> ContractReview {
        stats.total_ms = total_start.elapsed().as_millis() as u64;
        let review = ContractReview {
            analysis,
            negotiation,
            document,
            stats,
        };
        let generated = review.generated_sections();
        info!(
            "Review complete: {}/2 sections generated, {} calls, {}ms total",
            generated, review.stats.generation_calls, review.stats.total_ms
        );
        self.notify(|cb| cb.on_review_complete(generated));
        review
    }

    fn notify(&self, event: impl FnOnce(&ProgressCallback)) {
        if let Some(ref cb) = self.config.progress_callback {
            event(cb);
        }
    }
}

// ── Convenience entry points ─────────────────────────────────────────────────

/// Review a PDF on disk.
///
/// The provider is resolved before the file is read, so a missing credential
/// is reported even when the path is also wrong.
///
/// # Errors
/// Returns `Err(CounselError)` only for fatal errors: no credential, file
/// not found or unreadable, file over the byte cap. Everything else is
/// recorded in the returned [`ContractReview`].
pub async fn review_file(
    path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ContractReview, CounselError> {
    let pipeline = AnalysisPipeline::from_config(config.clone())?;
    let document = Document::from_path(path, config.max_document_bytes).await?;
    Ok(pipeline.review(&document).await)
}

/// Review PDF bytes held in memory.
pub async fn review_bytes(
    bytes: impl Into<Vec<u8>>,
    config: &ReviewConfig,
) -> Result<ContractReview, CounselError> {
    let pipeline = AnalysisPipeline::from_config(config.clone())?;
    Ok(pipeline.review(&Document::from_bytes(bytes)).await)
}

/// Review a PDF and write the Markdown rendering to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn review_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ContractReview, CounselError> {
    let review = review_file(input_path, config).await?;
    write_atomic(output_path, &review.to_markdown()).await?;
    Ok(review)
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: impl AsRef<Path>, contents: &str) -> Result<(), CounselError> {
    let path = path.as_ref();
    let write_failed = |e: std::io::Error| CounselError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Extract a PDF's text and report its size without calling the model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<DocumentSummary, CounselError> {
    let document = Document::from_path(path, config.max_document_bytes).await?;
    let extractor: Arc<dyn TextExtractor> = Arc::new(PdfiumExtractor::from_config(config));
    let extracted = cleaned(extract_text(extractor, document.shared_bytes()).await?);

    Ok(DocumentSummary {
        name: document.name().map(str::to_string),
        byte_len: document.len(),
        page_count: extracted.page_count,
        char_count: extracted.char_count(),
    })
}

fn cleaned(extracted: ExtractedText) -> ExtractedText {
    ExtractedText {
        text: postprocess::clean_extracted_text(&extracted.text),
        page_count: extracted.page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract(&self, _pdf: &[u8]) -> Result<ExtractedText, ExtractionError> {
            Ok(ExtractedText {
                text: self.0.to_string(),
                page_count: 1,
            })
        }
    }

    struct Echo;

    #[async_trait]
    impl GenerationClient for Echo {
        async fn generate(&self, _prompt: &str) -> Result<Completion, GenerationError> {
            Ok(Completion {
                text: "```\n  \n```".into(),
                input_tokens: 7,
                output_tokens: 3,
                duration_ms: 1,
                retries: 0,
            })
        }
    }

    fn pipeline(config: ReviewConfig) -> AnalysisPipeline {
        AnalysisPipeline::new(config, Arc::new(FixedText("Clause 1")), Arc::new(Echo))
    }

    #[tokio::test]
    async fn blank_completion_after_cleanup_is_a_failure() {
        let review = pipeline(ReviewConfig::default())
            .review(&Document::from_bytes(b"%PDF-1.4".to_vec()))
            .await;

        match &review.analysis {
            AnalysisOutcome::Failure { failure } => {
                assert_eq!(failure.error, GenerationError::EmptyCompletion);
                assert_eq!(failure.fallback, ANALYSIS_FALLBACK);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(review.stats.generation_calls, 2);
        assert_eq!(review.stats.total_input_tokens, 14);
    }

    #[tokio::test]
    async fn oversized_upload_is_an_extraction_failure() {
        let config = ReviewConfig::builder()
            .max_document_bytes(4)
            .build()
            .unwrap();
        let review = pipeline(config)
            .review(&Document::from_bytes(b"%PDF-1.4 and more".to_vec()))
            .await;
        assert!(matches!(
            review.analysis,
            AnalysisOutcome::ExtractionFailed {
                error: ExtractionError::TooLarge { limit: 4, .. }
            }
        ));
        assert_eq!(review.stats.generation_calls, 0);
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("review.md");

        write_atomic(&out, "hello").await.unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello");
        let leftovers: Vec<_> = std::fs::read_dir(out.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn inspect_reports_missing_file() {
        let err = inspect("/no/such/contract.pdf", &ReviewConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CounselError::FileNotFound { .. }));
    }
}
