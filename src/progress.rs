//! Progress-callback trait for review stage events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to be told when
//! each of the three stages (extraction, analysis, negotiation) starts and
//! ends. The CLI uses it to drive its spinner; a server could forward the
//! events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use pocket_counsel::{ReviewConfig, ReviewProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ReviewProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{}…", stage.label());
//!     }
//! }
//!
//! let config = ReviewConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ReviewProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of a review, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Analysis,
    Negotiation,
}

impl Stage {
    /// Human-readable description for spinners and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Extraction => "Reading document",
            Stage::Analysis => "Analysing contract",
            Stage::Negotiation => "Writing negotiation message",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the pipeline as a review moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run sequentially, but the same callback may
/// be shared by concurrent reviews in the server, hence `Send + Sync`.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage produced its output.
    ///
    /// # Arguments
    /// * `output_len`: characters of extracted text or generated text
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when a stage failed and its fallback was used.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once at the end of every review.
    ///
    /// # Arguments
    /// * `generated_sections`: how many of the two sections hold a real completion
    fn on_review_complete(&self, generated_sections: usize) {
        let _ = generated_sections;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;
