//! Text extraction: PDF bytes → plain text via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and does CPU-heavy parsing. [`extract_text`] moves the work onto
//! tokio's blocking pool so request handlers are not stalled while a
//! 200-page contract is decoded.
//!
//! ## Library binding
//!
//! pdfium is loaded at run time, first match wins:
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory holding one
//! 2. the current working directory
//! 3. the system library search path
//!
//! A missing library is an [`ExtractionError::LibraryUnavailable`], so the
//! caller gets a readable message instead of a panic.

use crate::config::ReviewConfig;
use crate::error::ExtractionError;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming a pdfium library file or directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Text of a whole document, pages concatenated in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

impl ExtractedText {
    /// True when there is nothing to analyse (no text, or whitespace only).
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Length in characters, as reported to users.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Turns PDF bytes into text.
///
/// Implementations are synchronous; the pipeline runs them on the blocking
/// pool. An empty result is valid and means "no extractable text".
pub trait TextExtractor: Send + Sync {
    fn extract(&self, pdf: &[u8]) -> Result<ExtractedText, ExtractionError>;
}

/// Run an extractor on tokio's blocking pool.
pub async fn extract_text(
    extractor: Arc<dyn TextExtractor>,
    pdf: Arc<[u8]>,
) -> Result<ExtractedText, ExtractionError> {
    tokio::task::spawn_blocking(move || extractor.extract(&pdf))
        .await
        .map_err(|e| ExtractionError::Internal {
            detail: format!("Extraction task panicked: {e}"),
        })?
}

/// Reject bytes that do not carry the `%PDF` signature.
pub fn check_signature(pdf: &[u8]) -> Result<(), ExtractionError> {
    if pdf.len() < 4 || &pdf[..4] != b"%PDF" {
        return Err(ExtractionError::NotAPdf {
            magic: pdf.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// [`TextExtractor`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
    max_pages: Option<usize>,
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password and page cap taken from the review config.
    pub fn from_config(config: &ReviewConfig) -> Self {
        let mut extractor = Self::new().with_max_pages(config.max_pages);
        if let Some(ref password) = config.password {
            extractor = extractor.with_password(password.as_str());
        }
        if let Some(path) = std::env::var_os(PDFIUM_LIB_PATH_ENV) {
            extractor = extractor.with_library_path(path);
        }
        extractor
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ExtractionError::LibraryUnavailable {
            detail: format!("{e:?}"),
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, pdf: &[u8]) -> Result<ExtractedText, ExtractionError> {
        check_signature(pdf)?;

        let pdfium = self.bind()?;
        let password = self.password.as_deref();

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| {
                let err_str = format!("{e:?}");
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        ExtractionError::WrongPassword
                    } else {
                        ExtractionError::PasswordRequired
                    }
                } else {
                    ExtractionError::Corrupt { detail: err_str }
                }
            })?;

        let pages = document.pages();
        let page_count = pages.len() as usize;
        info!("PDF loaded: {} pages", page_count);

        if let Some(limit) = self.max_pages {
            if page_count > limit {
                return Err(ExtractionError::TooManyPages {
                    pages: page_count,
                    limit,
                });
            }
        }

        let mut page_texts = Vec::with_capacity(page_count);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| ExtractionError::PageDecodeFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?
                .all();
            debug!("Page {}: {} chars", idx + 1, text.len());
            page_texts.push(text);
        }

        Ok(ExtractedText {
            text: page_texts.join("\n"),
            page_count,
        })
    }
}

/// Resolve `PDFIUM_LIB_PATH`: a directory means "the platform library inside it".
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(path))
    } else {
        path.to_path_buf()
    }
}
