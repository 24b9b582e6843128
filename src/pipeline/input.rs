//! Input: the uploaded contract as an immutable byte buffer.
//!
//! A [`Document`] is created once per request, from an upload or from a
//! local path, and dropped when the request ends. Its bytes sit behind an
//! `Arc<[u8]>` so the extraction stage can move a handle into
//! `spawn_blocking` without copying the PDF.
//!
//! The `%PDF` signature is checked by the extractor, not here: a non-PDF
//! upload is a recovered extraction failure, while a missing path or an
//! oversized file is a caller error.

use crate::error::CounselError;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// An uploaded contract.
#[derive(Clone)]
pub struct Document {
    name: Option<String>,
    bytes: Arc<[u8]>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap bytes received from an upload.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Attach a display name (usually the uploaded file name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() { None } else { Some(name) };
        self
    }

    /// Read a local file, refusing files larger than `max_bytes` before
    /// reading them.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, CounselError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_io_error(path, e))?;

        if !meta.is_file() {
            return Err(CounselError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if meta.len() > max_bytes {
            return Err(CounselError::DocumentTooLarge {
                size: meta.len(),
                limit: max_bytes,
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_bytes(bytes).with_name(name))
    }

    /// Display name, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Cheap shared handle to the bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn map_io_error(path: &Path, e: std::io::Error) -> CounselError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => CounselError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => CounselError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => CounselError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    }
}
