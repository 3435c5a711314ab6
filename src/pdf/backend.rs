//! Contract of the PDF parsing collaborator
//!
//! Backends are shared between render workers, documents are not: every
//! worker thread loads its own `PdfDocument` from the same bytes.

use super::types::{RasterSurface, TextRun, Viewport};

/// Failure category reported by a parsing backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PdfErrorKind {
    PasswordProtected,
    Corrupt,
    Unknown,
}

impl std::fmt::Display for PdfErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PasswordProtected => "password protected",
            Self::Corrupt => "corrupt document",
            Self::Unknown => "unknown failure",
        };
        f.write_str(label)
    }
}

/// Error returned by the parsing collaborator
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct PdfError {
    pub kind: PdfErrorKind,
    pub detail: String,
}

impl PdfError {
    pub fn new(kind: PdfErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::new(PdfErrorKind::Corrupt, detail)
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(PdfErrorKind::Unknown, detail)
    }

    pub fn password_protected() -> Self {
        Self::new(PdfErrorKind::PasswordProtected, "document requires a password")
    }
}

/// Page size in unscaled page units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A loaded document
pub trait PdfDocument {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, PdfError>;

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, PdfError>;

    fn render_to_surface(&self, page: usize, viewport: &Viewport)
    -> Result<RasterSurface, PdfError>;
}

/// Document loader
pub trait PdfBackend: Send + Sync {
    fn load_document(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, PdfError>;
}

/// Checks a page index against the document length
pub(crate) fn check_page(page: usize, page_count: usize) -> Result<(), PdfError> {
    if page < page_count {
        Ok(())
    } else {
        Err(PdfError::unknown(format!(
            "page {page} out of range ({page_count} pages)"
        )))
    }
}
