//! Render request and response types

use std::sync::Arc;
use std::time::Duration;

use super::backend::{PdfError, PdfErrorKind};
use super::types::RenderedPage;

/// Unique identifier for render requests.
///
/// Ids are handed out monotonically, so a smaller id is always an older
/// request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to render workers
#[derive(Debug)]
pub enum RenderRequest {
    /// Render a page (high priority)
    Page { id: RequestId, page: usize, scale: f32 },

    /// Warm the cache for a page (low priority)
    Prefetch { id: RequestId, page: usize, scale: f32 },

    /// Cancel a pending request
    Cancel(RequestId),

    /// Shutdown the worker
    Shutdown,
}

/// Errors from page rendering
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("page {page} could not be decoded: {detail}")]
    Corrupt { page: usize, detail: String },

    #[error("rendering page {page} exceeded {budget:?}")]
    Timeout { page: usize, budget: Duration },

    #[error("{detail}")]
    Unknown { detail: String },
}

impl RenderError {
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown { detail: msg.into() }
    }

    /// Maps a backend failure on `page` onto the render taxonomy
    #[must_use]
    pub fn from_pdf(page: usize, err: PdfError) -> Self {
        match err.kind {
            PdfErrorKind::Corrupt => Self::Corrupt {
                page,
                detail: err.detail,
            },
            PdfErrorKind::PasswordProtected | PdfErrorKind::Unknown => Self::Unknown {
                detail: err.to_string(),
            },
        }
    }
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered page data
    Page {
        id: RequestId,
        page: usize,
        data: Arc<RenderedPage>,
    },

    /// Request was cancelled before it ran
    Cancelled(RequestId),

    /// Error during rendering
    Error { id: RequestId, error: RenderError },
}

impl RenderResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Page { id, .. } | Self::Error { id, .. } => *id,
            Self::Cancelled(id) => *id,
        }
    }
}
