//! Page rendering and text-layer infrastructure

mod backend;
mod cache;
mod geometry_backend;
mod image_backend;
#[cfg(feature = "pdf")]
mod mupdf_backend;
mod request;
mod selection;
mod service;
mod state;
mod text_layer;
mod types;
mod worker;

pub use backend::{PageSize, PdfBackend, PdfDocument, PdfError, PdfErrorKind};
pub use cache::{CacheKey, PageCache};
pub use geometry_backend::{GeometryBackend, GeometryDocument};
pub use image_backend::ImageBackend;
#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfBackend;
pub use request::{RenderError, RenderRequest, RenderResponse, RequestId};
pub use selection::{
    DEFAULT_OVERLAP_THRESHOLD, NativeRange, Selection, SelectionConfig, SelectionRegion,
    SelectionTracker, collapse_repeats, compose_text, fragments_in_rect,
};
pub use service::{RenderConfig, RenderService};
pub use state::{Command, Effect, ViewState};
pub use text_layer::{FALLBACK_CHAR_WIDTH_EM, Granularity, TextLayer, TextLayerBuilder};
pub use types::*;
pub use worker::render_page;
