//! Render worker - runs in separate thread(s)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::debug;

use super::backend::{PdfBackend, PdfDocument};
use super::cache::{CacheKey, PageCache};
use super::request::{RenderError, RenderRequest, RenderResponse, RequestId};
use super::types::{RenderedPage, Viewport};

/// Shared handles a worker thread needs
pub struct WorkerContext {
    pub backend: Arc<dyn PdfBackend>,
    pub bytes: Arc<[u8]>,
    pub cache: Arc<Mutex<PageCache>>,
    /// Id of the newest foreground page request; older ones are stale
    pub latest_page_request: Arc<AtomicU64>,
}

/// Main worker function - runs in a dedicated thread.
///
/// Every worker loads its own document from the shared bytes, so backends
/// whose documents are not `Send` stay confined to one thread.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    ctx: WorkerContext,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
) {
    let doc = match ctx.backend.load_document(&ctx.bytes) {
        Ok(d) => d,
        Err(e) => {
            let _ = responses.send(RenderResponse::Error {
                id: RequestId::new(0),
                error: RenderError::unknown(format!("worker could not load document: {e}")),
            });
            return;
        }
    };

    for request in requests {
        match request {
            RenderRequest::Page { id, page, scale } => {
                if id.0 < ctx.latest_page_request.load(Ordering::Acquire) {
                    debug!("Skipping superseded render request {id:?} for page {page}");
                    let _ = responses.send(RenderResponse::Cancelled(id));
                    continue;
                }
                handle_page_request(doc.as_ref(), id, page, scale, &ctx.cache, &responses);
            }

            RenderRequest::Prefetch { id, page, scale } => {
                handle_page_request(doc.as_ref(), id, page, scale, &ctx.cache, &responses);
            }

            RenderRequest::Cancel(id) => {
                let _ = responses.send(RenderResponse::Cancelled(id));
            }

            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_page_request(
    doc: &dyn PdfDocument,
    id: RequestId,
    page: usize,
    scale: f32,
    cache: &Arc<Mutex<PageCache>>,
    responses: &Sender<RenderResponse>,
) {
    let key = CacheKey::new(page, scale);

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(data) = cached {
        let _ = responses.send(RenderResponse::Page { id, page, data });
        return;
    }

    match render_page(doc, page, scale) {
        Ok(data) => {
            let data = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, data);
            let _ = responses.send(RenderResponse::Page { id, page, data });
        }
        Err(error) => {
            let _ = responses.send(RenderResponse::Error { id, error });
        }
    }
}

/// Render a single page together with its raw text runs.
///
/// The viewport used for rasterizing is stored alongside the surface so the
/// text layer can be built against exactly the same transform.
pub fn render_page(
    doc: &dyn PdfDocument,
    page: usize,
    scale: f32,
) -> Result<RenderedPage, RenderError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(RenderError::unknown(format!("invalid scale {scale}")));
    }

    let size = doc
        .page_size(page)
        .map_err(|e| RenderError::from_pdf(page, e))?;
    let viewport = Viewport::new(page, size.width, size.height, scale);

    let surface = doc
        .render_to_surface(page, &viewport)
        .map_err(|e| RenderError::from_pdf(page, e))?;
    let runs = doc
        .text_runs(page)
        .map_err(|e| RenderError::from_pdf(page, e))?;

    Ok(RenderedPage {
        viewport,
        surface,
        runs,
    })
}
