//! Render service - manages worker threads and the raster cache

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, warn};

use super::backend::{PdfBackend, PdfError};
use super::cache::{CacheKey, PageCache};
use super::request::{RenderError, RenderRequest, RenderResponse, RequestId};
use super::types::RenderedPage;
use super::worker::{WorkerContext, render_worker};

/// Worker and cache sizing for a [`RenderService`]
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub workers: usize,
    pub cache_size: usize,
    pub prefetch_radius: usize,
    /// Hard budget for one blocking render
    pub timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            cache_size: 8,
            prefetch_radius: 1,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
enum PendingRequest {
    Page,
    Prefetch(usize),
}

/// Renders pages on worker threads.
///
/// Every foreground page request gets a fresh monotonic id. Only the newest
/// one is live: results for older ids are dropped when they arrive, and
/// workers skip older ids still sitting in the queue.
pub struct RenderService {
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    latest_page_request: Arc<AtomicU64>,
    pending_requests: HashMap<RequestId, PendingRequest>,
    prefetch_in_flight: HashSet<usize>,
    cache: Arc<Mutex<PageCache>>,
    page_count: usize,
    config: RenderConfig,
}

impl RenderService {
    /// Load the document once on the calling thread to surface load errors
    /// (password, corruption) synchronously, then spawn the workers.
    pub fn open(
        backend: Arc<dyn PdfBackend>,
        bytes: Arc<[u8]>,
        config: RenderConfig,
    ) -> Result<Self, PdfError> {
        let page_count = backend.load_document(&bytes)?.page_count();

        let cache = Arc::new(Mutex::new(PageCache::new(config.cache_size)));
        let latest_page_request = Arc::new(AtomicU64::new(0));

        // flume gives MPMC channels, so all workers can pull from one queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let workers = config.workers.max(1);
        for _ in 0..workers {
            let ctx = WorkerContext {
                backend: Arc::clone(&backend),
                bytes: Arc::clone(&bytes),
                cache: Arc::clone(&cache),
                latest_page_request: Arc::clone(&latest_page_request),
            };
            let rx = request_rx.clone();
            let tx = response_tx.clone();

            std::thread::spawn(move || {
                render_worker(ctx, rx, tx);
            });
        }

        Ok(Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            latest_page_request,
            pending_requests: HashMap::new(),
            prefetch_in_flight: HashSet::new(),
            cache,
            page_count,
            config: RenderConfig { workers, ..config },
        })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render a page, blocking for at most the configured timeout.
    ///
    /// On timeout the request is cancelled and any late result is dropped.
    /// Failures are never retried here.
    pub fn render(&mut self, page: usize, scale: f32) -> Result<Arc<RenderedPage>, RenderError> {
        let id = self.request_page(page, scale);
        let deadline = Instant::now() + self.config.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if response.id() != id {
                        self.settle(&response);
                        continue;
                    }
                    self.settle(&response);
                    return match response {
                        RenderResponse::Page { data, .. } => Ok(data),
                        RenderResponse::Error { error, .. } => {
                            error!("Rendering page {page} failed: {error}");
                            Err(error)
                        }
                        RenderResponse::Cancelled(_) => {
                            Err(RenderError::unknown("render request was cancelled"))
                        }
                    };
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Rendering page {page} exceeded {:?}, cancelling",
                        self.config.timeout
                    );
                    self.cancel(id);
                    return Err(RenderError::Timeout {
                        page,
                        budget: self.config.timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RenderError::unknown("render workers stopped"));
                }
            }
        }
    }

    /// Queue a foreground render; supersedes every earlier page request
    pub fn request_page(&mut self, page: usize, scale: f32) -> RequestId {
        let id = self.next_id();
        self.latest_page_request.store(id.0, Ordering::Release);

        let _ = self
            .request_tx
            .send(RenderRequest::Page { id, page, scale });
        self.pending_requests.insert(id, PendingRequest::Page);

        id
    }

    /// Cancel a request; a result that still arrives for it is discarded
    pub fn cancel(&mut self, id: RequestId) {
        if self.pending_requests.contains_key(&id) {
            let _ = self.request_tx.send(RenderRequest::Cancel(id));
        }
        // Bumping past `id` marks it stale for both workers and `poll_responses`.
        let _ = self.latest_page_request.fetch_max(id.0 + 1, Ordering::AcqRel);
    }

    /// Warm the cache for pages around `current`
    pub fn schedule_prefetch(&mut self, current: usize, scale: f32) {
        for offset in 1..=self.config.prefetch_radius {
            if current + offset < self.page_count {
                self.maybe_prefetch(current + offset, scale);
            }
            if current >= offset {
                self.maybe_prefetch(current - offset, scale);
            }
        }
    }

    fn maybe_prefetch(&mut self, page: usize, scale: f32) {
        if self.prefetch_in_flight.contains(&page) || self.is_page_cached(page, scale) {
            return;
        }

        let id = self.next_id();
        let _ = self
            .request_tx
            .send(RenderRequest::Prefetch { id, page, scale });
        self.pending_requests
            .insert(id, PendingRequest::Prefetch(page));
        self.prefetch_in_flight.insert(page);
    }

    /// Poll for completed responses without blocking.
    ///
    /// Only responses for the live page request are returned; prefetch
    /// completions and stale results are absorbed.
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            let was_page = self.settle(&response);
            if was_page && !self.is_stale(response.id()) {
                responses.push(response);
            } else {
                debug!("Dropping response for {:?}", response.id());
            }
        }

        responses
    }

    /// Book-keeping for an arrived response; true if it answered a
    /// foreground page request
    fn settle(&mut self, response: &RenderResponse) -> bool {
        match self.pending_requests.remove(&response.id()) {
            Some(PendingRequest::Prefetch(page)) => {
                self.prefetch_in_flight.remove(&page);
                false
            }
            Some(PendingRequest::Page) => true,
            None => false,
        }
    }

    fn is_stale(&self, id: RequestId) -> bool {
        id.0 < self.latest_page_request.load(Ordering::Acquire)
    }

    /// Check if a page is cached at the given scale
    #[must_use]
    pub fn is_page_cached(&self, page: usize, scale: f32) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&CacheKey::new(page, scale))
    }

    /// Drop every cached raster
    pub fn invalidate_cache(&mut self) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .invalidate_all();
        self.prefetch_in_flight.clear();
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.config.workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::geometry_backend::{GeometryBackend, GeometryDocument};
    use crate::pdf::types::PageGeometry;

    fn service(pages: usize) -> RenderService {
        let doc = GeometryDocument::new(
            (0..pages)
                .map(|i| PageGeometry {
                    width: 100.0 + i as f32,
                    height: 50.0,
                    runs: vec![],
                })
                .collect(),
        );
        RenderService::open(
            Arc::new(GeometryBackend),
            Arc::from(doc.to_bytes().unwrap()),
            RenderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn render_returns_requested_page_and_scale() {
        let mut svc = service(2);
        let page = svc.render(1, 2.0).unwrap();
        assert!(page.viewport.matches(1, 2.0));
        assert_eq!(page.surface.width, 202);
        assert!(svc.is_page_cached(1, 2.0));
        assert!(!svc.is_page_cached(1, 1.0));
    }

    #[test]
    fn open_reports_load_errors() {
        let result = RenderService::open(
            Arc::new(GeometryBackend),
            Arc::from(&b"not json"[..]),
            RenderConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_page_fails() {
        let mut svc = service(1);
        assert!(svc.render(7, 1.0).is_err());
    }

    #[test]
    fn superseded_request_is_not_delivered_by_poll() {
        let mut svc = service(3);
        let old = svc.request_page(0, 1.0);
        let new = svc.request_page(1, 1.0);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut delivered = Vec::new();
        while Instant::now() < deadline && delivered.is_empty() {
            delivered.extend(svc.poll_responses());
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(delivered.iter().all(|r| r.id() != old));
        assert!(delivered.iter().any(|r| r.id() == new));
    }
}
