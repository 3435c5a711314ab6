pub mod test_helpers {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::pdf::{
        GeometryDocument, PageGeometry, PageSize, PdfBackend, PdfDocument, PdfError,
        RasterSurface, TextRun, Viewport,
    };

    /// Run with a uniform scale-`font_height` transform and no aggregate width
    pub fn run(text: &str, x: f32, y: f32, font_height: f32, font_ascent: f32) -> TextRun {
        TextRun {
            text: text.to_string(),
            transform: [font_height, 0.0, 0.0, font_height, x, y],
            font_height,
            font_ascent,
            run_width: 0.0,
        }
    }

    /// Builder for multi-page geometry documents
    pub struct GeometryBuilder {
        width: f32,
        height: f32,
        pages: Vec<Vec<TextRun>>,
    }

    impl Default for GeometryBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GeometryBuilder {
        /// US Letter pages
        pub fn new() -> Self {
            Self {
                width: 612.0,
                height: 792.0,
                pages: Vec::new(),
            }
        }

        pub fn page(mut self, runs: Vec<TextRun>) -> Self {
            self.pages.push(runs);
            self
        }

        pub fn document(&self) -> GeometryDocument {
            GeometryDocument::new(
                self.pages
                    .iter()
                    .map(|runs| PageGeometry {
                        width: self.width,
                        height: self.height,
                        runs: runs.clone(),
                    })
                    .collect(),
            )
        }

        pub fn bytes(&self) -> Vec<u8> {
            self.document().to_bytes().expect("geometry serializes")
        }
    }

    /// Backend whose renders sleep before answering.
    ///
    /// Counts finished renders so tests can tell when a late result was
    /// produced but never delivered.
    pub struct SlowBackend {
        pub delay: Duration,
        pub pages: usize,
        pub finished: Arc<AtomicUsize>,
    }

    impl SlowBackend {
        pub fn new(delay: Duration, pages: usize) -> Self {
            Self {
                delay,
                pages,
                finished: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct SlowDocument {
        delay: Duration,
        pages: usize,
        finished: Arc<AtomicUsize>,
    }

    impl PdfBackend for SlowBackend {
        fn load_document(&self, _bytes: &[u8]) -> Result<Box<dyn PdfDocument>, PdfError> {
            Ok(Box::new(SlowDocument {
                delay: self.delay,
                pages: self.pages,
                finished: Arc::clone(&self.finished),
            }))
        }
    }

    impl PdfDocument for SlowDocument {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn page_size(&self, _page: usize) -> Result<PageSize, PdfError> {
            Ok(PageSize {
                width: 100.0,
                height: 100.0,
            })
        }

        fn text_runs(&self, _page: usize) -> Result<Vec<TextRun>, PdfError> {
            Ok(Vec::new())
        }

        fn render_to_surface(
            &self,
            _page: usize,
            viewport: &Viewport,
        ) -> Result<RasterSurface, PdfError> {
            std::thread::sleep(self.delay);
            self.finished.fetch_add(1, Ordering::SeqCst);
            let (w, h) = viewport.pixel_size();
            Ok(RasterSurface::blank(w, h))
        }
    }
}
