//! Backend over pre-parsed page geometry
//!
//! Reads a JSON document of the form `{"pages": [PageGeometry, ...]}` as
//! produced by an external parser. Rendering yields a blank page-sized
//! surface: the geometry carries no drawing operators.

use serde::{Deserialize, Serialize};

use super::backend::{PageSize, PdfBackend, PdfDocument, PdfError, check_page};
use super::types::{PageGeometry, RasterSurface, TextRun, Viewport};

/// Serialized form of a geometry document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeometryDocument {
    pub pages: Vec<PageGeometry>,
}

impl GeometryDocument {
    #[must_use]
    pub fn new(pages: Vec<PageGeometry>) -> Self {
        Self { pages }
    }

    /// JSON bytes accepted by [`GeometryBackend`]
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GeometryBackend;

impl PdfBackend for GeometryBackend {
    fn load_document(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, PdfError> {
        let doc: GeometryDocument = serde_json::from_slice(bytes)
            .map_err(|e| PdfError::corrupt(format!("invalid page geometry: {e}")))?;
        Ok(Box::new(doc))
    }
}

impl PdfDocument for GeometryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PdfError> {
        check_page(page, self.pages.len())?;
        let geometry = &self.pages[page];
        Ok(PageSize {
            width: geometry.width,
            height: geometry.height,
        })
    }

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, PdfError> {
        check_page(page, self.pages.len())?;
        Ok(self.pages[page].runs.clone())
    }

    fn render_to_surface(
        &self,
        page: usize,
        viewport: &Viewport,
    ) -> Result<RasterSurface, PdfError> {
        check_page(page, self.pages.len())?;
        let (width, height) = viewport.pixel_size();
        Ok(RasterSurface::blank(width, height))
    }
}
