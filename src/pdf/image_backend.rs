//! Backend for raster image uploads
//!
//! An image is a one-page document whose page size is its pixel size. It has
//! no text runs, so its text layer is always empty.

use image::imageops::FilterType;

use super::backend::{PageSize, PdfBackend, PdfDocument, PdfError, check_page};
use super::types::{RasterSurface, TextRun, Viewport};

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageBackend;

struct ImageDocument {
    bytes: Vec<u8>,
    size: PageSize,
}

impl PdfBackend for ImageBackend {
    fn load_document(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, PdfError> {
        let dims = imagesize::blob_size(bytes)
            .map_err(|e| PdfError::corrupt(format!("unreadable image header: {e}")))?;
        if dims.width == 0 || dims.height == 0 {
            return Err(PdfError::corrupt("image has zero size"));
        }

        Ok(Box::new(ImageDocument {
            bytes: bytes.to_vec(),
            size: PageSize {
                width: dims.width as f32,
                height: dims.height as f32,
            },
        }))
    }
}

impl PdfDocument for ImageDocument {
    fn page_count(&self) -> usize {
        1
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PdfError> {
        check_page(page, 1)?;
        Ok(self.size)
    }

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, PdfError> {
        check_page(page, 1)?;
        Ok(Vec::new())
    }

    fn render_to_surface(
        &self,
        page: usize,
        viewport: &Viewport,
    ) -> Result<RasterSurface, PdfError> {
        check_page(page, 1)?;
        let decoded = image::load_from_memory(&self.bytes)
            .map_err(|e| PdfError::corrupt(format!("image decode failed: {e}")))?
            .to_rgb8();

        let (width, height) = viewport.pixel_size();
        let scaled = if decoded.dimensions() == (width, height) {
            decoded
        } else {
            image::imageops::resize(&decoded, width, height, FilterType::Triangle)
        };

        Ok(RasterSurface {
            width,
            height,
            pixels: scaled.into_raw(),
        })
    }
}
