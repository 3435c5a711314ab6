//! MuPDF-backed parsing collaborator

use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Pixmap, TextPageFlags};

use super::backend::{PageSize, PdfBackend, PdfDocument, PdfError, check_page};
use super::types::{RasterSurface, TextRun, Viewport};

#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfBackend;

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

fn corrupt(e: mupdf::error::Error) -> PdfError {
    PdfError::corrupt(e.to_string())
}

impl PdfBackend for MupdfBackend {
    fn load_document(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, PdfError> {
        let doc = Document::from_bytes(bytes, "application/pdf").map_err(corrupt)?;
        if doc
            .needs_password()
            .map_err(|e| PdfError::unknown(e.to_string()))?
        {
            return Err(PdfError::password_protected());
        }
        let page_count = doc.page_count().map_err(corrupt)?.max(0) as usize;
        Ok(Box::new(MupdfDocument { doc, page_count }))
    }
}

impl PdfDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PdfError> {
        check_page(page, self.page_count)?;
        let bounds = self
            .doc
            .load_page(page as i32)
            .and_then(|p| p.bounds())
            .map_err(corrupt)?;
        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }

    /// One run per text line. MuPDF reports baselines in top-down page
    /// space, so the line origin is used directly as the translation.
    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, PdfError> {
        check_page(page, self.page_count)?;
        let page = self.doc.load_page(page as i32).map_err(corrupt)?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(corrupt)?;

        let mut runs = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let mut chars = line.chars();
                let Some(first) = chars.next() else {
                    continue;
                };
                let origin = first.origin();
                let mut size = first.size();
                let mut text: String = first.char().into_iter().collect();
                for ch in chars {
                    size = size.max(ch.size());
                    if let Some(c) = ch.char() {
                        text.push(c);
                    }
                }
                if text.is_empty() {
                    continue;
                }

                let bbox = line.bounds();
                runs.push(TextRun {
                    text,
                    transform: [size, 0.0, 0.0, size, origin.x, origin.y],
                    font_height: size,
                    font_ascent: (origin.y - bbox.y0).max(0.0),
                    run_width: (bbox.x1 - origin.x).max(0.0),
                });
            }
        }
        Ok(runs)
    }

    fn render_to_surface(
        &self,
        page: usize,
        viewport: &Viewport,
    ) -> Result<RasterSurface, PdfError> {
        check_page(page, self.page_count)?;
        let page = self.doc.load_page(page as i32).map_err(corrupt)?;
        let transform = Matrix::new_scale(viewport.scale, viewport.scale);
        let rgb = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&transform, &rgb, false, false)
            .map_err(corrupt)?;
        pixmap_to_surface(&pixmap)
    }
}

fn pixmap_to_surface(pixmap: &Pixmap) -> Result<RasterSurface, PdfError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(PdfError::unknown(format!(
            "unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(PdfError::unknown("pixmap buffer size mismatch"));
    }

    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        if n == 3 {
            pixels.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                pixels.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(RasterSurface {
        width: pixmap.width(),
        height: pixmap.height(),
        pixels,
    })
}
