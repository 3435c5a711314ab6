//! Core geometry types for page rendering and the text layer

use serde::{Deserialize, Serialize};

/// One positioned run of text as reported by the PDF parsing collaborator.
///
/// Coordinates are in unscaled page space. `transform` is the text matrix
/// `[a, b, c, d, e, f]`; only the translation part `(e, f)` is used to place
/// the run, with `f` measured as the baseline offset from the page top.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    #[serde(rename = "string")]
    pub text: String,
    pub transform: [f32; 6],
    pub font_height: f32,
    pub font_ascent: f32,
    /// Aggregate advance width of the whole run, 0 when unknown
    #[serde(default)]
    pub run_width: f32,
}

impl TextRun {
    #[must_use]
    pub fn origin(&self) -> (f32, f32) {
        (self.transform[4], self.transform[5])
    }
}

/// Page size plus its text runs, in unscaled page units
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub runs: Vec<TextRun>,
}

/// Page-space to device-space mapping for one (page, scale) pair.
///
/// A viewport produced by a render must be handed unchanged to the text
/// layer builder so glyph coordinates and raster pixels agree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub page: usize,
    pub scale: f32,
    /// Device width (page width * scale)
    pub width: f32,
    /// Device height (page height * scale)
    pub height: f32,
}

impl Viewport {
    #[must_use]
    pub fn new(page: usize, page_width: f32, page_height: f32, scale: f32) -> Self {
        Self {
            page,
            scale,
            width: page_width * scale,
            height: page_height * scale,
        }
    }

    /// Surface size in whole pixels
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }

    /// Whether this viewport describes the given page at the given scale
    #[must_use]
    pub fn matches(&self, page: usize, scale: f32) -> bool {
        self.page == page && (self.scale - scale).abs() <= f32::EPSILON
    }
}

/// Axis-aligned rectangle in device space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Normalized rectangle spanning two arbitrary corner points
    #[must_use]
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Overlapping area with another rectangle, 0 when disjoint
    #[must_use]
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let w = self.right.min(other.right) - self.left.max(other.left);
        let h = self.bottom.min(other.bottom) - self.top.max(other.top);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// Smallest rectangle covering both
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Smallest rectangle covering every rect, `None` for an empty input
pub fn bounding_rect<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
    rects.into_iter().copied().reduce(|acc, r| acc.union(&r))
}

/// A positioned, atomic unit of extracted text used for hit-testing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Index of the originating run
    pub source_run_index: usize,
    /// Character offset inside the originating run
    pub offset_in_run: usize,
}

impl TextFragment {
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    /// De-duplication cell: rounded `(left, top)`
    #[must_use]
    pub fn cell(&self) -> (i64, i64) {
        (self.left.round() as i64, self.top.round() as i64)
    }
}

/// Raw rendered page raster.
///
/// RGB pixel data, 3 bytes per pixel, row-major without padding.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    /// Solid white surface
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xFF; width as usize * height as usize * 3],
        }
    }
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels_len", &self.pixels.len())
            .finish()
    }
}

/// Complete rendered page: raster plus the geometry needed to rebuild its
/// text layer against the same viewport.
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub viewport: Viewport,
    pub surface: RasterSurface,
    /// Text runs in unscaled page space
    pub runs: Vec<TextRun>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_points_normalizes_corners() {
        let r = Rect::from_points(30.0, 40.0, 10.0, 5.0);
        assert_eq!(r, Rect::new(10.0, 5.0, 30.0, 40.0));
        assert_eq!(r.width(), 20.0);
        assert_eq!(r.height(), 35.0);
    }

    #[test]
    fn intersection_area_of_disjoint_rects_is_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.intersection_area(&b), 0.0);

        let c = Rect::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.intersection_area(&c), 25.0);
    }

    #[test]
    fn viewport_scales_page_size() {
        let vp = Viewport::new(2, 612.0, 792.0, 1.5);
        assert_eq!(vp.width, 918.0);
        assert_eq!(vp.height, 1188.0);
        assert_eq!(vp.pixel_size(), (918, 1188));
        assert!(vp.matches(2, 1.5));
        assert!(!vp.matches(2, 1.0));
    }

    #[test]
    fn whitespace_fragment_detection() {
        let frag = TextFragment {
            text: "  ".to_string(),
            left: 0.0,
            top: 0.0,
            width: 1.0,
            height: 1.0,
            source_run_index: 0,
            offset_in_run: 0,
        };
        assert!(frag.is_whitespace());
        assert_eq!(frag.cell(), (0, 0));
    }

    #[test]
    fn bounding_rect_covers_all() {
        let rects = [Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(5.0, 2.0, 6.0, 9.0)];
        assert_eq!(bounding_rect(&rects), Some(Rect::new(0.0, 0.0, 6.0, 9.0)));
        assert_eq!(bounding_rect(&[]), None);
    }
}
