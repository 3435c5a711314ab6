//! Upload type detection
//!
//! Uploads are sniffed from their leading bytes, never from file names.

use std::sync::Arc;

use imagesize::ImageType;

use crate::pdf::{ImageBackend, PdfBackend, PdfError};

/// How far into the file a `%PDF-` header may start
const PDF_HEADER_WINDOW: usize = 1024;

/// Supported upload kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image(ImageFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("unsupported file type{}", describe(.0))]
    UnsupportedFileType(Option<String>),

    #[error(transparent)]
    Pdf(#[from] PdfError),
}

fn describe(hint: &Option<String>) -> String {
    hint.as_ref().map(|h| format!(" ({h})")).unwrap_or_default()
}

impl SourceKind {
    /// Classify an upload. Anything that is neither a PDF nor a supported
    /// raster image is rejected before any processing.
    pub fn detect(bytes: &[u8]) -> Result<Self, OpenError> {
        let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
        if window.windows(5).any(|w| w == b"%PDF-") {
            return Ok(Self::Pdf);
        }

        match imagesize::image_type(bytes) {
            Ok(ImageType::Png) => Ok(Self::Image(ImageFormat::Png)),
            Ok(ImageType::Jpeg) => Ok(Self::Image(ImageFormat::Jpeg)),
            Ok(ImageType::Gif) => Ok(Self::Image(ImageFormat::Gif)),
            Ok(ImageType::Webp) => Ok(Self::Image(ImageFormat::Webp)),
            Ok(other) => Err(OpenError::UnsupportedFileType(Some(format!("{other:?}")))),
            Err(_) => Err(OpenError::UnsupportedFileType(None)),
        }
    }

    /// Backend able to read this kind. PDFs use the supplied parser.
    #[must_use]
    pub fn backend(self, pdf: Arc<dyn PdfBackend>) -> Arc<dyn PdfBackend> {
        match self {
            Self::Pdf => pdf,
            Self::Image(_) => Arc::new(ImageBackend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_header_is_detected() {
        assert_eq!(SourceKind::detect(b"%PDF-1.7\n...").unwrap(), SourceKind::Pdf);
        assert_eq!(
            SourceKind::detect(b"\r\n\r\n%PDF-1.4\n").unwrap(),
            SourceKind::Pdf
        );
    }

    #[test]
    fn raster_images_are_detected() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";
        assert_eq!(
            SourceKind::detect(png).unwrap(),
            SourceKind::Image(ImageFormat::Png)
        );
        let jpeg = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";
        assert_eq!(
            SourceKind::detect(jpeg).unwrap(),
            SourceKind::Image(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn other_files_are_unsupported() {
        assert!(matches!(
            SourceKind::detect(b"PK\x03\x04 a zip file"),
            Err(OpenError::UnsupportedFileType(_))
        ));
        assert!(matches!(
            SourceKind::detect(b""),
            Err(OpenError::UnsupportedFileType(_))
        ));
    }
}
