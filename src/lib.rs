mod docx;
mod error;
pub mod fields;
pub mod images;
pub mod model;

pub use docx::metadata::{parse_app_properties, parse_core_properties};
pub use error::{Error, MetadataError};
pub use fields::{FieldContext, FieldDescriptor, FieldType, evaluate_field, parse_field};
pub use images::{
    ImageTracker, ImageValidation, MAX_IMAGE_SIZE, MAX_IMAGES_PER_DOCUMENT, detect_mime_type,
    validate_image,
};
pub use model::*;

use std::path::Path;
use std::time::Instant;

/// What a parse extracts beyond text and resolved formatting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Resolve, validate and attach image payloads. When off, images stay
    /// placeholders and the image budget is never consulted.
    pub extract_images: bool,
    /// Keep style ids on paragraphs and tables and collect style usage.
    pub preserve_styles: bool,
    /// Read `word/comments.xml` into `Document::comments`.
    pub preserve_comments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            extract_images: true,
            preserve_styles: true,
            preserve_comments: false,
        }
    }
}

pub fn parse(input: &Path) -> Result<Document, Error> {
    let t0 = Instant::now();
    let bytes = std::fs::read(input)?;
    log::debug!("Read {} ({} bytes) in {:.1}ms", input.display(), bytes.len(), t0.elapsed().as_secs_f64() * 1000.0);
    parse_bytes(&bytes)
}

pub fn parse_bytes(input: &[u8]) -> Result<Document, Error> {
    parse_bytes_with_options(input, &ParseOptions::default())
}

pub fn parse_bytes_with_options(input: &[u8], options: &ParseOptions) -> Result<Document, Error> {
    docx::parse_package(input, options)
}
