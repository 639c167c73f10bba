//! Image payload policy: signature sniffing, size and count limits, and
//! unit conversion for drawing extents.

use std::io::Cursor;

/// Largest accepted image payload, in bytes.
pub const MAX_IMAGE_SIZE: usize = 50 * 1024 * 1024;
/// Images beyond this count in one document are left as placeholders.
pub const MAX_IMAGES_PER_DOCUMENT: usize = 1000;

pub const EMU_PER_INCH: f64 = 914_400.0;
pub const EMU_PER_PIXEL: f64 = 9525.0;
pub const EMU_PER_POINT: f64 = 12_700.0;

const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0x89, 0x50, 0x4E, 0x47], "image/png"),
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (&[0x47, 0x49, 0x46, 0x38, 0x37, 0x61], "image/gif"),
    (&[0x47, 0x49, 0x46, 0x38, 0x39, 0x61], "image/gif"),
    (&[0x42, 0x4D], "image/bmp"),
    (&[0x49, 0x49, 0x2A, 0x00], "image/tiff"),
    (&[0x4D, 0x4D, 0x00, 0x2A], "image/tiff"),
];

const RIFF: &[u8] = b"RIFF";
const WEBP: &[u8] = b"WEBP";

/// Sniff the MIME type of a binary image payload from its leading bytes.
/// Returns `None` for fewer than four bytes or an unknown signature.
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }
    if data.starts_with(RIFF) {
        // RIFF is a generic container; only WEBP at offset 8 counts
        return (data.len() >= 12 && &data[8..12] == WEBP).then_some("image/webp");
    }
    SIGNATURES
        .iter()
        .find(|(sig, _)| data.starts_with(sig))
        .map(|(_, mime)| *mime)
}

/// MIME type implied by a file extension (case-insensitive, without the dot).
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "wmf" => "image/wmf",
        "emf" => "image/emf",
        "ico" => "image/x-icon",
        "psd" => "image/vnd.adobe.photoshop",
        _ => "application/octet-stream",
    }
}

fn extension(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

/// Outcome of validating one image payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageValidation {
    pub is_valid: bool,
    pub detected_mime_type: Option<String>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl ImageValidation {
    fn rejected(error: String) -> Self {
        Self {
            is_valid: false,
            error: Some(error),
            ..Default::default()
        }
    }

    fn accepted(mime: &str, warnings: Vec<String>) -> Self {
        Self {
            is_valid: true,
            detected_mime_type: Some(mime.to_string()),
            error: None,
            warnings,
        }
    }
}

pub(crate) fn too_large_error(size: u64) -> String {
    format!("Image too large: {size} bytes (max: {MAX_IMAGE_SIZE})")
}

/// Validate a payload stored at `path` against the size limit, the extension
/// table and the signature table.
///
/// A sniffed type that disagrees with the extension is accepted with a
/// warning; a binary payload with no recognisable signature is rejected.
/// SVG is checked as text instead of by signature.
pub fn validate_image(path: &str, data: &[u8]) -> ImageValidation {
    if data.len() > MAX_IMAGE_SIZE {
        return ImageValidation::rejected(too_large_error(data.len() as u64));
    }
    if data.is_empty() {
        return ImageValidation::rejected("Image data is empty".to_string());
    }

    let ext = extension(path).to_ascii_lowercase();
    let expected = mime_from_extension(&ext);
    if expected == "application/octet-stream" {
        return ImageValidation::rejected(format!("Unsupported image format: {ext}"));
    }

    if expected == "image/svg+xml" {
        return match std::str::from_utf8(data) {
            Ok(text) if text.contains("<svg") && text.contains("</svg>") => {
                ImageValidation::accepted(expected, Vec::new())
            }
            Ok(_) => ImageValidation::rejected("Invalid SVG format".to_string()),
            Err(_) => ImageValidation::rejected("Could not decode SVG as text".to_string()),
        };
    }

    let Some(detected) = detect_mime_type(data) else {
        return ImageValidation::rejected(
            "Could not detect valid image format from binary data".to_string(),
        );
    };

    let mut warnings = Vec::new();
    if detected != expected {
        warnings.push(format!(
            "MIME type mismatch: expected {expected}, detected {detected}"
        ));
    }
    ImageValidation::accepted(detected, warnings)
}

/// Per-document image budget.
#[derive(Debug)]
pub struct ImageTracker {
    count: usize,
    limit: usize,
}

impl Default for ImageTracker {
    fn default() -> Self {
        Self::new(MAX_IMAGES_PER_DOCUMENT)
    }
}

impl ImageTracker {
    pub fn new(limit: usize) -> Self {
        Self { count: 0, limit }
    }

    pub fn can_add_image(&self) -> bool {
        self.count < self.limit
    }

    /// Consume one slot. Returns false once the budget is exhausted.
    pub fn add_image(&mut self) -> bool {
        if !self.can_add_image() {
            return false;
        }
        self.count += 1;
        true
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

pub fn emu_to_pixels(emu: i64) -> u32 {
    (emu.max(0) as f64 / EMU_PER_PIXEL).round() as u32
}

pub fn emu_to_points(emu: i64) -> f32 {
    (emu as f64 / EMU_PER_POINT) as f32
}

/// Pixel dimensions read from the payload header, for formats the `image`
/// crate can probe.
pub fn intrinsic_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dims) => Some(dims),
        Err(e) => {
            log::debug!("Could not probe image dimensions: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn png_signature_alone_is_detected() {
        assert_eq!(detect_mime_type(&PNG_SIG), Some("image/png"));
    }

    #[test]
    fn riff_without_webp_marker_is_rejected() {
        let mut buf = b"RIFF\0\0\0\0WAVE".to_vec();
        assert_eq!(buf.len(), 12);
        assert_eq!(detect_mime_type(&buf), None);
        buf[8..12].copy_from_slice(b"WEBP");
        assert_eq!(detect_mime_type(&buf), Some("image/webp"));
    }

    #[test]
    fn short_buffers_are_unknown() {
        assert_eq!(detect_mime_type(&[0xFF, 0xD8, 0xFF]), None);
        assert_eq!(detect_mime_type(b"RIFF\0\0\0\0WEB"), None);
    }

    #[test]
    fn gif_tiff_and_bmp_signatures() {
        assert_eq!(detect_mime_type(b"GIF87a...."), Some("image/gif"));
        assert_eq!(detect_mime_type(b"GIF89a...."), Some("image/gif"));
        assert_eq!(detect_mime_type(&[0x49, 0x49, 0x2A, 0x00, 1]), Some("image/tiff"));
        assert_eq!(detect_mime_type(&[0x4D, 0x4D, 0x00, 0x2A, 1]), Some("image/tiff"));
        assert_eq!(detect_mime_type(b"BM\0\0\0\0"), Some("image/bmp"));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let v = validate_image("word/media/image1.png", &[]);
        assert!(!v.is_valid);
        assert!(v.error.unwrap().contains("empty"));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let mut at_limit = vec![0u8; MAX_IMAGE_SIZE];
        at_limit[..8].copy_from_slice(&PNG_SIG);
        let v = validate_image("image.png", &at_limit);
        assert!(v.is_valid, "{:?}", v.error);

        at_limit.push(0);
        let v = validate_image("image.png", &at_limit);
        assert!(!v.is_valid);
        assert!(v.error.unwrap().contains("too large"));
    }

    #[test]
    fn mismatched_extension_is_a_warning() {
        let v = validate_image("media/photo.jpg", &PNG_SIG);
        assert!(v.is_valid);
        assert_eq!(v.detected_mime_type.as_deref(), Some("image/png"));
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("expected image/jpeg"));
    }

    #[test]
    fn unsniffable_binary_is_rejected() {
        let v = validate_image("media/photo.png", b"not an image at all");
        assert!(!v.is_valid);
        assert!(v.error.unwrap().contains("Could not detect"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let v = validate_image("media/blob.xyz", &PNG_SIG);
        assert_eq!(v.error.as_deref(), Some("Unsupported image format: xyz"));
    }

    #[test]
    fn svg_requires_root_tags() {
        let ok = validate_image("a.svg", b"<svg xmlns=\"x\"><rect/></svg>");
        assert!(ok.is_valid);
        assert_eq!(ok.detected_mime_type.as_deref(), Some("image/svg+xml"));

        let bad = validate_image("a.svg", b"<html></html>");
        assert_eq!(bad.error.as_deref(), Some("Invalid SVG format"));

        let binary = validate_image("a.svg", &[0xFF, 0xFE, 0xFD]);
        assert_eq!(binary.error.as_deref(), Some("Could not decode SVG as text"));
    }

    #[test]
    fn tracker_stops_at_limit() {
        let mut t = ImageTracker::new(2);
        assert!(t.add_image());
        assert!(t.add_image());
        assert!(!t.can_add_image());
        assert!(!t.add_image());
        assert_eq!(t.count(), 2);
    }

    #[test]
    fn emu_conversions() {
        assert_eq!(emu_to_pixels(914_400), 96);
        assert_eq!(emu_to_pixels(9525 * 10), 10);
        assert_eq!(emu_to_points(12_700), 1.0);
    }
}
