mod common;

use common::{DocxBuilder, drawing, tiny_png};
use docxide_model::{ImagePlacement, ParseOptions, parse_bytes, parse_bytes_with_options};

fn body() -> String {
    format!(
        "<w:p>{}{}{}{}</w:p>",
        drawing("rId10", "Good", 952_500, 476_250),
        drawing("rId11", "Empty", 9525, 9525),
        drawing("rId12", "Renamed", 9525, 9525),
        drawing("rId99", "Missing", 9525, 9525),
    )
}

fn package() -> Vec<u8> {
    DocxBuilder::new()
        .rel("rId10", "image", "media/image1.png")
        .rel("rId11", "image", "media/empty.png")
        .rel("rId12", "image", "media/photo.jpg")
        .part("word/media/image1.png", tiny_png(3, 2))
        .part("word/media/empty.png", Vec::new())
        .part("word/media/photo.jpg", tiny_png(1, 1))
        .body(&body())
        .build()
}

#[test]
fn valid_image_is_attached_with_its_dimensions() {
    let doc = parse_bytes(&package()).unwrap();
    let images = doc.images();
    assert_eq!(images.len(), 4);

    let good = images[0];
    assert_eq!(good.target.as_deref(), Some("word/media/image1.png"));
    assert!(good.has_data());
    assert_eq!(good.mime_type.as_deref(), Some("image/png"));
    assert_eq!((good.width, good.height), (Some(100), Some(50)));
    assert_eq!((good.intrinsic_width, good.intrinsic_height), (Some(3), Some(2)));
    assert_eq!(good.alt, "Good");
    assert_eq!(good.placement, ImagePlacement::Inline);
}

#[test]
fn rejected_images_keep_their_placeholder_and_warn() {
    let doc = parse_bytes(&package()).unwrap();
    let images = doc.images();

    let empty = images[1];
    assert!(!empty.has_data());
    assert_eq!(empty.mime_type, None);
    assert!(
        doc.warnings
            .iter()
            .any(|w| w.contains("word/media/empty.png") && w.contains("empty")),
        "warnings: {:?}",
        doc.warnings
    );

    // wrong extension is accepted under the sniffed type
    let renamed = images[2];
    assert!(renamed.has_data());
    assert_eq!(renamed.mime_type.as_deref(), Some("image/png"));
    assert!(doc.warnings.iter().any(|w| w.contains("MIME type mismatch")));

    let missing = images[3];
    assert_eq!(missing.rel_id, "rId99");
    assert_eq!(missing.target, None);
    assert!(!missing.has_data());
}

#[test]
fn extraction_can_be_turned_off() {
    let options = ParseOptions {
        extract_images: false,
        ..Default::default()
    };
    let doc = parse_bytes_with_options(&package(), &options).unwrap();
    let images = doc.images();
    assert_eq!(images.len(), 4);
    assert!(images.iter().all(|i| !i.has_data() && i.mime_type.is_none()));
    assert_eq!(images[0].width, Some(100));
    assert!(doc.warnings.is_empty());
}

#[test]
fn image_bytes_are_not_serialized() {
    let doc = parse_bytes(&package()).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    let image = &json["elements"][0]["value"]["images"][0];
    assert_eq!(image["mimeType"], "image/png");
    assert_eq!(image["intrinsicWidth"], 3);
    assert!(image.get("data").is_none());
}

#[test]
fn images_past_the_document_limit_stay_placeholders() {
    let body: String = (0..1001)
        .map(|i| format!("<w:p>{}</w:p>", drawing("rId10", &format!("Pic {i}"), 9525, 9525)))
        .collect();
    let bytes = DocxBuilder::new()
        .rel("rId10", "image", "media/image1.png")
        .part("word/media/image1.png", tiny_png(1, 1))
        .body(&body)
        .build();
    let doc = parse_bytes(&bytes).unwrap();
    let images = doc.images();
    assert_eq!(images.len(), 1001);
    assert!(images[..1000].iter().all(|i| i.has_data()));
    assert!(!images[1000].has_data());
    assert_eq!(images[1000].alt, "Pic 1000");
    assert!(
        doc.warnings
            .iter()
            .any(|w| w.contains("Image limit of 1000 reached; 1 images skipped")),
        "warnings: {:?}",
        doc.warnings
    );
}
