use rayon::prelude::*;

use crate::images::{
    ImageTracker, MAX_IMAGES_PER_DOCUMENT, emu_to_pixels, emu_to_points, intrinsic_dimensions,
    validate_image,
};
use crate::model::{
    Block, Border, Document, Element, Image, ImageCrop, ImagePlacement, ImageTransform,
};

use super::package::Package;
use super::rels::{REL_TYPE_IMAGE, Relationships};
use super::{DML_NS, REL_NS, VML_NS, WPD_NS, parse_hex_color};

fn wpd<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WPD_NS))
}

fn dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn find_dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.descendants()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true"))
}

/// `a:srcRect` edges are in 1/1000 of a percent.
fn parse_crop(src_rect: roxmltree::Node) -> Option<ImageCrop> {
    let edge = |attr: &str| {
        src_rect
            .attribute(attr)
            .and_then(|v| v.parse::<f32>().ok())
            .map(|v| v / 100_000.0)
            .unwrap_or(0.0)
    };
    let crop = ImageCrop {
        top: edge("t"),
        bottom: edge("b"),
        left: edge("l"),
        right: edge("r"),
    };
    (crop != ImageCrop::default()).then_some(crop)
}

/// `a:xfrm` rotation is in 1/60000 of a degree.
fn parse_transform(xfrm: roxmltree::Node) -> Option<ImageTransform> {
    let transform = ImageTransform {
        rotation: xfrm
            .attribute("rot")
            .and_then(|v| v.parse::<f32>().ok())
            .map(|v| v / 60_000.0)
            .unwrap_or(0.0),
        flip_horizontal: is_true(xfrm.attribute("flipH")),
        flip_vertical: is_true(xfrm.attribute("flipV")),
    };
    (transform != ImageTransform::default()).then_some(transform)
}

/// Picture outline from `a:ln`.
fn parse_outline(ln: roxmltree::Node) -> Option<Border> {
    if dml(ln, "noFill").is_some() {
        return None;
    }
    let width = ln.attribute("w").and_then(|v| v.parse::<i64>().ok());
    let color = dml(ln, "solidFill")
        .and_then(|f| dml(f, "srgbClr"))
        .and_then(|c| c.attribute("val"))
        .and_then(parse_hex_color);
    if width.is_none() && color.is_none() {
        return None;
    }
    Some(Border {
        style: dml(ln, "prstDash")
            .and_then(|d| d.attribute("val"))
            .unwrap_or("solid")
            .to_string(),
        color,
        width: width.map(emu_to_points).unwrap_or(0.75),
        space: 0.0,
    })
}

/// Build an image placeholder from a `w:drawing`. Shapes, charts and other
/// drawings without a picture fill yield `None`.
pub(crate) fn parse_drawing(drawing: roxmltree::Node, rels: &Relationships) -> Option<Image> {
    let container = drawing.children().find(|n| {
        n.tag_name().namespace() == Some(WPD_NS)
            && matches!(n.tag_name().name(), "inline" | "anchor")
    })?;
    let placement = if container.tag_name().name() == "anchor" {
        ImagePlacement::Anchor
    } else {
        ImagePlacement::Inline
    };

    let blip = find_dml(container, "blip")?;
    let rel_id = blip
        .attribute((REL_NS, "embed"))
        .or_else(|| blip.attribute((REL_NS, "link")))?;

    let extent = wpd(container, "extent");
    let emu = |attr: &str| {
        extent
            .and_then(|n| n.attribute(attr))
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
    };

    let doc_pr = wpd(container, "docPr");
    let alt = non_empty(doc_pr.and_then(|n| n.attribute("descr")))
        .or_else(|| non_empty(doc_pr.and_then(|n| n.attribute("name"))))
        .unwrap_or("Image")
        .to_string();

    let sp_pr = container
        .descendants()
        .find(|n| n.tag_name().name() == "spPr");

    let target = rels.part_path(rel_id);
    match rels.get(rel_id) {
        None => log::debug!("Drawing {rel_id}: relationship not found"),
        Some(rel) if !rel.rel_type.ends_with(REL_TYPE_IMAGE) => {
            log::debug!("Drawing {rel_id}: relationship type {} is not an image", rel.rel_type)
        }
        Some(_) if target.is_none() => log::debug!("Drawing {rel_id}: external image not embedded"),
        Some(_) => {}
    }

    Some(Image {
        rel_id: rel_id.to_string(),
        target,
        width: emu("cx").map(emu_to_pixels),
        height: emu("cy").map(emu_to_pixels),
        alt,
        title: non_empty(doc_pr.and_then(|n| n.attribute("title"))).map(str::to_string),
        placement,
        crop: find_dml(container, "srcRect").and_then(parse_crop),
        transform: sp_pr.and_then(|sp| dml(sp, "xfrm")).and_then(parse_transform),
        border: sp_pr.and_then(|sp| dml(sp, "ln")).and_then(parse_outline),
        ..Default::default()
    })
}

/// CSS-ish length from a VML `style` attribute, converted to 96-dpi pixels.
fn vml_length(style: &str, key: &str) -> Option<u32> {
    let value = style.split(';').find_map(|decl| {
        let (k, v) = decl.split_once(':')?;
        (k.trim() == key).then_some(v.trim())
    })?;
    let (number, factor) = if let Some(v) = value.strip_suffix("pt") {
        (v, 96.0 / 72.0)
    } else if let Some(v) = value.strip_suffix("in") {
        (v, 96.0)
    } else if let Some(v) = value.strip_suffix("px") {
        (v, 1.0)
    } else {
        (value, 1.0)
    };
    let px = number.trim().parse::<f64>().ok()? * factor;
    Some(px.round() as u32)
}

/// Legacy `w:pict`/`w:object` image: `v:imagedata r:id` inside a VML shape.
pub(crate) fn parse_vml_image(pict: roxmltree::Node, rels: &Relationships) -> Option<Image> {
    let imagedata = pict.descendants().find(|n| {
        n.tag_name().name() == "imagedata" && n.tag_name().namespace() == Some(VML_NS)
    })?;
    let rel_id = imagedata.attribute((REL_NS, "id"))?;
    let shape = imagedata.parent_element();
    let style = shape.and_then(|s| s.attribute("style")).unwrap_or("");
    let title = imagedata
        .attributes()
        .find(|a| a.name() == "title")
        .map(|a| a.value());
    let alt = non_empty(shape.and_then(|s| s.attribute("alt")))
        .or_else(|| non_empty(title))
        .unwrap_or("Image")
        .to_string();

    Some(Image {
        rel_id: rel_id.to_string(),
        target: rels.part_path(rel_id),
        width: vml_length(style, "width"),
        height: vml_length(style, "height"),
        alt,
        title: non_empty(title).map(str::to_string),
        ..Default::default()
    })
}

fn block_images<'d>(blocks: &'d mut [Block], out: &mut Vec<&'d mut Image>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.extend(p.images.iter_mut()),
            Block::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    block_images(&mut cell.content, out);
                }
            }
        }
    }
}

/// Every placeholder in document order: body, headers, footers, footnotes, endnotes.
fn all_images_mut(doc: &mut Document) -> Vec<&mut Image> {
    let mut out = Vec::new();
    for element in &mut doc.elements {
        match element {
            Element::Paragraph(p) => out.extend(p.images.iter_mut()),
            Element::Heading(h) => out.extend(h.paragraph.images.iter_mut()),
            Element::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    block_images(&mut cell.content, &mut out);
                }
            }
            Element::Footnote(n) | Element::Endnote(n) => block_images(&mut n.content, &mut out),
            Element::PageBreak | Element::Bookmark(_) => {}
        }
    }
    for set in [&mut doc.headers, &mut doc.footers] {
        for hf in [&mut set.default, &mut set.first, &mut set.even]
            .into_iter()
            .flatten()
        {
            block_images(&mut hf.content, &mut out);
        }
    }
    for note in doc.footnotes.values_mut().chain(doc.endnotes.values_mut()) {
        block_images(&mut note.content, &mut out);
    }
    out
}

struct Accepted {
    data: Vec<u8>,
    mime_type: String,
    dimensions: Option<(u32, u32)>,
    warnings: Vec<String>,
}

fn validate_part(path: &str, data: Vec<u8>) -> Result<Accepted, String> {
    let validation = validate_image(path, &data);
    if !validation.is_valid {
        return Err(validation
            .error
            .unwrap_or_else(|| "Invalid image".to_string()));
    }
    let mime_type = validation
        .detected_mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let dimensions = if mime_type == "image/svg+xml" {
        None
    } else {
        intrinsic_dimensions(&data)
    };
    Ok(Accepted {
        data,
        mime_type,
        dimensions,
        warnings: validation.warnings,
    })
}

/// Resolve every placeholder to its media part and validate it. The count
/// budget is spent in document order and only budgeted parts are inflated;
/// validation itself runs in parallel. Rejected images keep their
/// placeholder and gain a document warning.
pub(crate) fn fill_images(doc: &mut Document, package: &Package) {
    let mut warnings = Vec::new();
    let mut images = all_images_mut(doc);
    let mut tracker = ImageTracker::new(MAX_IMAGES_PER_DOCUMENT);

    let mut jobs: Vec<(usize, String, Result<Vec<u8>, String>)> = Vec::new();
    let mut over_budget = 0usize;
    for (i, image) in images.iter().enumerate() {
        let Some(target) = image.target.as_deref() else {
            continue;
        };
        if !package.contains(target) {
            log::debug!("Image {}: part {target} not in package", image.rel_id);
            continue;
        }
        if !tracker.add_image() {
            over_budget += 1;
            continue;
        }
        jobs.push((i, target.to_string(), package.read_media(target)));
    }
    if over_budget > 0 {
        log::warn!("Image limit of {MAX_IMAGES_PER_DOCUMENT} reached; {over_budget} images left as placeholders");
        warnings.push(format!(
            "Image limit of {MAX_IMAGES_PER_DOCUMENT} reached; {over_budget} images skipped"
        ));
    }

    let results: Vec<(usize, String, Result<Accepted, String>)> = jobs
        .into_par_iter()
        .map(|(i, path, data)| {
            let outcome = data.and_then(|data| validate_part(&path, data));
            (i, path, outcome)
        })
        .collect();

    let mut accepted = 0usize;
    for (i, path, outcome) in results {
        match outcome {
            Ok(ok) => {
                let image = &mut images[i];
                image.data = Some(ok.data);
                image.mime_type = Some(ok.mime_type);
                if let Some((w, h)) = ok.dimensions {
                    image.intrinsic_width = Some(w);
                    image.intrinsic_height = Some(h);
                }
                for w in ok.warnings {
                    log::debug!("Image {path}: {w}");
                    warnings.push(format!("Image {path}: {w}"));
                }
                accepted += 1;
            }
            Err(e) => {
                log::warn!("Image {path} rejected: {e}");
                warnings.push(format!("Image {path}: {e}"));
            }
        }
    }
    log::debug!(
        "Images: {} placeholders, {} validated, {accepted} accepted",
        images.len(),
        tracker.count()
    );
    doc.warnings.extend(warnings);
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
        xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"
        xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
        xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"
        xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
        xmlns:v="urn:schemas-microsoft-com:vml"
        xmlns:o="urn:schemas-microsoft-com:office:office""#;

    fn rels() -> Relationships {
        let xml = roxmltree::Document::parse(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
            </Relationships>"#,
        )
        .unwrap();
        Relationships::parse(&xml, "word/document.xml")
    }

    #[test]
    fn inline_picture() {
        let xml = format!(
            r#"<w:drawing {NS}><wp:inline><wp:extent cx="952500" cy="476250"/>
                <wp:docPr id="1" name="Picture 1" descr="A chart"/>
                <a:graphic><a:graphicData><pic:pic>
                  <pic:blipFill><a:blip r:embed="rId5"/><a:srcRect l="10000" r="5000"/></pic:blipFill>
                  <pic:spPr><a:xfrm rot="5400000" flipH="1"/><a:ln w="12700"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:ln></pic:spPr>
                </pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let img = parse_drawing(doc.root_element(), &rels()).unwrap();
        assert_eq!(img.rel_id, "rId5");
        assert_eq!(img.target.as_deref(), Some("word/media/image1.png"));
        assert_eq!((img.width, img.height), (Some(100), Some(50)));
        assert_eq!(img.alt, "A chart");
        assert_eq!(img.placement, ImagePlacement::Inline);
        let crop = img.crop.as_ref().unwrap();
        assert!((crop.left - 0.1).abs() < 1e-6 && (crop.right - 0.05).abs() < 1e-6);
        let t = img.transform.as_ref().unwrap();
        assert_eq!(t.rotation, 90.0);
        assert!(t.flip_horizontal && !t.flip_vertical);
        let border = img.border.as_ref().unwrap();
        assert_eq!(border.width, 1.0);
        assert_eq!(border.color, Some([255, 0, 0]));
        assert!(!img.has_data());
    }

    #[test]
    fn anchor_alt_falls_back_to_name_then_default() {
        let xml = format!(
            r#"<w:drawing {NS}><wp:anchor><wp:extent cx="0" cy="0"/><wp:docPr id="2" name="Logo"/>
                <a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed="rId404"/></pic:blipFill></pic:pic></a:graphicData></a:graphic>
               </wp:anchor></w:drawing>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let img = parse_drawing(doc.root_element(), &rels()).unwrap();
        assert_eq!(img.placement, ImagePlacement::Anchor);
        assert_eq!(img.alt, "Logo");
        assert_eq!(img.target, None);
        assert_eq!(img.width, None);
        assert!(img.crop.is_none() && img.transform.is_none() && img.border.is_none());

        let xml = format!(
            r#"<w:drawing {NS}><wp:inline><wp:docPr id="3" name=""/><a:graphic><a:blip r:embed="rId5"/></a:graphic></wp:inline></w:drawing>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(parse_drawing(doc.root_element(), &rels()).unwrap().alt, "Image");
    }

    #[test]
    fn shapes_without_pictures_are_not_images() {
        let xml = format!(
            r#"<w:drawing {NS}><wp:inline><wp:extent cx="10" cy="10"/><a:graphic><a:graphicData/></a:graphic></wp:inline></w:drawing>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(parse_drawing(doc.root_element(), &rels()).is_none());
    }

    #[test]
    fn vml_imagedata() {
        let xml = format!(
            r#"<w:pict {NS}><v:shape style="width:72pt;height:1in"><v:imagedata r:id="rId5" o:title="Scan"/></v:shape></w:pict>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let img = parse_vml_image(doc.root_element(), &rels()).unwrap();
        assert_eq!(img.target.as_deref(), Some("word/media/image1.png"));
        assert_eq!((img.width, img.height), (Some(96), Some(96)));
        assert_eq!(img.alt, "Scan");
    }
}
