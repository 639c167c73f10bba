#![allow(dead_code)]

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

use zip::write::SimpleFileOptions;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Root element attributes shared by every WordprocessingML part the tests write.
pub fn wml_namespaces() -> String {
    format!(
        r#"xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#
    )
}

/// Builds a DOCX package in memory, one part at a time.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    styles: Option<String>,
    numbering: Option<String>,
    document_rels: Vec<(String, String, String, bool)>,
    parts: Vec<(String, Vec<u8>)>,
    skip_document: bool,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `w:body` content.
    pub fn body(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    /// Raw content of `w:styles`.
    pub fn styles(mut self, xml: &str) -> Self {
        self.styles = Some(xml.to_string());
        self
    }

    /// Raw content of `w:numbering`.
    pub fn numbering(mut self, xml: &str) -> Self {
        self.numbering = Some(xml.to_string());
        self
    }

    /// Relationship of `word/document.xml`. `rel_type` is the suffix after
    /// the officeDocument relationships base ("image", "header", ...).
    pub fn rel(mut self, id: &str, rel_type: &str, target: &str) -> Self {
        self.document_rels
            .push((id.into(), rel_type.into(), target.into(), false));
        self
    }

    pub fn external_rel(mut self, id: &str, rel_type: &str, target: &str) -> Self {
        self.document_rels
            .push((id.into(), rel_type.into(), target.into(), true));
        self
    }

    /// Any other part, stored as-is.
    pub fn part(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.parts.push((name.to_string(), data.into()));
        self
    }

    /// A WordprocessingML part whose root is `<w:{root}>` with the standard namespaces.
    pub fn wml_part(self, name: &str, root: &str, inner: &str) -> Self {
        let xml = format!(r#"<w:{root} {}>{inner}</w:{root}>"#, wml_namespaces());
        self.part(name, xml)
    }

    pub fn without_document(mut self) -> Self {
        self.skip_document = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let mut put = |name: &str, data: &[u8]| {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        };

        put(
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#.as_slice(),
        );
        put(
            "_rels/.rels",
            format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="word/document.xml"/></Relationships>"#
            )
            .as_bytes(),
        );
        if !self.skip_document {
            let doc = format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {}><w:body>{}</w:body></w:document>"#,
                wml_namespaces(),
                self.body
            );
            put("word/document.xml", doc.as_bytes());
        }
        if let Some(styles) = &self.styles {
            let xml = format!(r#"<w:styles {}>{styles}</w:styles>"#, wml_namespaces());
            put("word/styles.xml", xml.as_bytes());
        }
        if let Some(numbering) = &self.numbering {
            let xml = format!(r#"<w:numbering {}>{numbering}</w:numbering>"#, wml_namespaces());
            put("word/numbering.xml", xml.as_bytes());
        }
        if !self.document_rels.is_empty() {
            let rels: String = self
                .document_rels
                .iter()
                .map(|(id, ty, target, external)| {
                    let mode = if *external { r#" TargetMode="External""# } else { "" };
                    format!(r#"<Relationship Id="{id}" Type="{REL_BASE}/{ty}" Target="{target}"{mode}/>"#)
                })
                .collect();
            let xml = format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
            );
            put("word/_rels/document.xml.rels", xml.as_bytes());
        }
        for (name, data) in &self.parts {
            put(name, data);
        }
        zip.finish().unwrap().into_inner()
    }
}

/// `<w:p>` with a single plain run, optionally styled.
pub fn para(style: Option<&str>, text: &str) -> String {
    let ppr = style
        .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
        .unwrap_or_default();
    format!(r#"<w:p>{ppr}<w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

/// A solid-colour PNG encoded with the `image` crate.
pub fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Inline drawing referencing `rel_id`, sized in EMU.
pub fn drawing(rel_id: &str, name: &str, cx: i64, cy: i64) -> String {
    format!(
        r#"<w:r><w:drawing><wp:inline><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="1" name="{name}"/><a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed="{rel_id}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
    )
}

fn load_skiplist() -> HashSet<String> {
    let path = Path::new("tests/fixtures/SKIPLIST");
    let Ok(content) = fs::read_to_string(path) else {
        return HashSet::new();
    };
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect()
}

pub fn group_name(fixture: &Path) -> String {
    fixture
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

/// Fixtures under tests/fixtures/<group>/<case>/input.docx. Filter with
/// DOCXIDE_CASE (case name) and DOCXIDE_GROUP (folder name).
pub fn discover_fixtures() -> io::Result<Vec<PathBuf>> {
    let fixtures_dir = Path::new("tests/fixtures");
    let case_filter = std::env::var("DOCXIDE_CASE").ok();
    let group_filter = std::env::var("DOCXIDE_GROUP").ok();
    let skiplist = load_skiplist();
    let mut fixtures: Vec<PathBuf> = Vec::new();
    for group_entry in fs::read_dir(fixtures_dir)? {
        let group = group_entry?.path();
        if !group.is_dir() {
            continue;
        }
        let gname = group.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if group_filter.as_deref().is_some_and(|gf| gf != gname) {
            continue;
        }
        for entry in fs::read_dir(&group)? {
            let path = entry?.path();
            if !path.join("input.docx").is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            match &case_filter {
                Some(filter) if name == filter => fixtures.push(path),
                Some(_) => {}
                None if !skiplist.contains(name) && !skiplist.contains(gname) => fixtures.push(path),
                None => {}
            }
        }
    }
    fixtures.sort();
    Ok(fixtures)
}
