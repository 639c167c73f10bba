mod body;
mod bookmarks;
mod comments;
mod drawing;
pub(crate) mod metadata;
mod notes;
mod numbering;
mod package;
mod rels;
mod runs;
mod sections;
mod styles;
mod tables;
mod theme;

use std::collections::HashMap;
use std::time::Instant;

use crate::ParseOptions;
use crate::error::Error;
use crate::fields::FieldContext;
use crate::model::{
    Border, CoreProperties, Document, Metadata, Shading, StyleKind, StyleUsage,
};

use numbering::{Numbering, NumberingState};
use package::{Package, parse_optional};
use rels::{REL_TYPE_OFFICE_DOCUMENT, Relationships};
use styles::{StyleSheet, empty_stylesheet, parse_styles_xml};
use theme::{Theme, resolve_theme_color};

pub(super) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(super) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(super) const WPD_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(super) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(super) const VML_NS: &str = "urn:schemas-microsoft-com:vml";

const MAIN_DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const CORE_PART: &str = "docProps/core.xml";
const APP_PART: &str = "docProps/app.xml";

pub(super) fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

pub(super) fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val == "auto" || val.len() != 6 || !val.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&val[0..2], 16).ok()?;
    let g = u8::from_str_radix(&val[2..4], 16).ok()?;
    let b = u8::from_str_radix(&val[4..6], 16).ok()?;
    Some([r, g, b])
}

pub(super) fn highlight_color(name: &str) -> Option<[u8; 3]> {
    match name {
        "yellow" => Some([255, 255, 0]),
        "green" => Some([0, 255, 0]),
        "cyan" => Some([0, 255, 255]),
        "magenta" => Some([255, 0, 255]),
        "red" => Some([255, 0, 0]),
        "blue" => Some([0, 0, 255]),
        "darkYellow" => Some([128, 128, 0]),
        "darkGreen" => Some([0, 128, 0]),
        "darkCyan" => Some([0, 128, 128]),
        "darkMagenta" => Some([128, 0, 128]),
        "darkRed" => Some([128, 0, 0]),
        "darkBlue" => Some([0, 0, 128]),
        "lightGray" => Some([192, 192, 192]),
        "darkGray" => Some([128, 128, 128]),
        "black" => Some([0, 0, 0]),
        "white" => Some([255, 255, 255]),
        _ => None,
    }
}

pub(super) fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:strike).
/// Present with no val or val != "0"/"false" means true.
pub(super) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false")
    })
}

pub(super) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

pub(super) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

pub(super) fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .map(twips_to_pts)
}

/// One border edge (`w:top`, `w:bdr`, `w:tl2br`, ...). "none"/"nil" is no border.
pub(super) fn parse_border(node: roxmltree::Node, theme: &Theme) -> Option<Border> {
    let val = node.attribute((WML_NS, "val")).unwrap_or("none");
    if val == "none" || val == "nil" {
        return None;
    }
    let width = node
        .attribute((WML_NS, "sz"))
        .and_then(|v| v.parse::<f32>().ok())
        .map(|v| v / 8.0)
        .unwrap_or(0.5);
    let space = node
        .attribute((WML_NS, "space"))
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(0.0);
    let color = node
        .attribute((WML_NS, "themeColor"))
        .and_then(|tc| resolve_theme_color(tc, theme))
        .or_else(|| node.attribute((WML_NS, "color")).and_then(parse_hex_color));
    Some(Border {
        style: val.to_string(),
        color,
        width,
        space,
    })
}

pub(super) fn parse_shading(node: roxmltree::Node, theme: &Theme) -> Option<Shading> {
    let fill = node
        .attribute((WML_NS, "themeFill"))
        .and_then(|tc| resolve_theme_color(tc, theme))
        .or_else(|| node.attribute((WML_NS, "fill")).and_then(parse_hex_color));
    let color = node
        .attribute((WML_NS, "themeColor"))
        .and_then(|tc| resolve_theme_color(tc, theme))
        .or_else(|| node.attribute((WML_NS, "color")).and_then(parse_hex_color));
    let pattern = node
        .attribute((WML_NS, "val"))
        .filter(|v| *v != "nil")
        .map(str::to_string);
    let is_blank = fill.is_none() && color.is_none() && matches!(pattern.as_deref(), None | Some("clear"));
    (!is_blank).then_some(Shading { pattern, fill, color })
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
pub(super) fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children().filter(|n| n.is_element()) {
        if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(collect_block_nodes(content));
            }
        } else if is_wml(child, "customXml") {
            nodes.extend(collect_block_nodes(child));
        } else {
            nodes.push(child);
        }
    }
    nodes
}

/// Lookup tables shared by everything parsed out of one part.
#[derive(Clone, Copy)]
pub(crate) struct PartContext<'a> {
    pub(crate) styles: &'a StyleSheet,
    pub(crate) theme: &'a Theme,
    pub(crate) numbering: &'a Numbering,
    pub(crate) rels: &'a Relationships,
    pub(crate) options: &'a ParseOptions,
}

impl<'a> PartContext<'a> {
    /// Same tables, but relationship ids resolve against another part.
    pub(crate) fn with_rels(&self, rels: &'a Relationships) -> PartContext<'a> {
        PartContext { rels, ..*self }
    }
}

/// Counters owned by a single parse: list numbering, SEQ fields, style usage.
pub(crate) struct ParseState {
    pub(crate) lists: NumberingState,
    pub(crate) fields: FieldContext,
    style_counts: HashMap<(String, StyleKind), u32>,
}

impl ParseState {
    pub(crate) fn new(metadata: CoreProperties) -> ParseState {
        ParseState {
            lists: NumberingState::default(),
            fields: FieldContext {
                metadata,
                ..Default::default()
            },
            style_counts: HashMap::new(),
        }
    }

    pub(crate) fn count_style(&mut self, style_id: &str, kind: StyleKind) {
        *self
            .style_counts
            .entry((style_id.to_string(), kind))
            .or_default() += 1;
    }

    pub(crate) fn style_usage(&self) -> Vec<StyleUsage> {
        metadata::sorted_style_usage(&self.style_counts)
    }
}

fn read_metadata<T: Default>(
    package: &Package,
    part: &str,
    parse: fn(&str) -> Result<T, crate::error::MetadataError>,
) -> T {
    let Some(text) = package.text(part) else {
        return T::default();
    };
    match parse(text) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Ignoring {part}: {e}");
            T::default()
        }
    }
}

pub(crate) fn parse_package(bytes: &[u8], options: &ParseOptions) -> Result<Document, Error> {
    let t0 = Instant::now();
    let package = Package::open(bytes)?;

    let main_part = Relationships::load(&package, "")
        .find_by_type(REL_TYPE_OFFICE_DOCUMENT)
        .filter(|p| package.contains(p))
        .unwrap_or_else(|| MAIN_DOCUMENT_PART.to_string());
    let text = package
        .text(&main_part)
        .ok_or_else(|| Error::Package(format!("missing main document part {main_part}")))?;
    let xml = roxmltree::Document::parse(text)?;
    let body_node = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::Package(format!("{main_part} has no w:body")))?;

    let theme = theme::parse_theme(&package);
    let styles = match parse_optional(&package, STYLES_PART) {
        Some(xml) => parse_styles_xml(&xml, &theme),
        None => empty_stylesheet(&theme),
    };
    let numbering = parse_optional(&package, NUMBERING_PART)
        .map(|xml| Numbering::parse(&xml, &theme))
        .unwrap_or_default();
    let rels = Relationships::load(&package, &main_part);
    log::debug!(
        "{main_part}: {} relationships ({} headers, {} footers)",
        rels.len(),
        rels.count_of_type(rels::REL_TYPE_HEADER),
        rels.count_of_type(rels::REL_TYPE_FOOTER)
    );
    let core = read_metadata(&package, CORE_PART, metadata::parse_core_properties);
    let app = read_metadata(&package, APP_PART, metadata::parse_app_properties);

    let bookmarks = bookmarks::collect_bookmarks(body_node);
    let mut state = ParseState::new(core.clone());
    for bm in &bookmarks {
        state.fields.add_bookmark(&bm.id, &bm.name, &bm.text);
    }
    let t_pre = t0.elapsed();

    let ctx = PartContext {
        styles: &styles,
        theme: &theme,
        numbering: &numbering,
        rels: &rels,
        options,
    };
    let walked = body::walk_body(body_node, &ctx, &mut state, &bookmarks);
    let t_body = t0.elapsed();

    let (headers, footers) =
        sections::parse_headers_footers(&package, &ctx, &mut state, &walked.header_footer_refs);
    let footnotes = notes::parse_notes(&package, &ctx, &mut state, notes::NoteKind::Footnote);
    let endnotes = notes::parse_notes(&package, &ctx, &mut state, notes::NoteKind::Endnote);
    let comments = if options.preserve_comments {
        comments::parse_comments(&package)
    } else {
        Vec::new()
    };
    let style_usage = if options.preserve_styles {
        state.style_usage()
    } else {
        Vec::new()
    };

    let mut doc = Document {
        elements: walked.elements,
        metadata: Metadata {
            core,
            app,
            outline: walked.outline,
            style_usage,
        },
        headers,
        footers,
        sections: walked.sections,
        footnotes,
        endnotes,
        comments,
        warnings: Vec::new(),
    };
    let t_parts = t0.elapsed();

    if options.extract_images {
        drawing::fill_images(&mut doc, &package);
    }
    let t_images = t0.elapsed();

    notes::append_note_elements(&mut doc);

    log::info!(
        "Timing: preprocess={:.1}ms, body={:.1}ms, parts={:.1}ms, images={:.1}ms, total={:.1}ms ({} elements)",
        t_pre.as_secs_f64() * 1000.0,
        (t_body - t_pre).as_secs_f64() * 1000.0,
        (t_parts - t_body).as_secs_f64() * 1000.0,
        (t_images - t_parts).as_secs_f64() * 1000.0,
        t0.elapsed().as_secs_f64() * 1000.0,
        doc.elements.len(),
    );

    Ok(doc)
}
