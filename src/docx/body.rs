use std::collections::HashMap;

use crate::model::{Block, Bookmark, Element, Heading, OutlineItem, Section};

use super::bookmarks::is_hidden;
use super::metadata::heading_level_for_style;
use super::runs::{ParsedParagraph, parse_paragraph};
use super::sections::{HeaderFooterRefs, parse_section};
use super::tables::parse_table;
use super::{ParseState, PartContext, WML_NS, collect_block_nodes, is_wml, wml};

const MAX_HEADING_LEVEL: u8 = 6;

/// Everything the main traversal produces in one pass over `w:body`.
#[derive(Default)]
pub(crate) struct BodyOutput {
    pub(crate) elements: Vec<Element>,
    pub(crate) outline: Vec<OutlineItem>,
    pub(crate) sections: Vec<Section>,
    pub(crate) header_footer_refs: HeaderFooterRefs,
}

/// Paragraphs and tables of a container (cell, header, footer, note).
pub(crate) fn parse_blocks(
    container: roxmltree::Node,
    ctx: &PartContext,
    state: &mut ParseState,
    table_style: Option<&str>,
) -> Vec<Block> {
    let mut blocks = Vec::new();
    for node in collect_block_nodes(container) {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "p" => blocks.push(Block::Paragraph(
                parse_paragraph(node, ctx, state, table_style).paragraph,
            )),
            "tbl" => blocks.push(Block::Table(parse_table(node, ctx, state))),
            _ => {}
        }
    }
    blocks
}

/// Heading level of a paragraph: from a heading-like style id, else from an
/// explicit outline level 0..8.
fn heading_level(parsed: &ParsedParagraph) -> Option<u8> {
    parsed
        .style_id
        .as_deref()
        .and_then(heading_level_for_style)
        .or_else(|| {
            parsed
                .paragraph
                .outline_level
                .filter(|lvl| *lvl < 9)
                .map(|lvl| lvl + 1)
        })
        .map(|lvl| lvl.min(MAX_HEADING_LEVEL))
}

fn outline_entry(parsed: &ParsedParagraph) -> Option<OutlineItem> {
    let style = parsed.style_id.as_deref()?;
    let level = heading_level_for_style(style)?;
    let text = parsed.paragraph.text();
    let title = text.trim();
    if title.is_empty() {
        return None;
    }
    Some(OutlineItem {
        level,
        title: title.to_string(),
        style: style.to_string(),
    })
}

struct BodyWalker<'a, 'c> {
    ctx: &'c PartContext<'c>,
    bookmarks: HashMap<&'a str, &'a Bookmark>,
    out: BodyOutput,
}

impl BodyWalker<'_, '_> {
    fn emit_bookmark(&mut self, id: &str) {
        if let Some(bm) = self.bookmarks.get(id)
            && !is_hidden(bm)
        {
            self.out.elements.push(Element::Bookmark((*bm).clone()));
        }
    }

    fn section_break(&mut self, sect_pr: roxmltree::Node) {
        self.out.sections.push(parse_section(sect_pr));
        self.out.header_footer_refs.record(sect_pr);
    }

    fn paragraph(&mut self, node: roxmltree::Node, state: &mut ParseState) {
        let parsed = parse_paragraph(node, self.ctx, state, None);
        for id in &parsed.bookmark_ids {
            self.emit_bookmark(id);
        }
        if parsed.paragraph.page_break_before {
            self.out.elements.push(Element::PageBreak);
        }
        if let Some(item) = outline_entry(&parsed) {
            self.out.outline.push(item);
        }

        let page_breaks = parsed.page_breaks;
        let element = match heading_level(&parsed) {
            Some(level) => Element::Heading(Heading {
                level,
                paragraph: parsed.paragraph,
            }),
            None => Element::Paragraph(parsed.paragraph),
        };
        self.out.elements.push(element);
        for _ in 0..page_breaks {
            self.out.elements.push(Element::PageBreak);
        }

        if let Some(sect_pr) = wml(node, "pPr").and_then(|ppr| wml(ppr, "sectPr")) {
            self.section_break(sect_pr);
            self.out.elements.push(Element::PageBreak);
        }
    }
}

/// The main traversal: body paragraphs and tables in document order, with
/// bookmarks, page breaks, the heading outline and section properties.
pub(crate) fn walk_body(
    body: roxmltree::Node,
    ctx: &PartContext,
    state: &mut ParseState,
    bookmarks: &[Bookmark],
) -> BodyOutput {
    let mut walker = BodyWalker {
        ctx,
        bookmarks: bookmarks.iter().map(|b| (b.id.as_str(), b)).collect(),
        out: BodyOutput::default(),
    };

    for node in collect_block_nodes(body) {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "p" => walker.paragraph(node, state),
            "tbl" => {
                let table = parse_table(node, ctx, state);
                walker.out.elements.push(Element::Table(table));
            }
            "sectPr" => walker.section_break(node),
            "bookmarkStart" => {
                if let Some(id) = node.attribute((WML_NS, "id")) {
                    walker.emit_bookmark(id);
                }
            }
            other => {
                if !is_wml(node, "bookmarkEnd") {
                    log::debug!("Skipping body element w:{other}");
                }
            }
        }
    }

    let out = walker.out;
    log::debug!(
        "Body: {} elements, {} outline entries, {} sections",
        out.elements.len(),
        out.outline.len(),
        out.sections.len()
    );
    out
}
