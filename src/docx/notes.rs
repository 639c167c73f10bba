use std::collections::BTreeMap;

use crate::model::{Document, Element, Note};

use super::body::parse_blocks;
use super::package::{Package, parse_optional};
use super::rels::Relationships;
use super::{ParseState, PartContext, WML_NS, is_wml};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    fn element(self) -> &'static str {
        match self {
            NoteKind::Footnote => "footnote",
            NoteKind::Endnote => "endnote",
        }
    }

    fn rel_type(self) -> &'static str {
        match self {
            NoteKind::Footnote => "/footnotes",
            NoteKind::Endnote => "/endnotes",
        }
    }

    fn default_part(self) -> &'static str {
        match self {
            NoteKind::Footnote => "word/footnotes.xml",
            NoteKind::Endnote => "word/endnotes.xml",
        }
    }
}

/// Word's built-in separator notes are not content.
fn is_separator(note: roxmltree::Node) -> bool {
    matches!(
        note.attribute((WML_NS, "type")),
        Some("separator" | "continuationSeparator" | "continuationNotice")
    )
}

/// Every footnote or endnote by id, with content parsed like body blocks.
pub(crate) fn parse_notes(
    package: &Package,
    ctx: &PartContext,
    state: &mut ParseState,
    kind: NoteKind,
) -> BTreeMap<String, Note> {
    let path = ctx
        .rels
        .find_by_type(kind.rel_type())
        .unwrap_or_else(|| kind.default_part().to_string());
    let Some(xml) = parse_optional(package, &path) else {
        return BTreeMap::new();
    };
    let rels = Relationships::load(package, &path);
    let part_ctx = ctx.with_rels(&rels);

    let mut notes = BTreeMap::new();
    for node in xml
        .root_element()
        .children()
        .filter(|n| is_wml(*n, kind.element()))
    {
        if is_separator(node) {
            continue;
        }
        let Some(id) = node.attribute((WML_NS, "id")) else {
            continue;
        };
        let content = parse_blocks(node, &part_ctx, state, None);
        notes.insert(
            id.to_string(),
            Note {
                id: id.to_string(),
                content,
            },
        );
    }
    log::debug!("{path}: {} {}s", notes.len(), kind.element());
    notes
}

fn numeric_order(notes: &BTreeMap<String, Note>) -> Vec<&Note> {
    let mut sorted: Vec<&Note> = notes.values().collect();
    sorted.sort_by_key(|n| (n.id.parse::<i64>().unwrap_or(i64::MAX), n.id.clone()));
    sorted
}

/// Append note bodies after the main content: footnotes, then endnotes, each
/// in numeric id order.
pub(crate) fn append_note_elements(doc: &mut Document) {
    let footnotes: Vec<Element> = numeric_order(&doc.footnotes)
        .into_iter()
        .map(|n| Element::Footnote(n.clone()))
        .collect();
    let endnotes: Vec<Element> = numeric_order(&doc.endnotes)
        .into_iter()
        .map(|n| Element::Endnote(n.clone()))
        .collect();
    doc.elements.extend(footnotes);
    doc.elements.extend(endnotes);
}
