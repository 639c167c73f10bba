use std::sync::LazyLock;

use regex::Regex;

use crate::fields::{FieldDescriptor, FieldType, evaluate_field, parse_field};
use crate::model::{
    FieldMarker, Image, Indentation, Paragraph, Run, Spacing, StyleKind, VertAlign,
};

use super::drawing;
use super::numbering::symbol_pua_to_unicode;
use super::rels::REL_TYPE_HYPERLINK;
use super::styles::{CascadeInput, ParaProps, RunProps};
use super::{PartContext, ParseState, REL_NS, WML_NS, is_wml, wml};

static PUNCTUATION_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\p{P}\p{S}]+$").expect("valid regex"));

/// Language tags that may stay on punctuation-only runs.
const NEUTRAL_LANGS: &[&str] = &["en-US", "en-GB", "en", "default"];

fn is_punctuation_only(text: &str) -> bool {
    !text.is_empty() && PUNCTUATION_ONLY.is_match(text)
}

#[derive(Clone, Debug, PartialEq)]
struct Link {
    target: String,
    internal: bool,
}

/// A field between its `begin` and `end` markers.
#[derive(Debug)]
struct OpenField {
    instruction: String,
    /// Run properties at `begin`; the evaluated text is styled with these.
    props: RunProps,
    link: Option<Link>,
    depth: u32,
    /// Images collected before the field began.
    images_before: usize,
}

#[derive(Debug, Default)]
enum FieldState {
    #[default]
    Idle,
    Instruction(OpenField),
    AwaitingEnd(OpenField),
}

/// Everything the walker learned about one `w:p`.
#[derive(Debug)]
pub(crate) struct ParsedParagraph {
    pub(crate) paragraph: Paragraph,
    /// Effective paragraph style id, kept even when styles are not preserved.
    pub(crate) style_id: Option<String>,
    /// `w:br w:type="page"` markers seen inside the paragraph.
    pub(crate) page_breaks: usize,
    pub(crate) bookmark_ids: Vec<String>,
}

struct RunWalker<'c, 'a> {
    ctx: &'c PartContext<'a>,
    state: &'c mut ParseState,
    paragraph_style: Option<String>,
    table_style: Option<String>,
    field: FieldState,
    runs: Vec<Run>,
    images: Vec<Image>,
    page_breaks: usize,
    bookmark_ids: Vec<String>,
}

impl RunWalker<'_, '_> {
    fn walk(&mut self, parent: roxmltree::Node, link: Option<&Link>) {
        for child in parent.children().filter(|n| n.is_element()) {
            if child.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match child.tag_name().name() {
                "r" => self.run(child, link),
                "hyperlink" => {
                    let inner = self.hyperlink_target(child);
                    self.walk(child, inner.as_ref().or(link));
                }
                "sdt" => {
                    if let Some(content) = wml(child, "sdtContent") {
                        self.walk(content, link);
                    }
                }
                "fldSimple" => self.simple_field(child, link),
                "ins" | "moveTo" | "smartTag" | "customXml" | "dir" | "bdo" => self.walk(child, link),
                "bookmarkStart" => {
                    if let Some(id) = child.attribute((WML_NS, "id")) {
                        self.bookmark_ids.push(id.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    fn hyperlink_target(&self, node: roxmltree::Node) -> Option<Link> {
        let anchor = node.attribute((WML_NS, "anchor"));
        if let Some(rel_id) = node.attribute((REL_NS, "id")) {
            if let Some(rel) = self.ctx.rels.get(rel_id)
                && !rel.rel_type.ends_with(REL_TYPE_HYPERLINK)
            {
                log::debug!("Hyperlink {rel_id}: unexpected relationship type {}", rel.rel_type);
            }
            match self.ctx.rels.url(rel_id) {
                Some(url) => {
                    let target = match anchor {
                        Some(a) => format!("{url}#{a}"),
                        None => url.to_string(),
                    };
                    return Some(Link {
                        target,
                        internal: false,
                    });
                }
                None => log::debug!("Hyperlink {rel_id}: relationship not found"),
            }
        }
        anchor.map(|a| Link {
            target: format!("#{a}"),
            internal: true,
        })
    }

    fn run(&mut self, r: roxmltree::Node, link: Option<&Link>) {
        let direct = wml(r, "rPr")
            .map(|rpr| RunProps::parse(rpr, self.ctx.theme))
            .unwrap_or_default();
        if self.ctx.options.preserve_styles
            && let Some(id) = &direct.style_id
        {
            self.state.count_style(id, StyleKind::Character);
        }

        let mut text = String::new();
        for child in r.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "AlternateContent" {
                self.alternate_content(child);
                continue;
            }
            if child.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match child.tag_name().name() {
                "fldChar" => {
                    self.flush(&mut text, &direct, link);
                    self.field_char(child, &direct, link);
                }
                "instrText" => {
                    if let FieldState::Instruction(open) = &mut self.field
                        && open.depth == 0
                    {
                        open.instruction.push_str(child.text().unwrap_or(""));
                    }
                }
                "drawing" => {
                    if let Some(image) = drawing::parse_drawing(child, self.ctx.rels) {
                        self.images.push(image);
                    }
                }
                "pict" | "object" => {
                    if let Some(image) = drawing::parse_vml_image(child, self.ctx.rels) {
                        self.images.push(image);
                    }
                }
                // the cached text result is re-derived, not copied
                _ if !matches!(self.field, FieldState::Idle) => {}
                "t" => text.push_str(child.text().unwrap_or("")),
                "tab" | "ptab" => text.push('\t'),
                "br" => match child.attribute((WML_NS, "type")) {
                    Some("page") => {
                        self.flush(&mut text, &direct, link);
                        self.page_breaks += 1;
                    }
                    Some("column") => {}
                    _ => text.push('\n'),
                },
                "cr" => text.push('\n'),
                "noBreakHyphen" => text.push('\u{2011}'),
                "softHyphen" => text.push('\u{00AD}'),
                "sym" => {
                    if let Some(c) = child
                        .attribute((WML_NS, "char"))
                        .and_then(|v| u32::from_str_radix(v, 16).ok())
                        .and_then(|cp| symbol_pua_to_unicode(cp).or_else(|| char::from_u32(cp)))
                    {
                        text.push(c);
                    }
                }
                name @ ("footnoteReference" | "endnoteReference") => {
                    self.flush(&mut text, &direct, link);
                    let Some(id) = child.attribute((WML_NS, "id")) else {
                        continue;
                    };
                    let mut note = self.make_run(id.to_string(), &direct, link);
                    note.vertical_align = VertAlign::Superscript;
                    if name == "footnoteReference" {
                        note.footnote_ref = Some(id.to_string());
                    } else {
                        note.endnote_ref = Some(id.to_string());
                    }
                    self.runs.push(note);
                }
                _ => {}
            }
        }
        self.flush(&mut text, &direct, link);
    }

    /// `mc:AlternateContent`: prefer the modern drawing, fall back to VML.
    fn alternate_content(&mut self, node: roxmltree::Node) {
        let image = node.descendants().find_map(|n| {
            if is_wml(n, "drawing") {
                drawing::parse_drawing(n, self.ctx.rels)
            } else if is_wml(n, "pict") {
                drawing::parse_vml_image(n, self.ctx.rels)
            } else {
                None
            }
        });
        if let Some(image) = image {
            self.images.push(image);
        }
    }

    fn field_char(&mut self, node: roxmltree::Node, direct: &RunProps, link: Option<&Link>) {
        let kind = node.attribute((WML_NS, "fldCharType")).unwrap_or("");
        self.field = match (kind, std::mem::take(&mut self.field)) {
            ("begin", FieldState::Idle) => FieldState::Instruction(OpenField {
                instruction: String::new(),
                props: direct.clone(),
                link: link.cloned(),
                depth: 0,
                images_before: self.images.len(),
            }),
            ("begin", FieldState::Instruction(mut open)) => {
                open.depth += 1;
                FieldState::Instruction(open)
            }
            ("begin", FieldState::AwaitingEnd(mut open)) => {
                open.depth += 1;
                FieldState::AwaitingEnd(open)
            }
            ("separate", FieldState::Instruction(open)) if open.depth == 0 => {
                FieldState::AwaitingEnd(open)
            }
            ("end", FieldState::Instruction(mut open)) if open.depth > 0 => {
                open.depth -= 1;
                FieldState::Instruction(open)
            }
            ("end", FieldState::AwaitingEnd(mut open)) if open.depth > 0 => {
                open.depth -= 1;
                FieldState::AwaitingEnd(open)
            }
            ("end", FieldState::Instruction(open) | FieldState::AwaitingEnd(open)) => {
                self.finish_field(open);
                FieldState::Idle
            }
            (_, other) => other,
        };
    }

    fn simple_field(&mut self, node: roxmltree::Node, link: Option<&Link>) {
        if !matches!(self.field, FieldState::Idle) {
            return;
        }
        let props = node
            .children()
            .find(|n| is_wml(*n, "r"))
            .and_then(|r| wml(r, "rPr"))
            .map(|rpr| RunProps::parse(rpr, self.ctx.theme))
            .unwrap_or_default();
        self.finish_field(OpenField {
            instruction: node.attribute((WML_NS, "instr")).unwrap_or("").to_string(),
            props,
            link: link.cloned(),
            depth: 0,
            images_before: self.images.len(),
        });
    }

    fn finish_field(&mut self, open: OpenField) {
        if open.instruction.trim().is_empty() {
            return;
        }
        let descriptor = parse_field(&open.instruction);
        if descriptor.field_type == FieldType::Unknown && self.images.len() > open.images_before {
            log::debug!("Field {:?} result is a picture", descriptor.instruction);
            return;
        }
        let text = evaluate_field(&descriptor, &mut self.state.fields);
        log::debug!("Field {:?} -> {text:?}", descriptor.instruction);
        if text.is_empty() {
            return;
        }
        let link = field_link(&descriptor).or(open.link);
        let mut run = self.make_run(text, &open.props, link.as_ref());
        run.field = Some(FieldMarker {
            field_type: descriptor.field_type.as_str().to_string(),
            instruction: descriptor.instruction,
        });
        self.runs.push(run);
    }

    /// A field still open when the paragraph ends is evaluated there.
    fn close_open_field(&mut self) {
        match std::mem::take(&mut self.field) {
            FieldState::Idle => {}
            FieldState::Instruction(open) | FieldState::AwaitingEnd(open) => {
                log::debug!("Field {:?} not closed within its paragraph", open.instruction);
                self.finish_field(open);
            }
        }
    }

    fn flush(&mut self, text: &mut String, direct: &RunProps, link: Option<&Link>) {
        if text.is_empty() {
            return;
        }
        let run = self.make_run(std::mem::take(text), direct, link);
        self.runs.push(run);
    }

    fn make_run(&self, text: String, direct: &RunProps, link: Option<&Link>) -> Run {
        let p = self.ctx.styles.resolve_run(CascadeInput {
            paragraph_style: self.paragraph_style.as_deref(),
            table_style: self.table_style.as_deref(),
            direct_para: None,
            direct_run: Some(direct),
        });
        let lang = p
            .lang
            .filter(|l| !is_punctuation_only(&text) || NEUTRAL_LANGS.contains(&l.as_str()));
        let font_name = p
            .fonts
            .ascii
            .clone()
            .or_else(|| p.fonts.high_ansi.clone())
            .or_else(|| p.fonts.east_asia.clone())
            .or_else(|| p.fonts.complex_script.clone());
        Run {
            text,
            bold: p.bold.unwrap_or(false),
            italic: p.italic.unwrap_or(false),
            underline: p.underline.unwrap_or(false),
            underline_style: p.underline_style,
            strikethrough: p.strikethrough.unwrap_or(false),
            double_strikethrough: p.double_strikethrough.unwrap_or(false),
            vertical_align: p.vertical_align.unwrap_or_default(),
            caps: p.caps.unwrap_or(false),
            small_caps: p.small_caps.unwrap_or(false),
            emboss: p.emboss.unwrap_or(false),
            imprint: p.imprint.unwrap_or(false),
            outline: p.outline.unwrap_or(false),
            shadow: p.shadow.unwrap_or(false),
            hidden: p.hidden.unwrap_or(false),
            font_size: p.font_size,
            font_size_cs: p.font_size_cs,
            character_spacing: p.character_spacing,
            position: p.position,
            kerning: p.kerning,
            text_scale: p.text_scale,
            fonts: p.fonts,
            font_name,
            color: p.color,
            background: p.background,
            emphasis: p.emphasis,
            border: p.border,
            lang,
            style: direct
                .style_id
                .clone()
                .filter(|_| self.ctx.options.preserve_styles),
            hyperlink: link.map(|l| l.target.clone()),
            internal_link: link.is_some_and(|l| l.internal),
            footnote_ref: None,
            endnote_ref: None,
            field: None,
        }
    }
}

/// Link carried by a field's own result: HYPERLINK targets, and `\h` cross-references.
fn field_link(descriptor: &FieldDescriptor) -> Option<Link> {
    match descriptor.field_type {
        FieldType::Hyperlink => {
            if let Some(anchor) = &descriptor.bookmark_ref {
                Some(Link {
                    target: format!("#{anchor}"),
                    internal: true,
                })
            } else {
                descriptor.hyperlink.as_ref().map(|url| Link {
                    target: url.clone(),
                    internal: false,
                })
            }
        }
        FieldType::Ref | FieldType::PageRef | FieldType::NoteRef
            if descriptor.has_switch("\\h") =>
        {
            descriptor.bookmark_ref.as_ref().map(|bm| Link {
                target: format!("#{bm}"),
                internal: true,
            })
        }
        _ => None,
    }
}

fn spacing_of(p: &ParaProps) -> Option<Spacing> {
    if p.space_before.is_none() && p.space_after.is_none() && p.line_spacing.is_none() {
        return None;
    }
    Some(Spacing {
        before: p.space_before,
        after: p.space_after,
        line: p.line_spacing,
    })
}

fn indentation_of(p: &ParaProps) -> Option<Indentation> {
    if p.indent_left.is_none()
        && p.indent_right.is_none()
        && p.indent_hanging.is_none()
        && p.indent_first_line.is_none()
    {
        return None;
    }
    Some(Indentation {
        left: p.indent_left,
        right: p.indent_right,
        hanging: p.indent_hanging,
        first_line: p.indent_first_line,
    })
}

/// Walk one `w:p`: resolve its properties through the cascade, consume a list
/// counter when it is numbered, and turn its runs into resolved `Run`s.
pub(crate) fn parse_paragraph(
    node: roxmltree::Node,
    ctx: &PartContext,
    state: &mut ParseState,
    table_style: Option<&str>,
) -> ParsedParagraph {
    let mut direct = wml(node, "pPr")
        .map(|ppr| ParaProps::parse(ppr, ctx.theme))
        .unwrap_or_default();
    if ctx.options.preserve_styles
        && let Some(id) = &direct.style_id
    {
        state.count_style(id, StyleKind::Paragraph);
    }
    let style_id = ctx
        .styles
        .paragraph_style_id(direct.style_id.as_deref())
        .map(str::to_string);

    // direct numPr wins; otherwise the paragraph style's (inherited) numPr
    let style_para = style_id
        .as_deref()
        .and_then(|id| ctx.styles.get(id))
        .map(|s| &s.para);
    let num_id = direct
        .num_id
        .clone()
        .or_else(|| style_para.and_then(|p| p.num_id.clone()));
    let level = direct
        .num_level
        .or_else(|| style_para.and_then(|p| p.num_level))
        .unwrap_or(0);
    let list = num_id
        .as_deref()
        .and_then(|id| state.lists.next(ctx.numbering, id, level));
    if let Some(info) = &list
        && let Some(def) = ctx.numbering.resolve(&info.num_id, level)
    {
        // list indentation sits between direct formatting and the style
        direct.indent_left = direct.indent_left.or(def.indent_left);
        direct.indent_hanging = direct.indent_hanging.or(def.indent_hanging);
    }

    let resolved = ctx.styles.resolve_paragraph(CascadeInput {
        paragraph_style: style_id.as_deref(),
        table_style,
        direct_para: Some(&direct),
        direct_run: None,
    });

    let mut walker = RunWalker {
        ctx,
        state,
        paragraph_style: style_id.clone(),
        table_style: table_style.map(str::to_string),
        field: FieldState::Idle,
        runs: Vec::new(),
        images: Vec::new(),
        page_breaks: 0,
        bookmark_ids: Vec::new(),
    };
    walker.walk(node, None);
    walker.close_open_field();
    let RunWalker {
        runs,
        images,
        page_breaks,
        bookmark_ids,
        ..
    } = walker;

    let paragraph = Paragraph {
        runs,
        style: style_id.clone().filter(|_| ctx.options.preserve_styles),
        list,
        alignment: resolved.alignment,
        spacing: spacing_of(&resolved),
        indentation: indentation_of(&resolved),
        borders: resolved.borders.clone(),
        shading: resolved.shading.clone(),
        keep_next: resolved.keep_next.unwrap_or(false),
        keep_lines: resolved.keep_lines.unwrap_or(false),
        page_break_before: resolved.page_break_before.unwrap_or(false),
        outline_level: resolved.outline_level,
        bidi: resolved.bidi.unwrap_or(false),
        text_direction: resolved.text_direction.clone(),
        images,
    };

    ParsedParagraph {
        paragraph,
        style_id,
        page_breaks,
        bookmark_ids,
    }
}
