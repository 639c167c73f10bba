use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
    Distribute,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VertAlign {
    #[default]
    Baseline,
    Superscript,
    Subscript,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "rule", content = "value", rename_all = "camelCase")]
pub enum LineSpacing {
    Auto(f32),    // multiplier (e.g. 1.0 = single, 1.15 = default)
    Exact(f32),   // fixed height in points
    AtLeast(f32), // minimum height in points
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    pub before: Option<f32>, // points
    pub after: Option<f32>,
    pub line: Option<LineSpacing>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indentation {
    pub left: Option<f32>, // points
    pub right: Option<f32>,
    pub hanging: Option<f32>,
    pub first_line: Option<f32>,
}

/// A resolved border edge. Width and spacing are in points.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub style: String,
    pub color: Option<[u8; 3]>,
    pub width: f32,
    pub space: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shading {
    pub pattern: Option<String>,
    pub fill: Option<[u8; 3]>,
    pub color: Option<[u8; 3]>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphBorders {
    pub top: Option<Border>,
    pub bottom: Option<Border>,
    pub left: Option<Border>,
    pub right: Option<Border>,
    pub between: Option<Border>,
    pub bar: Option<Border>,
}

impl ParagraphBorders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
            && self.bottom.is_none()
            && self.left.is_none()
            && self.right.is_none()
            && self.between.is_none()
            && self.bar.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFamilies {
    pub ascii: Option<String>,
    pub east_asia: Option<String>,
    pub complex_script: Option<String>,
    pub high_ansi: Option<String>,
}

/// Which field produced a run's text.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMarker {
    pub field_type: String,
    pub instruction: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub underline_style: Option<String>,
    pub strikethrough: bool,
    pub double_strikethrough: bool,
    pub vertical_align: VertAlign,
    pub caps: bool,
    pub small_caps: bool,
    pub emboss: bool,
    pub imprint: bool,
    pub outline: bool,
    pub shadow: bool,
    pub hidden: bool,
    pub font_size: Option<f32>, // points
    pub font_size_cs: Option<f32>,
    pub character_spacing: Option<f32>, // points
    pub position: Option<f32>,          // points, positive raises
    pub kerning: Option<f32>,           // minimum font size in points
    pub text_scale: Option<u32>,        // percent
    pub fonts: FontFamilies,
    pub font_name: Option<String>,
    pub color: Option<[u8; 3]>,
    pub background: Option<[u8; 3]>,
    pub emphasis: Option<String>,
    pub border: Option<Border>,
    pub lang: Option<String>,
    pub style: Option<String>,
    pub hyperlink: Option<String>,
    pub internal_link: bool,
    #[serde(rename = "_footnoteRef")]
    pub footnote_ref: Option<String>,
    #[serde(rename = "_endnoteRef")]
    pub endnote_ref: Option<String>,
    pub field: Option<FieldMarker>,
}

impl Run {
    pub fn is_superscript(&self) -> bool {
        self.vertical_align == VertAlign::Superscript
    }

    pub fn is_subscript(&self) -> bool {
        self.vertical_align == VertAlign::Subscript
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListKind {
    Bullet,
    Ordered,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInfo {
    pub num_id: String,
    pub level: u8,
    pub kind: ListKind,
    pub format: String,
    pub marker: String,
    /// Font the marker glyph is drawn in (Symbol, Wingdings, ...).
    pub marker_font: Option<String>,
    pub counter: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub style: Option<String>,
    pub list: Option<ListInfo>,
    pub alignment: Option<Alignment>,
    pub spacing: Option<Spacing>,
    pub indentation: Option<Indentation>,
    pub borders: Option<ParagraphBorders>,
    pub shading: Option<Shading>,
    pub keep_next: bool,
    pub keep_lines: bool,
    pub page_break_before: bool,
    pub outline_level: Option<u8>,
    pub bidi: bool,
    pub text_direction: Option<String>,
    pub images: Vec<Image>,
}

impl Paragraph {
    /// Concatenated text of every run.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    pub level: u8,
    pub paragraph: Paragraph,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellVAlign {
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellBorders {
    pub top: Option<Border>,
    pub bottom: Option<Border>,
    pub left: Option<Border>,
    pub right: Option<Border>,
    pub inside_h: Option<Border>,
    pub inside_v: Option<Border>,
    pub tl2br: Option<Border>,
    pub tr2bl: Option<Border>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMargins {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl Default for CellMargins {
    fn default() -> Self {
        Self {
            top: 0.0,
            left: 5.4,
            bottom: 0.0,
            right: 5.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum TableWidth {
    Auto,
    Points(f32),
    Percent(f32),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub content: Vec<Block>,
    pub colspan: u32,
    pub rowspan: u32,
    pub grid_column: u32,
    pub borders: CellBorders,
    pub shading: Option<Shading>,
    pub margins: Option<CellMargins>,
    pub width: Option<TableWidth>,
    pub vertical_align: Option<CellVAlign>,
    pub text_direction: Option<String>,
}

impl TableCell {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.content.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }

    pub fn text(&self) -> String {
        self.paragraphs()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub is_header: bool,
    pub height: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub rows: Vec<TableRow>,
    pub style: Option<String>,
    pub column_widths: Vec<f32>, // points
    pub borders: CellBorders,
    pub width: Option<TableWidth>,
    pub cell_margins: CellMargins,
    pub alignment: Option<Alignment>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImagePlacement {
    #[default]
    Inline,
    Anchor,
}

/// Source rectangle crop, as fractions of the image (0.0..=1.0) cut from each edge.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCrop {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTransform {
    pub rotation: f32, // degrees
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub rel_id: String,
    /// Package path of the media part, when the relationship resolved.
    pub target: Option<String>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub mime_type: Option<String>,
    pub width: Option<u32>, // display size in pixels (96 dpi)
    pub height: Option<u32>,
    pub intrinsic_width: Option<u32>,
    pub intrinsic_height: Option<u32>,
    pub alt: String,
    pub title: Option<String>,
    pub placement: ImagePlacement,
    pub crop: Option<ImageCrop>,
    pub transform: Option<ImageTransform>,
    pub border: Option<Border>,
}

impl Image {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub name: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: Vec<Block>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooter {
    pub content: Vec<Block>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooterSet {
    pub default: Option<HeaderFooter>,
    pub first: Option<HeaderFooter>,
    pub even: Option<HeaderFooter>,
}

impl HeaderFooterSet {
    /// Variant shown on a 1-based page number.
    pub fn for_page(&self, page: u32) -> Option<&HeaderFooter> {
        if page == 1 {
            self.first.as_ref().or(self.default.as_ref())
        } else if page % 2 == 0 {
            self.even.as_ref().or(self.default.as_ref())
        } else {
            self.default.as_ref()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.first.is_none() && self.even.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionBreakType {
    #[default]
    NextPage,
    Continuous,
    OddPage,
    EvenPage,
    NextColumn,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub page_width: Option<f32>, // points
    pub page_height: Option<f32>,
    pub landscape: bool,
    pub margin_top: Option<f32>,
    pub margin_bottom: Option<f32>,
    pub margin_left: Option<f32>,
    pub margin_right: Option<f32>,
    pub columns: u32,
    pub break_type: SectionBreakType,
    pub title_page: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub keywords: Vec<String>,
    pub language: Option<String>,
    pub last_modified_by: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub last_printed: Option<DateTime<Utc>>,
    pub revision: Option<u32>,
    pub category: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppProperties {
    pub application: Option<String>,
    pub app_version: Option<String>,
    pub template: Option<String>,
    pub company: Option<String>,
    pub manager: Option<String>,
    pub pages: Option<u32>,
    pub words: Option<u32>,
    pub characters: Option<u32>,
    pub characters_with_spaces: Option<u32>,
    pub lines: Option<u32>,
    pub paragraphs: Option<u32>,
    pub total_time: Option<u32>, // minutes
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineItem {
    pub level: u8,
    pub title: String,
    pub style: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleKind {
    Paragraph,
    Character,
    Table,
    Numbering,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleUsage {
    pub style_id: String,
    pub kind: StyleKind,
    pub count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub core: CoreProperties,
    pub app: AppProperties,
    pub outline: Vec<OutlineItem>,
    pub style_usage: Vec<StyleUsage>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub initials: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Element {
    Paragraph(Paragraph),
    Heading(Heading),
    Table(Table),
    PageBreak,
    Bookmark(Bookmark),
    Footnote(Note),
    Endnote(Note),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub elements: Vec<Element>,
    pub metadata: Metadata,
    pub headers: HeaderFooterSet,
    pub footers: HeaderFooterSet,
    pub sections: Vec<Section>,
    pub footnotes: BTreeMap<String, Note>,
    pub endnotes: BTreeMap<String, Note>,
    pub comments: Vec<Comment>,
    /// Locally recovered problems (rejected images and the like).
    pub warnings: Vec<String>,
}

impl Document {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.elements.iter().filter_map(|e| match e {
            Element::Paragraph(p) => Some(p),
            Element::Heading(h) => Some(&h.paragraph),
            _ => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.elements.iter().filter_map(|e| match e {
            Element::Table(t) => Some(t),
            _ => None,
        })
    }

    /// Every image placeholder in body, tables, notes and headers/footers, in document order.
    pub fn images(&self) -> Vec<&Image> {
        let mut out = Vec::new();
        for element in &self.elements {
            match element {
                Element::Paragraph(p) => out.extend(p.images.iter()),
                Element::Heading(h) => out.extend(h.paragraph.images.iter()),
                Element::Table(t) => collect_table_images(t, &mut out),
                Element::Footnote(n) | Element::Endnote(n) => collect_block_images(&n.content, &mut out),
                Element::PageBreak | Element::Bookmark(_) => {}
            }
        }
        for set in [&self.headers, &self.footers] {
            for hf in [&set.default, &set.first, &set.even].into_iter().flatten() {
                collect_block_images(&hf.content, &mut out);
            }
        }
        out
    }
}

fn collect_block_images<'a>(blocks: &'a [Block], out: &mut Vec<&'a Image>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.extend(p.images.iter()),
            Block::Table(t) => collect_table_images(t, out),
        }
    }
}

fn collect_table_images<'a>(table: &'a Table, out: &mut Vec<&'a Image>) {
    for row in &table.rows {
        for cell in &row.cells {
            collect_block_images(&cell.content, out);
        }
    }
}
