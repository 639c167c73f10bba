use std::collections::{HashMap, HashSet};

use crate::model::{
    Alignment, Border, CellBorders, CellMargins, FontFamilies, LineSpacing, ParagraphBorders,
    Shading, StyleKind, VertAlign,
};

use super::theme::{Theme, resolve_theme_color, resolve_theme_font, resolve_theme_font_attr};
use super::{
    WML_NS, highlight_color, is_wml, parse_border, parse_shading, twips_attr, wml, wml_attr,
    wml_bool,
};

/// Copy every field that is still `None` in `$dst` from `$src`.
macro_rules! inherit {
    ($dst:expr, $src:expr; $($field:ident),+ $(,)?) => {
        $(
            if $dst.$field.is_none() {
                $dst.$field = $src.$field.clone();
            }
        )+
    };
}

/// Run-level properties as declared by one layer (direct formatting, a
/// style, or document defaults). `None` means "not specified here".
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RunProps {
    pub(crate) style_id: Option<String>,
    pub(crate) bold: Option<bool>,
    pub(crate) italic: Option<bool>,
    pub(crate) underline: Option<bool>,
    pub(crate) underline_style: Option<String>,
    pub(crate) strikethrough: Option<bool>,
    pub(crate) double_strikethrough: Option<bool>,
    pub(crate) vertical_align: Option<VertAlign>,
    pub(crate) caps: Option<bool>,
    pub(crate) small_caps: Option<bool>,
    pub(crate) emboss: Option<bool>,
    pub(crate) imprint: Option<bool>,
    pub(crate) outline: Option<bool>,
    pub(crate) shadow: Option<bool>,
    pub(crate) hidden: Option<bool>,
    pub(crate) font_size: Option<f32>,
    pub(crate) font_size_cs: Option<f32>,
    pub(crate) character_spacing: Option<f32>,
    pub(crate) position: Option<f32>,
    pub(crate) kerning: Option<f32>,
    pub(crate) text_scale: Option<u32>,
    pub(crate) fonts: FontFamilies,
    pub(crate) color: Option<[u8; 3]>,
    pub(crate) background: Option<[u8; 3]>,
    pub(crate) emphasis: Option<String>,
    pub(crate) border: Option<Border>,
    pub(crate) lang: Option<String>,
}

impl RunProps {
    /// Fill unspecified properties from a less specific layer.
    pub(crate) fn inherit_from(&mut self, lower: &RunProps) {
        inherit!(self, lower; bold, italic, underline, underline_style, strikethrough,
            double_strikethrough, vertical_align, caps, small_caps, emboss, imprint,
            outline, shadow, hidden, font_size, font_size_cs, character_spacing,
            position, kerning, text_scale, color, background, emphasis, border, lang);
        inherit!(self.fonts, lower.fonts; ascii, east_asia, complex_script, high_ansi);
    }

    pub(crate) fn parse(rpr: roxmltree::Node, theme: &Theme) -> RunProps {
        let half_points = |name: &str| -> Option<f32> {
            wml_attr(rpr, name)
                .and_then(|v| v.parse::<f32>().ok())
                .map(|hp| hp / 2.0)
        };
        let twips_val = |name: &str| -> Option<f32> {
            wml_attr(rpr, name)
                .and_then(|v| v.parse::<f32>().ok())
                .map(|tw| tw / 20.0)
        };

        // b/bCs and i/iCs are OR-ed: either toggle turns the property on
        let either = |a: &str, b: &str| -> Option<bool> {
            match (wml_bool(rpr, a), wml_bool(rpr, b)) {
                (None, None) => None,
                (x, y) => Some(x.unwrap_or(false) || y.unwrap_or(false)),
            }
        };

        let u = wml(rpr, "u");
        let underline_val = u.and_then(|n| n.attribute((WML_NS, "val")));
        let underline = u.map(|_| underline_val != Some("none"));

        let color = wml(rpr, "color").and_then(|n| {
            if let Some(tc) = n.attribute((WML_NS, "themeColor"))
                && let Some(rgb) = resolve_theme_color(tc, theme)
            {
                return Some(rgb);
            }
            n.attribute((WML_NS, "val")).and_then(super::parse_hex_color)
        });

        let background = wml_attr(rpr, "highlight")
            .filter(|v| *v != "none")
            .and_then(|v| highlight_color(v).or_else(|| super::parse_hex_color(v)))
            .or_else(|| {
                wml(rpr, "shd")
                    .and_then(|n| n.attribute((WML_NS, "fill")))
                    .filter(|f| *f != "auto")
                    .and_then(super::parse_hex_color)
            });

        RunProps {
            style_id: wml_attr(rpr, "rStyle").map(str::to_string),
            bold: either("b", "bCs"),
            italic: either("i", "iCs"),
            underline,
            underline_style: underline_val
                .filter(|v| *v != "none")
                .or(u.map(|_| "single"))
                .filter(|_| underline == Some(true))
                .map(str::to_string),
            strikethrough: wml_bool(rpr, "strike"),
            double_strikethrough: wml_bool(rpr, "dstrike"),
            vertical_align: wml_attr(rpr, "vertAlign").map(|v| match v {
                "superscript" => VertAlign::Superscript,
                "subscript" => VertAlign::Subscript,
                _ => VertAlign::Baseline,
            }),
            caps: wml_bool(rpr, "caps"),
            small_caps: wml_bool(rpr, "smallCaps"),
            emboss: wml_bool(rpr, "emboss"),
            imprint: wml_bool(rpr, "imprint"),
            outline: wml_bool(rpr, "outline"),
            shadow: wml_bool(rpr, "shadow"),
            hidden: wml_bool(rpr, "vanish"),
            font_size: half_points("sz"),
            font_size_cs: half_points("szCs"),
            character_spacing: twips_val("spacing"),
            position: half_points("position"),
            kerning: half_points("kern"),
            text_scale: wml_attr(rpr, "w").and_then(|v| v.trim_end_matches('%').parse().ok()),
            fonts: wml(rpr, "rFonts")
                .map(|n| parse_fonts(n, theme))
                .unwrap_or_default(),
            color,
            background,
            emphasis: wml_attr(rpr, "em")
                .filter(|v| *v != "none")
                .map(str::to_string),
            border: wml(rpr, "bdr").and_then(|n| parse_border(n, theme)),
            lang: wml(rpr, "lang")
                .and_then(|n| n.attribute((WML_NS, "val")))
                .map(str::to_string),
        }
    }
}

fn parse_fonts(rfonts: roxmltree::Node, theme: &Theme) -> FontFamilies {
    let slot = |attr: &str, theme_attr: &str| -> Option<String> {
        if let Some(name) = rfonts.attribute((WML_NS, attr)) {
            return resolve_theme_font(name, theme);
        }
        rfonts
            .attribute((WML_NS, theme_attr))
            .and_then(|v| resolve_theme_font_attr(v, theme))
    };
    FontFamilies {
        ascii: slot("ascii", "asciiTheme"),
        east_asia: slot("eastAsia", "eastAsiaTheme"),
        complex_script: slot("cs", "cstheme"),
        high_ansi: slot("hAnsi", "hAnsiTheme"),
    }
}

/// Paragraph-level properties declared by one layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ParaProps {
    pub(crate) style_id: Option<String>,
    pub(crate) alignment: Option<Alignment>,
    pub(crate) indent_left: Option<f32>,
    pub(crate) indent_right: Option<f32>,
    pub(crate) indent_hanging: Option<f32>,
    pub(crate) indent_first_line: Option<f32>,
    pub(crate) space_before: Option<f32>,
    pub(crate) space_after: Option<f32>,
    pub(crate) line_spacing: Option<LineSpacing>,
    pub(crate) keep_next: Option<bool>,
    pub(crate) keep_lines: Option<bool>,
    pub(crate) page_break_before: Option<bool>,
    pub(crate) widow_control: Option<bool>,
    pub(crate) outline_level: Option<u8>,
    pub(crate) bidi: Option<bool>,
    pub(crate) text_direction: Option<String>,
    pub(crate) borders: Option<ParagraphBorders>,
    pub(crate) shading: Option<Shading>,
    pub(crate) num_id: Option<String>,
    pub(crate) num_level: Option<u8>,
}

impl ParaProps {
    pub(crate) fn inherit_from(&mut self, lower: &ParaProps) {
        inherit!(self, lower; alignment, indent_left, indent_right, indent_hanging,
            indent_first_line, space_before, space_after, line_spacing, keep_next,
            keep_lines, page_break_before, widow_control, outline_level, bidi,
            text_direction, borders, shading, num_id, num_level);
    }

    pub(crate) fn parse(ppr: roxmltree::Node, theme: &Theme) -> ParaProps {
        let ind = wml(ppr, "ind");
        let spacing = wml(ppr, "spacing");
        let num_pr = wml(ppr, "numPr");

        let line_spacing = spacing.and_then(|n| {
            let line = n
                .attribute((WML_NS, "line"))
                .and_then(|v| v.parse::<f32>().ok())?;
            Some(match n.attribute((WML_NS, "lineRule")) {
                Some("exact") => LineSpacing::Exact(line / 20.0),
                Some("atLeast") => LineSpacing::AtLeast(line / 20.0),
                _ => LineSpacing::Auto(line / 240.0),
            })
        });

        let borders = wml(ppr, "pBdr")
            .map(|pbdr| {
                let edge = |name: &str| wml(pbdr, name).and_then(|n| parse_border(n, theme));
                ParagraphBorders {
                    top: edge("top"),
                    bottom: edge("bottom"),
                    left: edge("left").or_else(|| edge("start")),
                    right: edge("right").or_else(|| edge("end")),
                    between: edge("between"),
                    bar: edge("bar"),
                }
            })
            .filter(|b| !b.is_empty());

        ParaProps {
            style_id: wml_attr(ppr, "pStyle").map(str::to_string),
            alignment: wml_attr(ppr, "jc").and_then(parse_alignment),
            indent_left: ind.and_then(|n| twips_attr(n, "left").or_else(|| twips_attr(n, "start"))),
            indent_right: ind.and_then(|n| twips_attr(n, "right").or_else(|| twips_attr(n, "end"))),
            indent_hanging: ind.and_then(|n| twips_attr(n, "hanging")),
            indent_first_line: ind.and_then(|n| twips_attr(n, "firstLine")),
            space_before: spacing.and_then(|n| twips_attr(n, "before")),
            space_after: spacing.and_then(|n| twips_attr(n, "after")),
            line_spacing,
            keep_next: wml_bool(ppr, "keepNext"),
            keep_lines: wml_bool(ppr, "keepLines"),
            page_break_before: wml_bool(ppr, "pageBreakBefore"),
            widow_control: wml_bool(ppr, "widowControl"),
            outline_level: wml_attr(ppr, "outlineLvl").and_then(|v| v.parse().ok()),
            bidi: wml_bool(ppr, "bidi"),
            text_direction: wml_attr(ppr, "textDirection").map(str::to_string),
            borders,
            shading: wml(ppr, "shd").and_then(|n| parse_shading(n, theme)),
            num_id: num_pr.and_then(|n| wml_attr(n, "numId")).map(str::to_string),
            num_level: num_pr
                .and_then(|n| wml_attr(n, "ilvl"))
                .and_then(|v| v.parse().ok()),
        }
    }
}

pub(crate) fn parse_alignment(val: &str) -> Option<Alignment> {
    Some(match val {
        "left" | "start" => Alignment::Left,
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "justify" => Alignment::Justify,
        "distribute" | "highKashida" | "lowKashida" | "mediumKashida" | "thaiDistribute" => {
            Alignment::Distribute
        }
        _ => return None,
    })
}

/// Table-level formatting carried by a table style.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TableStyleProps {
    pub(crate) borders: Option<CellBorders>,
    pub(crate) cell_margins: Option<CellMargins>,
}

pub(crate) fn parse_table_borders(node: roxmltree::Node, theme: &Theme) -> CellBorders {
    let edge = |name: &str| wml(node, name).and_then(|n| parse_border(n, theme));
    CellBorders {
        top: edge("top"),
        bottom: edge("bottom"),
        left: edge("left").or_else(|| edge("start")),
        right: edge("right").or_else(|| edge("end")),
        inside_h: edge("insideH"),
        inside_v: edge("insideV"),
        tl2br: edge("tl2br"),
        tr2bl: edge("tr2bl"),
    }
}

/// Cell margins from `tblCellMar`/`tcMar`, starting from `base`.
pub(crate) fn parse_cell_margins(node: roxmltree::Node, base: CellMargins) -> CellMargins {
    let side = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| wml(node, n))
            .and_then(|n| twips_attr(n, "w"))
    };
    CellMargins {
        top: side(&["top"]).unwrap_or(base.top),
        left: side(&["left", "start"]).unwrap_or(base.left),
        bottom: side(&["bottom"]).unwrap_or(base.bottom),
        right: side(&["right", "end"]).unwrap_or(base.right),
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Style {
    pub(crate) name: Option<String>,
    pub(crate) kind: StyleKind,
    pub(crate) based_on: Option<String>,
    pub(crate) is_default: bool,
    pub(crate) para: ParaProps,
    pub(crate) run: RunProps,
    pub(crate) table: TableStyleProps,
}

/// All named styles plus document defaults. After parsing, every style's
/// properties already include what it inherits through `basedOn`.
#[derive(Clone, Debug, Default)]
pub(crate) struct StyleSheet {
    pub(crate) styles: HashMap<String, Style>,
    pub(crate) default_run: RunProps,
    pub(crate) default_para: ParaProps,
    pub(crate) default_paragraph_style: Option<String>,
    theme_fonts: FontFamilies,
}

/// What one paragraph or run asks the cascade to resolve.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CascadeInput<'a> {
    pub(crate) paragraph_style: Option<&'a str>,
    pub(crate) table_style: Option<&'a str>,
    pub(crate) direct_para: Option<&'a ParaProps>,
    pub(crate) direct_run: Option<&'a RunProps>,
}

impl StyleSheet {
    pub(crate) fn get(&self, id: &str) -> Option<&Style> {
        self.styles.get(id)
    }

    fn get_kind(&self, id: &str, kind: StyleKind) -> Option<&Style> {
        self.styles.get(id).filter(|s| s.kind == kind)
    }

    /// The paragraph style a paragraph uses: its own `pStyle`, else the default.
    pub(crate) fn paragraph_style_id<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or(self.default_paragraph_style.as_deref())
    }

    /// Resolve paragraph properties: direct → paragraph style chain → table
    /// style → document defaults.
    pub(crate) fn resolve_paragraph(&self, input: CascadeInput) -> ParaProps {
        let mut props = input.direct_para.cloned().unwrap_or_default();
        if let Some(style) = input
            .paragraph_style
            .and_then(|id| self.get_kind(id, StyleKind::Paragraph))
        {
            props.inherit_from(&style.para);
        }
        if let Some(style) = input
            .table_style
            .and_then(|id| self.get_kind(id, StyleKind::Table))
        {
            props.inherit_from(&style.para);
        }
        props.inherit_from(&self.default_para);
        props
    }

    /// Resolve run properties: direct → character style chain → paragraph
    /// style chain → table style → document defaults → theme fonts.
    pub(crate) fn resolve_run(&self, input: CascadeInput) -> RunProps {
        let mut props = input.direct_run.cloned().unwrap_or_default();
        if let Some(style) = props
            .style_id
            .clone()
            .and_then(|id| self.get_kind(&id, StyleKind::Character))
        {
            props.inherit_from(&style.run);
        }
        if let Some(style) = input
            .paragraph_style
            .and_then(|id| self.get_kind(id, StyleKind::Paragraph))
        {
            props.inherit_from(&style.run);
        }
        if let Some(style) = input
            .table_style
            .and_then(|id| self.get_kind(id, StyleKind::Table))
        {
            props.inherit_from(&style.run);
        }
        props.inherit_from(&self.default_run);
        inherit!(props.fonts, self.theme_fonts; ascii, east_asia, complex_script, high_ansi);
        props
    }
}

/// Walk `basedOn` from `id` towards the root. Stops at a missing parent or at
/// the first style already visited, so the walk is bounded by the style count.
pub(crate) fn style_chain(styles: &HashMap<String, Style>, id: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(id);
    while let Some(cur) = current {
        let Some(style) = styles.get(cur) else {
            if cur != id {
                log::debug!("Style {id}: basedOn {cur} does not exist");
            }
            break;
        };
        if !visited.insert(cur) {
            log::warn!("Style {id}: cyclic basedOn chain broken at {cur}");
            break;
        }
        chain.push(cur.to_string());
        current = style.based_on.as_deref();
    }
    chain
}

fn resolve_based_on(styles: &mut HashMap<String, Style>) {
    let ids: Vec<String> = styles.keys().cloned().collect();
    let mut resolved: Vec<(String, ParaProps, RunProps, TableStyleProps)> = Vec::new();
    for id in ids {
        let chain = style_chain(styles, &id);
        let mut para = ParaProps::default();
        let mut run = RunProps::default();
        let mut table = TableStyleProps::default();
        // closest first: each ancestor only fills what is still unset
        for ancestor in &chain {
            let Some(s) = styles.get(ancestor) else {
                continue;
            };
            para.inherit_from(&s.para);
            run.inherit_from(&s.run);
            inherit!(table, s.table; borders, cell_margins);
        }
        resolved.push((id, para, run, table));
    }
    for (id, para, run, table) in resolved {
        if let Some(s) = styles.get_mut(&id) {
            s.para = para;
            s.run = run;
            s.table = table;
        }
    }
}

pub(crate) fn parse_styles_xml(xml: &roxmltree::Document, theme: &Theme) -> StyleSheet {
    let root = xml.root_element();
    let mut sheet = StyleSheet {
        theme_fonts: FontFamilies {
            ascii: theme.minor.latin.clone(),
            east_asia: theme.minor.east_asia.clone(),
            complex_script: theme.minor.complex_script.clone(),
            high_ansi: theme.minor.latin.clone(),
        },
        ..Default::default()
    };

    if let Some(doc_defaults) = wml(root, "docDefaults") {
        if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
            sheet.default_run = RunProps::parse(rpr, theme);
        }
        if let Some(ppr) = wml(doc_defaults, "pPrDefault").and_then(|n| wml(n, "pPr")) {
            sheet.default_para = ParaProps::parse(ppr, theme);
        }
    }

    for style_node in root.children().filter(|n| is_wml(*n, "style")) {
        let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
            continue;
        };
        let kind = match style_node.attribute((WML_NS, "type")) {
            Some("character") => StyleKind::Character,
            Some("table") => StyleKind::Table,
            Some("numbering") => StyleKind::Numbering,
            _ => StyleKind::Paragraph,
        };
        let is_default = style_node
            .attribute((WML_NS, "default"))
            .is_some_and(|v| v == "1" || v == "true");

        let ppr = wml(style_node, "pPr");
        let para = match (kind, ppr) {
            // numbering styles carry only numPr, which the numbering resolver reads
            (StyleKind::Paragraph | StyleKind::Table | StyleKind::Numbering, Some(ppr)) => {
                ParaProps::parse(ppr, theme)
            }
            _ => ParaProps::default(),
        };
        let run = wml(style_node, "rPr")
            .map(|rpr| RunProps::parse(rpr, theme))
            .unwrap_or_default();
        let tbl_pr = wml(style_node, "tblPr");
        let table = TableStyleProps {
            borders: tbl_pr
                .and_then(|pr| wml(pr, "tblBorders"))
                .map(|n| parse_table_borders(n, theme)),
            cell_margins: tbl_pr
                .and_then(|pr| wml(pr, "tblCellMar"))
                .map(|n| parse_cell_margins(n, CellMargins::default())),
        };

        if is_default && kind == StyleKind::Paragraph {
            sheet.default_paragraph_style = Some(style_id.to_string());
        }

        sheet.styles.insert(
            style_id.to_string(),
            Style {
                name: wml_attr(style_node, "name").map(str::to_string),
                kind,
                based_on: wml_attr(style_node, "basedOn").map(str::to_string),
                is_default,
                para,
                run,
                table,
            },
        );
    }

    resolve_based_on(&mut sheet.styles);
    log::debug!(
        "Styles: {} defined, default paragraph style {:?}",
        sheet.styles.len(),
        sheet.default_paragraph_style
    );
    sheet
}

/// A stylesheet with no styles.xml: only theme fonts apply.
pub(crate) fn empty_stylesheet(theme: &Theme) -> StyleSheet {
    StyleSheet {
        theme_fonts: FontFamilies {
            ascii: theme.minor.latin.clone(),
            east_asia: theme.minor.east_asia.clone(),
            complex_script: theme.minor.complex_script.clone(),
            high_ansi: theme.minor.latin.clone(),
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(body: &str) -> StyleSheet {
        let xml = format!(
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{body}</w:styles>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        parse_styles_xml(&doc, &Theme::default())
    }

    fn run_for(sheet: &StyleSheet, para_style: &str) -> RunProps {
        sheet.resolve_run(CascadeInput {
            paragraph_style: Some(para_style),
            ..Default::default()
        })
    }

    #[test]
    fn based_on_chain_inherits_per_property() {
        let s = sheet(
            r#"<w:style w:type="paragraph" w:styleId="Base"><w:rPr><w:b/><w:sz w:val="24"/></w:rPr></w:style>
               <w:style w:type="paragraph" w:styleId="Mid"><w:basedOn w:val="Base"/><w:rPr><w:color w:val="FF0000"/></w:rPr></w:style>
               <w:style w:type="paragraph" w:styleId="Leaf"><w:basedOn w:val="Mid"/><w:rPr><w:sz w:val="40"/></w:rPr></w:style>"#,
        );
        let r = run_for(&s, "Leaf");
        assert_eq!(r.bold, Some(true));
        assert_eq!(r.font_size, Some(20.0));
        assert_eq!(r.color, Some([255, 0, 0]));
    }

    #[test]
    fn cyclic_chain_terminates_like_a_broken_link() {
        let cyclic = sheet(
            r#"<w:style w:type="paragraph" w:styleId="A"><w:basedOn w:val="B"/><w:rPr><w:i/></w:rPr></w:style>
               <w:style w:type="paragraph" w:styleId="B"><w:basedOn w:val="A"/><w:rPr><w:b/></w:rPr></w:style>"#,
        );
        let acyclic = sheet(
            r#"<w:style w:type="paragraph" w:styleId="A"><w:basedOn w:val="B"/><w:rPr><w:i/></w:rPr></w:style>
               <w:style w:type="paragraph" w:styleId="B"><w:rPr><w:b/></w:rPr></w:style>"#,
        );
        assert_eq!(run_for(&cyclic, "A"), run_for(&acyclic, "A"));
        assert_eq!(style_chain(&cyclic.styles, "A"), vec!["A", "B"]);
    }

    #[test]
    fn self_reference_and_missing_parent() {
        let s = sheet(
            r#"<w:style w:type="paragraph" w:styleId="Self"><w:basedOn w:val="Self"/><w:rPr><w:b/></w:rPr></w:style>
               <w:style w:type="paragraph" w:styleId="Orphan"><w:basedOn w:val="Nope"/><w:rPr><w:i/></w:rPr></w:style>"#,
        );
        assert_eq!(run_for(&s, "Self").bold, Some(true));
        assert_eq!(run_for(&s, "Orphan").italic, Some(true));
        assert_eq!(style_chain(&s.styles, "Orphan"), vec!["Orphan"]);
    }

    #[test]
    fn direct_beats_character_beats_paragraph_beats_defaults() {
        let s = sheet(
            r#"<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="22"/><w:rFonts w:ascii="Calibri"/></w:rPr></w:rPrDefault></w:docDefaults>
               <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:rPr><w:color w:val="111111"/></w:rPr></w:style>
               <w:style w:type="paragraph" w:styleId="P"><w:rPr><w:color w:val="222222"/><w:i/></w:rPr></w:style>
               <w:style w:type="character" w:styleId="C"><w:rPr><w:color w:val="333333"/></w:rPr></w:style>"#,
        );
        assert_eq!(s.default_paragraph_style.as_deref(), Some("Normal"));

        let direct = RunProps {
            style_id: Some("C".into()),
            font_size: Some(9.0),
            ..Default::default()
        };
        let r = s.resolve_run(CascadeInput {
            paragraph_style: Some("P"),
            direct_run: Some(&direct),
            ..Default::default()
        });
        assert_eq!(r.font_size, Some(9.0));
        assert_eq!(r.color, Some([0x33, 0x33, 0x33]));
        assert_eq!(r.italic, Some(true));
        assert_eq!(r.fonts.ascii.as_deref(), Some("Calibri"));

        let plain = s.resolve_run(CascadeInput {
            paragraph_style: s.paragraph_style_id(None),
            ..Default::default()
        });
        assert_eq!(plain.color, Some([0x11, 0x11, 0x11]));
        assert_eq!(plain.font_size, Some(11.0));
    }

    #[test]
    fn character_style_is_not_applied_as_paragraph_style() {
        let s = sheet(r#"<w:style w:type="character" w:styleId="Strong"><w:rPr><w:b/></w:rPr></w:style>"#);
        assert_eq!(run_for(&s, "Strong").bold, None);
    }

    #[test]
    fn paragraph_properties_cascade() {
        let s = sheet(
            r#"<w:docDefaults><w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>
               <w:style w:type="paragraph" w:styleId="Heading1"><w:pPr><w:keepNext/><w:outlineLvl w:val="0"/><w:jc w:val="center"/></w:pPr></w:style>"#,
        );
        let direct = ParaProps {
            alignment: Some(Alignment::Right),
            ..Default::default()
        };
        let p = s.resolve_paragraph(CascadeInput {
            paragraph_style: Some("Heading1"),
            direct_para: Some(&direct),
            ..Default::default()
        });
        assert_eq!(p.alignment, Some(Alignment::Right));
        assert_eq!(p.keep_next, Some(true));
        assert_eq!(p.outline_level, Some(0));
        assert_eq!(p.space_after, Some(8.0));
        assert!(matches!(p.line_spacing, Some(LineSpacing::Auto(v)) if (v - 259.0 / 240.0).abs() < 1e-6));
    }

    #[test]
    fn table_style_sits_between_paragraph_style_and_defaults() {
        let s = sheet(
            r#"<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="22"/></w:rPr></w:rPrDefault></w:docDefaults>
               <w:style w:type="table" w:styleId="Grid"><w:rPr><w:sz w:val="18"/><w:b/></w:rPr>
                 <w:tblPr><w:tblBorders><w:top w:val="single" w:sz="8" w:color="000000"/></w:tblBorders></w:tblPr></w:style>
               <w:style w:type="paragraph" w:styleId="P"><w:rPr><w:b w:val="0"/></w:rPr></w:style>"#,
        );
        let r = s.resolve_run(CascadeInput {
            paragraph_style: Some("P"),
            table_style: Some("Grid"),
            ..Default::default()
        });
        assert_eq!(r.font_size, Some(9.0));
        assert_eq!(r.bold, Some(false));
        let borders = s.get("Grid").and_then(|st| st.table.borders.clone()).unwrap();
        assert_eq!(borders.top.map(|b| b.width), Some(1.0));
    }

    fn rpr(inner: &str) -> RunProps {
        let xml = format!(
            r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{inner}</w:rPr>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        RunProps::parse(doc.root_element(), &Theme::default())
    }

    #[test]
    fn bold_and_italic_or_their_toggles() {
        assert_eq!(rpr("<w:b/>").bold, Some(true));
        assert_eq!(rpr("<w:bCs/>").bold, Some(true));
        assert_eq!(rpr(r#"<w:b w:val="0"/><w:bCs/>"#).bold, Some(true));
        assert_eq!(rpr(r#"<w:b w:val="false"/>"#).bold, Some(false));
        assert_eq!(rpr("").bold, None);
        assert_eq!(rpr(r#"<w:i w:val="0"/><w:iCs w:val="1"/>"#).italic, Some(true));
    }

    #[test]
    fn underline_only_suppressed_by_none() {
        assert_eq!(rpr(r#"<w:u w:val="none"/>"#).underline, Some(false));
        assert_eq!(rpr(r#"<w:u w:val="none"/>"#).underline_style, None);
        assert_eq!(rpr("<w:u/>").underline, Some(true));
        assert_eq!(rpr("<w:u/>").underline_style.as_deref(), Some("single"));
        let dbl = rpr(r#"<w:u w:val="double"/>"#);
        assert_eq!(dbl.underline, Some(true));
        assert_eq!(dbl.underline_style.as_deref(), Some("double"));
        assert_eq!(rpr("").underline, None);
    }

    #[test]
    fn numeric_run_properties() {
        let r = rpr(
            r#"<w:sz w:val="28"/><w:szCs w:val="30"/><w:spacing w:val="40"/><w:position w:val="6"/><w:kern w:val="32"/><w:w w:val="150"/>"#,
        );
        assert_eq!(r.font_size, Some(14.0));
        assert_eq!(r.font_size_cs, Some(15.0));
        assert_eq!(r.character_spacing, Some(2.0));
        assert_eq!(r.position, Some(3.0));
        assert_eq!(r.kerning, Some(16.0));
        assert_eq!(r.text_scale, Some(150));
    }

    #[test]
    fn highlight_wins_over_shading() {
        let r = rpr(r#"<w:highlight w:val="yellow"/><w:shd w:fill="00FF00"/>"#);
        assert_eq!(r.background, Some([255, 255, 0]));
        let r = rpr(r#"<w:shd w:val="clear" w:fill="00FF00"/>"#);
        assert_eq!(r.background, Some([0, 255, 0]));
        let r = rpr(r#"<w:shd w:fill="auto"/>"#);
        assert_eq!(r.background, None);
    }
}
