use crate::model::{HeaderFooter, HeaderFooterSet, Section, SectionBreakType};

use super::body::parse_blocks;
use super::package::{Package, parse_optional};
use super::rels::Relationships;
use super::{ParseState, PartContext, REL_NS, WML_NS, is_wml, twips_attr, wml, wml_attr, wml_bool};

/// Relationship ids of one header or footer family, per page variant.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct VariantIds {
    pub(crate) default: Option<String>,
    pub(crate) first: Option<String>,
    pub(crate) even: Option<String>,
}

impl VariantIds {
    fn set(&mut self, kind: Option<&str>, id: &str) {
        let slot = match kind {
            Some("first") => &mut self.first,
            Some("even") => &mut self.even,
            _ => &mut self.default,
        };
        *slot = Some(id.to_string());
    }
}

/// Header/footer references gathered from every `w:sectPr` in document order.
/// A later section replaces an earlier one's reference of the same variant.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct HeaderFooterRefs {
    pub(crate) headers: VariantIds,
    pub(crate) footers: VariantIds,
}

impl HeaderFooterRefs {
    pub(crate) fn record(&mut self, sect_pr: roxmltree::Node) {
        for child in sect_pr.children() {
            let target = if is_wml(child, "headerReference") {
                &mut self.headers
            } else if is_wml(child, "footerReference") {
                &mut self.footers
            } else {
                continue;
            };
            if let Some(id) = child.attribute((REL_NS, "id")) {
                target.set(child.attribute((WML_NS, "type")), id);
            }
        }
    }
}

fn parse_break_type(val: &str) -> SectionBreakType {
    match val {
        "continuous" => SectionBreakType::Continuous,
        "oddPage" => SectionBreakType::OddPage,
        "evenPage" => SectionBreakType::EvenPage,
        "nextColumn" => SectionBreakType::NextColumn,
        _ => SectionBreakType::NextPage,
    }
}

pub(crate) fn parse_section(sect_pr: roxmltree::Node) -> Section {
    let pg_sz = wml(sect_pr, "pgSz");
    let pg_mar = wml(sect_pr, "pgMar");
    let page_width = pg_sz.and_then(|n| twips_attr(n, "w"));
    let page_height = pg_sz.and_then(|n| twips_attr(n, "h"));
    let landscape = pg_sz.and_then(|n| n.attribute((WML_NS, "orient"))) == Some("landscape")
        || matches!((page_width, page_height), (Some(w), Some(h)) if w > h);
    let margin = |side: &str| pg_mar.and_then(|n| twips_attr(n, side));

    Section {
        page_width,
        page_height,
        landscape,
        margin_top: margin("top"),
        margin_bottom: margin("bottom"),
        margin_left: margin("left"),
        margin_right: margin("right"),
        columns: wml(sect_pr, "cols")
            .and_then(|n| n.attribute((WML_NS, "num")))
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1)
            .max(1),
        break_type: wml_attr(sect_pr, "type")
            .map(parse_break_type)
            .unwrap_or_default(),
        title_page: wml_bool(sect_pr, "titlePg").unwrap_or(false),
    }
}

/// Parse one header or footer part; its relationship ids resolve against
/// its own rels part. `None` when the id or the part cannot be resolved.
fn parse_part(
    package: &Package,
    ctx: &PartContext,
    state: &mut ParseState,
    rel_id: &str,
) -> Option<HeaderFooter> {
    let Some(path) = ctx.rels.part_path(rel_id) else {
        log::warn!("Header/footer relationship {rel_id} does not resolve to a part");
        return None;
    };
    let xml = parse_optional(package, &path)?;
    let rels = Relationships::load(package, &path);
    let part_ctx = ctx.with_rels(&rels);
    let content = parse_blocks(xml.root_element(), &part_ctx, state, None);
    log::debug!("{path}: {} blocks", content.len());
    Some(HeaderFooter { content })
}

fn parse_set(
    package: &Package,
    ctx: &PartContext,
    state: &mut ParseState,
    ids: &VariantIds,
    keep_empty: bool,
) -> HeaderFooterSet {
    let mut load = |id: &Option<String>| {
        id.as_deref()
            .and_then(|id| parse_part(package, ctx, state, id))
            .filter(|hf| keep_empty || !hf.content.is_empty())
    };
    HeaderFooterSet {
        default: load(&ids.default),
        first: load(&ids.first),
        even: load(&ids.even),
    }
}

/// Headers and footers per page variant. An empty header is kept, an empty
/// footer is dropped.
pub(crate) fn parse_headers_footers(
    package: &Package,
    ctx: &PartContext,
    state: &mut ParseState,
    refs: &HeaderFooterRefs,
) -> (HeaderFooterSet, HeaderFooterSet) {
    let headers = parse_set(package, ctx, state, &refs.headers, true);
    let footers = parse_set(package, ctx, state, &refs.footers, false);
    (headers, footers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    #[test]
    fn later_sections_override_per_variant() {
        let xml = format!(
            r#"<w:body {NS}>
                <w:sectPr><w:headerReference w:type="default" r:id="rId1"/><w:headerReference w:type="first" r:id="rId2"/><w:footerReference r:id="rId3"/></w:sectPr>
                <w:sectPr><w:headerReference w:type="default" r:id="rId4"/><w:footerReference w:type="even" r:id="rId5"/></w:sectPr>
            </w:body>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let mut refs = HeaderFooterRefs::default();
        for sect in doc.root_element().children().filter(|n| n.is_element()) {
            refs.record(sect);
        }
        assert_eq!(refs.headers.default.as_deref(), Some("rId4"));
        assert_eq!(refs.headers.first.as_deref(), Some("rId2"));
        assert_eq!(refs.headers.even, None);
        assert_eq!(refs.footers.default.as_deref(), Some("rId3"));
        assert_eq!(refs.footers.even.as_deref(), Some("rId5"));
    }

    #[test]
    fn section_geometry() {
        let xml = format!(
            r#"<w:sectPr {NS}><w:type w:val="continuous"/><w:pgSz w:w="16838" w:h="11906" w:orient="landscape"/>
               <w:pgMar w:top="1440" w:right="720" w:bottom="1440" w:left="720"/><w:cols w:num="2"/><w:titlePg/></w:sectPr>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let s = parse_section(doc.root_element());
        assert_eq!(s.page_width, Some(841.9));
        assert!(s.landscape);
        assert_eq!(s.margin_top, Some(72.0));
        assert_eq!(s.margin_left, Some(36.0));
        assert_eq!(s.columns, 2);
        assert_eq!(s.break_type, SectionBreakType::Continuous);
        assert!(s.title_page);

        let bare = format!(r#"<w:sectPr {NS}/>"#);
        let doc = roxmltree::Document::parse(&bare).unwrap();
        let s = parse_section(doc.root_element());
        assert_eq!(s.columns, 1);
        assert_eq!(s.break_type, SectionBreakType::NextPage);
        assert!(!s.landscape && !s.title_page);
    }
}
