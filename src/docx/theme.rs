use std::collections::HashMap;

use super::package::{Package, parse_optional};
use super::{DML_NS, parse_hex_color};

fn dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn typeface<'a>(node: roxmltree::Node<'a, 'a>, script: &str) -> Option<String> {
    dml(node, script)
        .and_then(|n| n.attribute("typeface"))
        .filter(|tf| !tf.is_empty())
        .map(str::to_string)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ThemeFontSet {
    pub(crate) latin: Option<String>,
    pub(crate) east_asia: Option<String>,
    pub(crate) complex_script: Option<String>,
}

impl ThemeFontSet {
    fn parse(node: roxmltree::Node) -> ThemeFontSet {
        ThemeFontSet {
            latin: typeface(node, "latin"),
            east_asia: typeface(node, "ea"),
            complex_script: typeface(node, "cs"),
        }
    }

    fn slot(&self, script: &str) -> Option<&str> {
        match script {
            "lt" | "latin" => self.latin.as_deref(),
            "ea" => self.east_asia.as_deref(),
            "cs" => self.complex_script.as_deref(),
            _ => None,
        }
    }
}

/// Font and colour scheme of one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Theme {
    pub(crate) colors: HashMap<String, [u8; 3]>,
    pub(crate) major: ThemeFontSet,
    pub(crate) minor: ThemeFontSet,
}

const COLOR_SLOTS: &[&str] = &[
    "dk1", "lt1", "dk2", "lt2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

fn scheme_color(node: roxmltree::Node) -> Option<[u8; 3]> {
    if let Some(srgb) = dml(node, "srgbClr") {
        return srgb.attribute("val").and_then(parse_hex_color);
    }
    dml(node, "sysClr")
        .and_then(|n| n.attribute("lastClr"))
        .and_then(parse_hex_color)
}

pub(crate) fn parse_theme_xml(xml: &roxmltree::Document) -> Theme {
    let mut theme = Theme::default();
    for node in xml.descendants() {
        if node.tag_name().namespace() != Some(DML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "clrScheme" => {
                for slot in node.children().filter(|n| n.is_element()) {
                    let name = slot.tag_name().name();
                    if !COLOR_SLOTS.contains(&name) {
                        continue;
                    }
                    if let Some(rgb) = scheme_color(slot) {
                        theme.colors.insert(name.to_string(), rgb);
                    }
                }
            }
            "majorFont" => theme.major = ThemeFontSet::parse(node),
            "minorFont" => theme.minor = ThemeFontSet::parse(node),
            _ => {}
        }
    }
    theme
}

/// Read the first `word/theme/*.xml` part. A missing theme is an empty theme.
pub(crate) fn parse_theme(package: &Package) -> Theme {
    let Some(name) = package.find_part("word/theme/", ".xml") else {
        return Theme::default();
    };
    let Some(xml) = parse_optional(package, name) else {
        return Theme::default();
    };
    let theme = parse_theme_xml(&xml);
    log::debug!(
        "Theme {name}: {} colors, major={:?}, minor={:?}",
        theme.colors.len(),
        theme.major.latin,
        theme.minor.latin
    );
    theme
}

/// Resolve a font token. `+mj-lt`, `+mn-ea` and friends name a theme slot;
/// any other non-empty value is already a font name.
pub(crate) fn resolve_theme_font(token: &str, theme: &Theme) -> Option<String> {
    let Some(slot) = token.strip_prefix('+') else {
        return (!token.is_empty()).then(|| token.to_string());
    };
    let (set, script) = slot.split_once('-')?;
    let fonts = match set {
        "mj" => &theme.major,
        "mn" => &theme.minor,
        _ => return None,
    };
    fonts.slot(script).map(str::to_string)
}

/// Resolve an `rFonts@asciiTheme`-style attribute value ("majorHAnsi", "minorEastAsia", ...).
pub(crate) fn resolve_theme_font_attr(value: &str, theme: &Theme) -> Option<String> {
    let (fonts, script) = if let Some(rest) = value.strip_prefix("major") {
        (&theme.major, rest)
    } else if let Some(rest) = value.strip_prefix("minor") {
        (&theme.minor, rest)
    } else {
        return None;
    };
    let slot = match script {
        "Ascii" | "HAnsi" => "latin",
        "EastAsia" => "ea",
        "Bidi" => "cs",
        _ => return None,
    };
    fonts.slot(slot).map(str::to_string)
}

fn color_alias(token: &str) -> &str {
    match token {
        "text1" | "tx1" => "dk1",
        "text2" | "tx2" => "dk2",
        "background1" | "bg1" => "lt1",
        "background2" | "bg2" => "lt2",
        "hyperlink" => "hlink",
        "followedHyperlink" => "folHlink",
        other => other,
    }
}

/// Resolve a colour token: a scheme slot name (or alias) is looked up in the
/// theme; a literal `RRGGBB` passes through.
pub(crate) fn resolve_theme_color(token: &str, theme: &Theme) -> Option<[u8; 3]> {
    if let Some(rgb) = theme.colors.get(color_alias(token)) {
        return Some(*rgb);
    }
    parse_hex_color(token)
}
