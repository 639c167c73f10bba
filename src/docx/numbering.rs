use std::collections::HashMap;

use crate::model::{ListInfo, ListKind};

use super::theme::{Theme, resolve_theme_font, resolve_theme_font_attr};
use super::{WML_NS, is_wml, twips_attr, wml, wml_attr};

const FALLBACK_BULLET: &str = "\u{2022}";

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct LevelDef {
    pub(crate) num_fmt: String,
    pub(crate) lvl_text: String,
    pub(crate) start: u32,
    pub(crate) justification: Option<String>,
    pub(crate) indent_left: Option<f32>,
    pub(crate) indent_hanging: Option<f32>,
    pub(crate) marker_font: Option<String>,
}

impl LevelDef {
    fn parse(lvl: roxmltree::Node, theme: &Theme) -> LevelDef {
        let ind = wml(lvl, "pPr").and_then(|ppr| wml(ppr, "ind"));
        let marker_font = wml(lvl, "rPr").and_then(|rpr| wml(rpr, "rFonts")).and_then(|f| {
            f.attribute((WML_NS, "ascii"))
                .and_then(|v| resolve_theme_font(v, theme))
                .or_else(|| {
                    f.attribute((WML_NS, "asciiTheme"))
                        .and_then(|v| resolve_theme_font_attr(v, theme))
                })
        });
        LevelDef {
            num_fmt: wml_attr(lvl, "numFmt").unwrap_or("decimal").to_string(),
            lvl_text: wml_attr(lvl, "lvlText").unwrap_or("").to_string(),
            start: wml_attr(lvl, "start")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1),
            justification: wml_attr(lvl, "lvlJc").map(str::to_string),
            indent_left: ind.and_then(|n| twips_attr(n, "left").or_else(|| twips_attr(n, "start"))),
            indent_hanging: ind.and_then(|n| twips_attr(n, "hanging")),
            marker_font,
        }
    }
}

fn parse_levels(parent: roxmltree::Node, theme: &Theme) -> HashMap<u8, LevelDef> {
    parent
        .children()
        .filter(|n| is_wml(*n, "lvl"))
        .filter_map(|lvl| {
            let ilvl = lvl
                .attribute((WML_NS, "ilvl"))
                .and_then(|v| v.parse::<u8>().ok())?;
            Some((ilvl, LevelDef::parse(lvl, theme)))
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
struct AbstractFormat {
    levels: HashMap<u8, LevelDef>,
    style_link: Option<String>,
    num_style_link: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct LevelOverride {
    start: Option<u32>,
    level: Option<LevelDef>,
}

#[derive(Clone, Debug, Default)]
struct Instance {
    abstract_id: String,
    overrides: HashMap<u8, LevelOverride>,
}

/// Abstract list formats and the instances content refers to.
#[derive(Clone, Debug, Default)]
pub(crate) struct Numbering {
    abstracts: HashMap<String, AbstractFormat>,
    instances: HashMap<String, Instance>,
}

impl Numbering {
    pub(crate) fn parse(xml: &roxmltree::Document, theme: &Theme) -> Numbering {
        let mut numbering = Numbering::default();
        for node in xml.root_element().children() {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "abstractNum" => {
                    let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                        continue;
                    };
                    numbering.abstracts.insert(
                        abs_id.to_string(),
                        AbstractFormat {
                            levels: parse_levels(node, theme),
                            style_link: wml_attr(node, "styleLink").map(str::to_string),
                            num_style_link: wml_attr(node, "numStyleLink").map(str::to_string),
                        },
                    );
                }
                "num" => {
                    let Some(num_id) = node.attribute((WML_NS, "numId")) else {
                        continue;
                    };
                    let Some(abs_id) = wml_attr(node, "abstractNumId") else {
                        continue;
                    };
                    let mut overrides = HashMap::new();
                    for ov in node.children().filter(|n| is_wml(*n, "lvlOverride")) {
                        let Some(ilvl) = ov
                            .attribute((WML_NS, "ilvl"))
                            .and_then(|v| v.parse::<u8>().ok())
                        else {
                            continue;
                        };
                        overrides.insert(
                            ilvl,
                            LevelOverride {
                                start: wml_attr(ov, "startOverride").and_then(|v| v.parse().ok()),
                                level: wml(ov, "lvl").map(|lvl| LevelDef::parse(lvl, theme)),
                            },
                        );
                    }
                    numbering.instances.insert(
                        num_id.to_string(),
                        Instance {
                            abstract_id: abs_id.to_string(),
                            overrides,
                        },
                    );
                }
                _ => {}
            }
        }
        log::debug!(
            "Numbering: {} abstract formats, {} instances",
            numbering.abstracts.len(),
            numbering.instances.len()
        );
        numbering
    }

    /// Level definitions for an instance, following one `numStyleLink` hop
    /// to the abstract format that carries the matching `styleLink`.
    fn levels(&self, num_id: &str) -> Option<&HashMap<u8, LevelDef>> {
        let instance = self.instances.get(num_id)?;
        let abs = self.abstracts.get(&instance.abstract_id)?;
        if !abs.levels.is_empty() {
            return Some(&abs.levels);
        }
        let link = abs.num_style_link.as_deref()?;
        self.abstracts
            .values()
            .find(|a| a.style_link.as_deref() == Some(link) && !a.levels.is_empty())
            .map(|a| &a.levels)
    }

    /// `numId → abstractId → level`. `None` when any link is missing.
    pub(crate) fn resolve(&self, num_id: &str, level: u8) -> Option<&LevelDef> {
        let instance = self.instances.get(num_id)?;
        if let Some(def) = instance.overrides.get(&level).and_then(|o| o.level.as_ref()) {
            return Some(def);
        }
        self.levels(num_id)?.get(&level)
    }

    fn start_for(&self, num_id: &str, level: u8) -> Option<u32> {
        let instance = self.instances.get(num_id)?;
        if let Some(start) = instance.overrides.get(&level).and_then(|o| o.start) {
            return Some(start);
        }
        self.resolve(num_id, level).map(|d| d.start)
    }

    fn format_for(&self, num_id: &str, level: u8) -> &str {
        self.resolve(num_id, level)
            .map(|d| d.num_fmt.as_str())
            .unwrap_or("decimal")
    }
}

/// Per-document list counters keyed by `(numId, level)`. Each counter only
/// moves forward; a paragraph at another level never resets it.
#[derive(Clone, Debug, Default)]
pub(crate) struct NumberingState {
    counters: HashMap<(String, u8), u32>,
}

impl NumberingState {
    /// Consume one paragraph at `(num_id, level)` and describe its marker.
    /// `numId` "0" means the paragraph explicitly opts out of numbering.
    pub(crate) fn next(&mut self, numbering: &Numbering, num_id: &str, level: u8) -> Option<ListInfo> {
        if num_id == "0" {
            return None;
        }

        let start = numbering.start_for(num_id, level).unwrap_or(1);
        let counter = *self
            .counters
            .entry((num_id.to_string(), level))
            .and_modify(|c| *c = c.saturating_add(1))
            .or_insert(start);

        let Some(def) = numbering.resolve(num_id, level) else {
            log::debug!("Numbering {num_id}/{level}: no level definition, using bullet");
            return Some(ListInfo {
                num_id: num_id.to_string(),
                level,
                kind: ListKind::Bullet,
                format: "bullet".into(),
                marker: FALLBACK_BULLET.into(),
                marker_font: None,
                counter,
            });
        };

        let (kind, marker) = match def.num_fmt.as_str() {
            "bullet" => {
                let text = normalize_bullet_text(&def.lvl_text);
                let text = if text.is_empty() { FALLBACK_BULLET.to_string() } else { text };
                (ListKind::Bullet, text)
            }
            "none" => (ListKind::Ordered, String::new()),
            _ => (ListKind::Ordered, self.substitute(numbering, num_id, level, counter, &def.lvl_text)),
        };

        Some(ListInfo {
            num_id: num_id.to_string(),
            level,
            kind,
            format: def.num_fmt.clone(),
            marker,
            marker_font: def.marker_font.clone(),
            counter,
        })
    }

    /// Replace `%1`..`%9` with each level's current counter in that level's format.
    fn substitute(&self, numbering: &Numbering, num_id: &str, level: u8, current: u32, pattern: &str) -> String {
        let mut label = pattern.to_string();
        for lvl_idx in 0..9u8 {
            let placeholder = format!("%{}", lvl_idx + 1);
            if !label.contains(&placeholder) {
                continue;
            }
            let value = if lvl_idx == level {
                current
            } else {
                self.counters
                    .get(&(num_id.to_string(), lvl_idx))
                    .copied()
                    .or_else(|| numbering.start_for(num_id, lvl_idx))
                    .unwrap_or(1)
            };
            label = label.replace(&placeholder, &format_number(value, numbering.format_for(num_id, lvl_idx)));
        }
        label
    }
}

fn to_roman(mut n: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut result = String::new();
    for &(value, numeral) in TABLE {
        while n >= value {
            result.push_str(numeral);
            n -= value;
        }
    }
    result
}

fn to_letters(value: u32, base: u8) -> String {
    if value == 0 {
        return String::new();
    }
    let mut n = value - 1;
    let mut result = String::new();
    loop {
        result.insert(0, (base + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

fn ordinal_suffix(value: u32) -> &'static str {
    match (value % 10, value % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

pub(crate) fn format_number(value: u32, num_fmt: &str) -> String {
    match num_fmt {
        "decimal" => value.to_string(),
        "decimalZero" => format!("{value:02}"),
        "lowerLetter" => to_letters(value, b'a'),
        "upperLetter" => to_letters(value, b'A'),
        // roman numerals stop at 3999; larger values are written in decimal
        "lowerRoman" | "upperRoman" if value > 3999 => value.to_string(),
        "lowerRoman" => to_roman(value),
        "upperRoman" => to_roman(value).to_uppercase(),
        "ordinal" => format!("{value}{}", ordinal_suffix(value)),
        "bullet" => FALLBACK_BULLET.to_string(),
        "none" => String::new(),
        _ => value.to_string(),
    }
}

/// Map Symbol/Wingdings private-use code points to their Unicode look-alikes.
pub(crate) fn normalize_bullet_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if (0xF000..=0xF0FF).contains(&cp) {
                symbol_pua_to_unicode(cp).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

pub(crate) fn symbol_pua_to_unicode(cp: u32) -> Option<char> {
    let sym = cp.checked_sub(0xF000)?;
    let mapped = match sym {
        0xB7 => '\u{2022}',
        0xA7 => '\u{25A0}',
        0xA8 => '\u{25CB}',
        0xD8 => '\u{2666}',
        0x76 => '\u{221A}',
        0xFC => '\u{2713}',
        _ => return char::from_u32(sym),
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBERING: &str = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
      <w:abstractNum w:abstractNumId="1">
        <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/>
          <w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl>
        <w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="lowerLetter"/><w:lvlText w:val="%1.%2)"/></w:lvl>
      </w:abstractNum>
      <w:abstractNum w:abstractNumId="2">
        <w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/><w:lvlText w:val="&#xF0B7;"/>
          <w:rPr><w:rFonts w:ascii="Symbol" w:hAnsi="Symbol"/></w:rPr></w:lvl>
      </w:abstractNum>
      <w:abstractNum w:abstractNumId="3"><w:styleLink w:val="OutlineList"/>
        <w:lvl w:ilvl="0"><w:numFmt w:val="upperRoman"/><w:lvlText w:val="%1"/></w:lvl>
      </w:abstractNum>
      <w:abstractNum w:abstractNumId="4"><w:numStyleLink w:val="OutlineList"/></w:abstractNum>
      <w:num w:numId="5"><w:abstractNumId w:val="1"/></w:num>
      <w:num w:numId="6"><w:abstractNumId w:val="2"/></w:num>
      <w:num w:numId="7"><w:abstractNumId w:val="1"/>
        <w:lvlOverride w:ilvl="0"><w:startOverride w:val="4"/></w:lvlOverride></w:num>
      <w:num w:numId="8"><w:abstractNumId w:val="4"/></w:num>
      <w:num w:numId="9"><w:abstractNumId w:val="99"/></w:num>
    </w:numbering>"#;

    fn numbering() -> Numbering {
        Numbering::parse(&roxmltree::Document::parse(NUMBERING).unwrap(), &Theme::default())
    }

    #[test]
    fn counters_are_per_instance_and_level() {
        let n = numbering();
        let mut state = NumberingState::default();
        let a = state.next(&n, "5", 0).unwrap();
        let b = state.next(&n, "5", 0).unwrap();
        assert_eq!((a.counter, a.marker.as_str()), (1, "1."));
        assert_eq!((b.counter, b.marker.as_str()), (2, "2."));

        let nested = state.next(&n, "5", 1).unwrap();
        assert_eq!(nested.counter, 1);
        assert_eq!(nested.marker, "2.a)");

        // the deeper paragraph neither consumed nor reset level 0
        let c = state.next(&n, "5", 0).unwrap();
        assert_eq!(c.counter, 3);
    }

    #[test]
    fn deeper_counters_keep_counting_across_shallower_paragraphs() {
        let n = numbering();
        let mut state = NumberingState::default();
        let counters: Vec<u32> = [0, 1, 0, 1]
            .into_iter()
            .map(|level| state.next(&n, "5", level).unwrap().counter)
            .collect();
        assert_eq!(counters, [1, 1, 2, 2]);
        let again = state.next(&n, "5", 1).unwrap();
        assert_eq!(again.counter, 3);
        assert_eq!(again.marker, "2.c)");
    }

    #[test]
    fn bullets_and_opt_out() {
        let n = numbering();
        let mut state = NumberingState::default();
        let bullet = state.next(&n, "6", 0).unwrap();
        assert_eq!(bullet.kind, ListKind::Bullet);
        assert_eq!(bullet.marker, "\u{2022}");
        assert_eq!(bullet.marker_font.as_deref(), Some("Symbol"));
        assert!(state.next(&n, "0", 0).is_none());
    }

    #[test]
    fn dangling_links_fall_back_to_bullet() {
        let n = numbering();
        let mut state = NumberingState::default();
        for num_id in ["9", "404"] {
            let info = state.next(&n, num_id, 0).unwrap();
            assert_eq!(info.kind, ListKind::Bullet);
            assert_eq!(info.marker, "\u{2022}");
        }
        // level missing from an existing format
        assert_eq!(state.next(&n, "5", 4).unwrap().marker, "\u{2022}");
    }

    #[test]
    fn start_override_and_style_link() {
        let n = numbering();
        let mut state = NumberingState::default();
        assert_eq!(state.next(&n, "7", 0).unwrap().marker, "4.");
        assert_eq!(state.next(&n, "7", 0).unwrap().marker, "5.");
        // instance 5 shares the abstract format but not the override
        assert_eq!(state.next(&n, "5", 0).unwrap().marker, "1.");
        assert_eq!(state.next(&n, "8", 0).unwrap().marker, "I");
        assert_eq!(n.resolve("5", 0).and_then(|d| d.indent_left), Some(36.0));
    }

    #[test]
    fn number_formats() {
        assert_eq!(format_number(4, "decimal"), "4");
        assert_eq!(format_number(4, "decimalZero"), "04");
        assert_eq!(format_number(1, "lowerLetter"), "a");
        assert_eq!(format_number(27, "lowerLetter"), "aa");
        assert_eq!(format_number(28, "upperLetter"), "AB");
        assert_eq!(format_number(14, "lowerRoman"), "xiv");
        assert_eq!(format_number(1999, "upperRoman"), "MCMXCIX");
        assert_eq!(format_number(u32::MAX, "lowerRoman"), "4294967295");
        assert_eq!(format_number(u32::MAX, "upperLetter").len(), 7);
        assert_eq!(format_number(1, "ordinal"), "1st");
        assert_eq!(format_number(12, "ordinal"), "12th");
        assert_eq!(format_number(23, "ordinal"), "23rd");
        assert_eq!(format_number(3, "none"), "");
        assert_eq!(format_number(3, "chineseCounting"), "3");
    }

    #[test]
    fn symbol_font_bullets_are_mapped() {
        assert_eq!(normalize_bullet_text("\u{F0A7}"), "\u{25A0}");
        assert_eq!(normalize_bullet_text("o"), "o");
        assert_eq!(symbol_pua_to_unicode(0x41), None);
    }
}
