//! Document properties (`docProps/core.xml`, `docProps/app.xml`), heading
//! detection for the outline, and style usage statistics.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::MetadataError;
use crate::model::{AppProperties, CoreProperties, StyleKind, StyleUsage};

static HEADING_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:heading|title)\s*(\d*)$|^h([1-6])$").expect("valid regex")
});

static KEYWORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;]\s*").expect("valid regex"));

fn parse_part<'a>(
    text: &'a str,
    part: &'static str,
    root: &str,
) -> Result<roxmltree::Document<'a>, MetadataError> {
    let xml = roxmltree::Document::parse(text)
        .map_err(|source| MetadataError::Malformed { part, source })?;
    let found = xml.root_element().tag_name().name();
    if found != root {
        return Err(MetadataError::UnexpectedRoot {
            part,
            found: found.to_string(),
        });
    }
    Ok(xml)
}

/// Child text by local name; the dc/dcterms/cp prefixes vary between producers.
fn child_text(xml: &roxmltree::Document, name: &str) -> Option<String> {
    xml.root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// W3CDTF: full RFC 3339, or a bare date/time without zone (read as UTC).
pub(crate) fn parse_w3cdtf(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn date_of(xml: &roxmltree::Document, name: &str) -> Option<DateTime<Utc>> {
    let raw = child_text(xml, name)?;
    let parsed = parse_w3cdtf(&raw);
    if parsed.is_none() {
        log::debug!("core.xml: unparseable {name} date {raw:?}");
    }
    parsed
}

pub fn parse_core_properties(text: &str) -> Result<CoreProperties, MetadataError> {
    let xml = parse_part(text, "docProps/core.xml", "coreProperties")?;
    let keywords = child_text(&xml, "keywords")
        .map(|k| {
            KEYWORD_SEPARATOR
                .split(&k)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(CoreProperties {
        title: child_text(&xml, "title"),
        subject: child_text(&xml, "subject"),
        description: child_text(&xml, "description"),
        creator: child_text(&xml, "creator"),
        keywords,
        language: child_text(&xml, "language"),
        last_modified_by: child_text(&xml, "lastModifiedBy"),
        created: date_of(&xml, "created"),
        modified: date_of(&xml, "modified"),
        last_printed: date_of(&xml, "lastPrinted"),
        revision: child_text(&xml, "revision").and_then(|v| v.parse().ok()),
        category: child_text(&xml, "category"),
    })
}

pub fn parse_app_properties(text: &str) -> Result<AppProperties, MetadataError> {
    let xml = parse_part(text, "docProps/app.xml", "Properties")?;
    let number = |name: &str| child_text(&xml, name).and_then(|v| v.parse::<u32>().ok());
    Ok(AppProperties {
        application: child_text(&xml, "Application"),
        app_version: child_text(&xml, "AppVersion"),
        template: child_text(&xml, "Template"),
        company: child_text(&xml, "Company"),
        manager: child_text(&xml, "Manager"),
        pages: number("Pages"),
        words: number("Words"),
        characters: number("Characters"),
        characters_with_spaces: number("CharactersWithSpaces"),
        lines: number("Lines"),
        paragraphs: number("Paragraphs"),
        total_time: number("TotalTime"),
    })
}

/// Outline level of a heading-like style id (`Heading2` → 2, `Title` → 1, `h3` → 3).
pub(crate) fn heading_level_for_style(style_id: &str) -> Option<u8> {
    let caps = HEADING_STYLE.captures(style_id)?;
    let digits = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or("");
    if digits.is_empty() {
        return Some(1);
    }
    digits.parse::<u8>().ok().map(|n| n.max(1))
}

pub(crate) fn sorted_style_usage(counts: &HashMap<(String, StyleKind), u32>) -> Vec<StyleUsage> {
    let mut usage: Vec<StyleUsage> = counts
        .iter()
        .map(|((style_id, kind), count)| StyleUsage {
            style_id: style_id.clone(),
            kind: *kind,
            count: *count,
        })
        .collect();
    usage.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.style_id.cmp(&b.style_id))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    usage
}
