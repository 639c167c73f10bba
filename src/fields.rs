//! Field instruction grammar (`PAGE`, `REF bm \h`, `=SUM(ABOVE)`, ...) and
//! its evaluation to display text.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use regex::Regex;

use crate::model::CoreProperties;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Page,
    NumPages,
    Ref,
    Hyperlink,
    Toc,
    Seq,
    StyleRef,
    Date,
    Time,
    Author,
    Title,
    Subject,
    Keywords,
    Comments,
    LastSavedBy,
    FileName,
    FileSize,
    CreateDate,
    SaveDate,
    PrintDate,
    PageRef,
    NoteRef,
    Xe,
    Tc,
    Formula,
    Unknown,
}

impl FieldType {
    fn from_keyword(word: &str) -> FieldType {
        match word.to_ascii_uppercase().as_str() {
            "PAGE" => FieldType::Page,
            "NUMPAGES" => FieldType::NumPages,
            "REF" => FieldType::Ref,
            "HYPERLINK" => FieldType::Hyperlink,
            "TOC" => FieldType::Toc,
            "SEQ" => FieldType::Seq,
            "STYLEREF" => FieldType::StyleRef,
            "DATE" => FieldType::Date,
            "TIME" => FieldType::Time,
            "AUTHOR" => FieldType::Author,
            "TITLE" => FieldType::Title,
            "SUBJECT" => FieldType::Subject,
            "KEYWORDS" => FieldType::Keywords,
            "COMMENTS" => FieldType::Comments,
            "LASTSAVEDBY" => FieldType::LastSavedBy,
            "FILENAME" => FieldType::FileName,
            "FILESIZE" => FieldType::FileSize,
            "CREATEDATE" => FieldType::CreateDate,
            "SAVEDATE" => FieldType::SaveDate,
            "PRINTDATE" => FieldType::PrintDate,
            "PAGEREF" => FieldType::PageRef,
            "NOTEREF" => FieldType::NoteRef,
            "XE" => FieldType::Xe,
            "TC" => FieldType::Tc,
            _ => FieldType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Page => "PAGE",
            FieldType::NumPages => "NUMPAGES",
            FieldType::Ref => "REF",
            FieldType::Hyperlink => "HYPERLINK",
            FieldType::Toc => "TOC",
            FieldType::Seq => "SEQ",
            FieldType::StyleRef => "STYLEREF",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::Author => "AUTHOR",
            FieldType::Title => "TITLE",
            FieldType::Subject => "SUBJECT",
            FieldType::Keywords => "KEYWORDS",
            FieldType::Comments => "COMMENTS",
            FieldType::LastSavedBy => "LASTSAVEDBY",
            FieldType::FileName => "FILENAME",
            FieldType::FileSize => "FILESIZE",
            FieldType::CreateDate => "CREATEDATE",
            FieldType::SaveDate => "SAVEDATE",
            FieldType::PrintDate => "PRINTDATE",
            FieldType::PageRef => "PAGEREF",
            FieldType::NoteRef => "NOTEREF",
            FieldType::Xe => "XE",
            FieldType::Tc => "TC",
            FieldType::Formula => "FORMULA",
            FieldType::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchValue {
    Flag,
    Value(String),
}

impl SwitchValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SwitchValue::Flag => None,
            SwitchValue::Value(v) => Some(v),
        }
    }
}

/// A parsed field instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub field_type: FieldType,
    pub instruction: String,
    /// Switches in the order they appear, e.g. `("\\h", Flag)`.
    pub switches: Vec<(String, SwitchValue)>,
    pub arguments: Vec<String>,
    pub bookmark_ref: Option<String>,
    pub hyperlink: Option<String>,
    pub sequence_name: Option<String>,
    pub style_name: Option<String>,
    pub formula: Option<String>,
}

impl FieldDescriptor {
    pub fn switch(&self, name: &str) -> Option<&SwitchValue> {
        self.switches
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn has_switch(&self, name: &str) -> bool {
        self.switch(name).is_some()
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches('"').to_string()
}

/// Join whitespace-separated parts starting at `start` into one quoted span.
/// Returns the unquoted text and the index of the last part consumed.
fn take_quoted(parts: &[&str], start: usize) -> (String, usize) {
    let first = parts[start];
    if first.len() > 1 && first.ends_with('"') {
        return (first[1..first.len() - 1].to_string(), start);
    }
    let mut text = first[1..].to_string();
    let mut i = start;
    while i + 1 < parts.len() {
        i += 1;
        text.push(' ');
        let part = parts[i];
        if let Some(inner) = part.strip_suffix('"') {
            text.push_str(inner);
            return (text, i);
        }
        text.push_str(part);
    }
    // unterminated quote: keep what was collected
    (text, i)
}

/// Parse a raw field instruction such as `REF _Ref123 \h` or `=SUM(ABOVE)`.
pub fn parse_field(instruction: &str) -> FieldDescriptor {
    let trimmed = instruction.trim();
    let mut desc = FieldDescriptor {
        field_type: FieldType::Unknown,
        instruction: trimmed.to_string(),
        switches: Vec::new(),
        arguments: Vec::new(),
        bookmark_ref: None,
        hyperlink: None,
        sequence_name: None,
        style_name: None,
        formula: None,
    };

    if trimmed.starts_with('=') {
        desc.field_type = FieldType::Formula;
        desc.formula = Some(trimmed.to_string());
        return desc;
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let Some(keyword) = parts.first() else {
        return desc;
    };
    desc.field_type = FieldType::from_keyword(keyword);

    let mut i = 1;
    while i < parts.len() {
        let part = parts[i];
        if part.starts_with('"') {
            let (text, end) = take_quoted(&parts, i);
            desc.arguments.push(text);
            i = end;
        } else if part.starts_with('\\') {
            match parts.get(i + 1) {
                Some(next) if !next.starts_with('\\') => {
                    let (value, end) = if next.starts_with('"') {
                        take_quoted(&parts, i + 1)
                    } else {
                        (next.to_string(), i + 1)
                    };
                    desc.switches
                        .push((part.to_string(), SwitchValue::Value(value)));
                    i = end;
                }
                _ => desc.switches.push((part.to_string(), SwitchValue::Flag)),
            }
        } else {
            desc.arguments.push(part.to_string());
        }
        i += 1;
    }

    match desc.field_type {
        FieldType::Ref | FieldType::PageRef | FieldType::NoteRef => {
            desc.bookmark_ref = desc.arguments.first().cloned();
        }
        FieldType::Hyperlink => {
            if let Some(anchor) = desc.switch("\\l") {
                desc.bookmark_ref = anchor.as_str().map(strip_quotes);
            } else {
                desc.hyperlink = desc.arguments.first().map(|a| strip_quotes(a));
            }
        }
        FieldType::Seq => desc.sequence_name = desc.arguments.first().cloned(),
        FieldType::StyleRef => desc.style_name = desc.arguments.first().map(|a| strip_quotes(a)),
        _ => {}
    }

    desc
}

/// Mutable state consulted and updated while evaluating fields.
#[derive(Clone, Debug, Default)]
pub struct FieldContext {
    /// Bookmark name or id to its text.
    pub bookmarks: HashMap<String, String>,
    pub sequences: HashMap<String, u32>,
    pub metadata: CoreProperties,
    pub current_date: Option<NaiveDateTime>,
    /// Numeric values above the current table cell.
    pub table_values: Vec<f64>,
    /// Numeric values to the left of the current table cell.
    pub row_values: Vec<f64>,
}

impl FieldContext {
    pub fn add_bookmark(&mut self, id: &str, name: &str, text: &str) {
        let display = if text.is_empty() { name } else { text };
        self.bookmarks.insert(name.to_string(), display.to_string());
        if !id.is_empty() {
            self.bookmarks
                .entry(id.to_string())
                .or_insert_with(|| display.to_string());
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.current_date
            .unwrap_or_else(|| Local::now().naive_local())
    }
}

/// Evaluate a parsed field to its display text. Never fails; missing context
/// yields the documented placeholder for the field type.
pub fn evaluate_field(field: &FieldDescriptor, ctx: &mut FieldContext) -> String {
    match field.field_type {
        FieldType::Page | FieldType::NumPages => "1".to_string(),
        FieldType::Ref | FieldType::PageRef | FieldType::NoteRef => match &field.bookmark_ref {
            Some(name) => match ctx.bookmarks.get(name) {
                Some(text) if !text.is_empty() => text.clone(),
                _ => format!("[{name}]"),
            },
            None => format!("[{}]", field.field_type.as_str()),
        },
        FieldType::Hyperlink => {
            if let Some(anchor) = &field.bookmark_ref {
                format!("[Link: {anchor}]")
            } else if let Some(url) = &field.hyperlink {
                url.clone()
            } else {
                "[HYPERLINK]".to_string()
            }
        }
        FieldType::Seq => match &field.sequence_name {
            Some(name) => {
                let counter = ctx.sequences.entry(name.clone()).or_insert(0);
                *counter += 1;
                counter.to_string()
            }
            None => "1".to_string(),
        },
        FieldType::StyleRef => format!(
            "[{}]",
            field.style_name.as_deref().unwrap_or("STYLEREF")
        ),
        FieldType::Toc => "[Table of Contents]".to_string(),
        FieldType::Date => format_date(field, ctx.now(), "%-m/%-d/%Y"),
        FieldType::Time => format_date(field, ctx.now(), "%-I:%M:%S %p"),
        FieldType::CreateDate => {
            let at = utc_to_local(ctx.metadata.created).unwrap_or_else(|| ctx.now());
            format_date(field, at, "%-m/%-d/%Y")
        }
        FieldType::SaveDate => {
            let at = utc_to_local(ctx.metadata.modified).unwrap_or_else(|| ctx.now());
            format_date(field, at, "%-m/%-d/%Y")
        }
        FieldType::PrintDate => {
            let at = utc_to_local(ctx.metadata.last_printed).unwrap_or_else(|| ctx.now());
            format_date(field, at, "%-m/%-d/%Y")
        }
        FieldType::Author => metadata_or(&ctx.metadata.creator, "[Author]"),
        FieldType::Title => metadata_or(&ctx.metadata.title, "[Title]"),
        FieldType::Subject => metadata_or(&ctx.metadata.subject, "[Subject]"),
        FieldType::Comments => metadata_or(&ctx.metadata.description, "[Comments]"),
        FieldType::LastSavedBy => metadata_or(&ctx.metadata.last_modified_by, "[LastSavedBy]"),
        FieldType::Keywords => {
            if ctx.metadata.keywords.is_empty() {
                "[Keywords]".to_string()
            } else {
                ctx.metadata.keywords.join(", ")
            }
        }
        FieldType::FileName => "[Filename]".to_string(),
        FieldType::Formula => evaluate_formula(field.formula.as_deref().unwrap_or(""), ctx),
        FieldType::FileSize | FieldType::Xe | FieldType::Tc | FieldType::Unknown => {
            format!("{{{}}}", field.field_type.as_str())
        }
    }
}

fn metadata_or(value: &Option<String>, placeholder: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.clone(),
        _ => placeholder.to_string(),
    }
}

fn utc_to_local(at: Option<DateTime<Utc>>) -> Option<NaiveDateTime> {
    at.map(|dt| dt.with_timezone(&Local).naive_local())
}

fn format_date(field: &FieldDescriptor, at: NaiveDateTime, default: &str) -> String {
    match field.switch("\\@").and_then(|v| v.as_str()) {
        Some(picture) => at.format(&picture_to_strftime(picture)).to_string(),
        None => at.format(default).to_string(),
    }
}

/// Translate a date-time picture (`\@ "MMMM d, yyyy"`) into a strftime pattern.
fn picture_to_strftime(picture: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("m", "%-M"),
        ("ss", "%S"),
        ("s", "%-S"),
        ("AM/PM", "%p"),
        ("am/pm", "%P"),
    ];
    let mut out = String::new();
    let mut rest = picture;
    'outer: while let Some(c) = rest.chars().next() {
        if c == '\'' {
            // quoted literal
            let inner = &rest[1..];
            let end = inner.find('\'').unwrap_or(inner.len());
            out.push_str(&inner[..end].replace('%', "%%"));
            rest = inner.get(end + 1..).unwrap_or("");
            continue;
        }
        for (token, fmt) in TOKENS {
            if rest.starts_with(token) {
                out.push_str(fmt);
                rest = &rest[token.len()..];
                continue 'outer;
            }
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

static ARITHMETIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=(\d+)([+\-*/])(\d+)$").expect("valid regex"));

fn aggregate_values<'a>(ctx: &'a FieldContext, direction: &str) -> &'a [f64] {
    match direction {
        "left" | "right" if !ctx.row_values.is_empty() => &ctx.row_values,
        _ => &ctx.table_values,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Table formulas: `sum`, `average` and `count` over neighbouring cells and
/// two-operand integer arithmetic. Anything else is echoed unevaluated.
fn evaluate_formula(formula: &str, ctx: &FieldContext) -> String {
    let clean: String = formula
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    for direction in ["above", "left", "below", "right"] {
        if clean.contains(&format!("sum({direction})")) {
            let values = aggregate_values(ctx, direction);
            if values.is_empty() {
                return "0".to_string();
            }
            return format_number(values.iter().sum());
        }
    }
    if clean.contains("average(above)") {
        let values = &ctx.table_values;
        if values.is_empty() {
            return "0".to_string();
        }
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        return format!("{avg:.2}");
    }
    if clean.contains("count(above)") {
        return ctx.table_values.len().to_string();
    }

    if let Some(caps) = ARITHMETIC.captures(&clean) {
        let (Ok(a), Ok(b)) = (caps[1].parse::<f64>(), caps[3].parse::<f64>()) else {
            return formula.to_string();
        };
        let result = match &caps[2] {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            _ if b == 0.0 => return formula.to_string(),
            _ => a / b,
        };
        return format_number(result);
    }

    formula.to_string()
}
