use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use docxide_model::{Document, Element, ParseOptions};

/// Parse a DOCX package into a fully resolved document model
#[derive(Parser, Debug)]
#[command(name = "docxide-model", version)]
struct Args {
    /// DOCX file to parse
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Write the whole model as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Leave images as placeholders
    #[arg(long)]
    no_images: bool,

    /// Drop style ids and style usage
    #[arg(long)]
    no_styles: bool,

    /// Include comments
    #[arg(long)]
    comments: bool,

    /// Output file (stdout when omitted)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// -v for info, -vv for debug logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn summary(doc: &Document) -> String {
    let mut out = String::new();
    let core = &doc.metadata.core;
    out.push_str(&format!(
        "Title: {}\n",
        core.title.as_deref().unwrap_or("(untitled)")
    ));
    if let Some(creator) = &core.creator {
        out.push_str(&format!("Author: {creator}\n"));
    }

    let mut paragraphs = 0;
    let mut headings = 0;
    let mut tables = 0;
    let mut page_breaks = 0;
    let mut bookmarks = 0;
    for element in &doc.elements {
        match element {
            Element::Paragraph(_) => paragraphs += 1,
            Element::Heading(_) => headings += 1,
            Element::Table(_) => tables += 1,
            Element::PageBreak => page_breaks += 1,
            Element::Bookmark(_) => bookmarks += 1,
            Element::Footnote(_) | Element::Endnote(_) => {}
        }
    }
    let images = doc.images();
    out.push_str(&format!(
        "Elements: {paragraphs} paragraphs, {headings} headings, {tables} tables, {page_breaks} page breaks, {bookmarks} bookmarks\n"
    ));
    out.push_str(&format!(
        "Images: {} ({} with data)\n",
        images.len(),
        images.iter().filter(|i| i.has_data()).count()
    ));
    out.push_str(&format!(
        "Notes: {} footnotes, {} endnotes; {} comments; {} sections\n",
        doc.footnotes.len(),
        doc.endnotes.len(),
        doc.comments.len(),
        doc.sections.len()
    ));

    if !doc.metadata.outline.is_empty() {
        out.push_str("Outline:\n");
        for item in &doc.metadata.outline {
            let indent = "  ".repeat(item.level.saturating_sub(1) as usize);
            out.push_str(&format!("  {indent}{}\n", item.title));
        }
    }
    for warning in &doc.warnings {
        out.push_str(&format!("Warning: {warning}\n"));
    }
    out
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let options = ParseOptions {
        extract_images: !args.no_images,
        preserve_styles: !args.no_styles,
        preserve_comments: args.comments,
    };

    let bytes = match std::fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };
    let doc = match docxide_model::parse_bytes_with_options(&bytes, &options) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = if args.json {
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        summary(&doc)
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                eprintln!("Error: cannot write {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
            println!("Wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    ExitCode::SUCCESS
}
