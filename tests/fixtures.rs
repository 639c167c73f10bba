//! Parses every DOCX under tests/fixtures/<group>/<case>/input.docx and checks
//! the model is internally consistent. Skips when no fixtures are checked out.

mod common;

use docxide_model::{Element, parse};
use rayon::prelude::*;

#[test]
fn fixtures_parse_into_consistent_models() {
    let _ = env_logger::builder().is_test(true).try_init();
    let fixtures = match common::discover_fixtures() {
        Ok(f) if !f.is_empty() => f,
        _ => {
            println!("No fixtures found, skipping");
            return;
        }
    };

    let failures: Vec<String> = fixtures
        .par_iter()
        .filter_map(|dir| {
            let name = format!(
                "{}/{}",
                common::group_name(dir),
                dir.file_name()?.to_string_lossy()
            );
            let doc = match parse(&dir.join("input.docx")) {
                Ok(doc) => doc,
                Err(e) => return Some(format!("{name}: {e}")),
            };
            let headings = doc
                .elements
                .iter()
                .filter(|e| matches!(e, Element::Heading(_)))
                .count();
            if doc.metadata.outline.len() > headings {
                return Some(format!(
                    "{name}: {} outline entries but {headings} headings",
                    doc.metadata.outline.len()
                ));
            }
            if doc.images().iter().any(|i| i.has_data() && i.mime_type.is_none()) {
                return Some(format!("{name}: image data without a MIME type"));
            }
            println!("  {name}: {} elements, {} images", doc.elements.len(), doc.images().len());
            None
        })
        .collect();

    assert!(failures.is_empty(), "Fixture failures:\n{}", failures.join("\n"));
}
