use std::collections::HashMap;

use super::package::{Package, parse_optional};

pub(crate) const REL_TYPE_IMAGE: &str = "/image";
pub(crate) const REL_TYPE_HEADER: &str = "/header";
pub(crate) const REL_TYPE_FOOTER: &str = "/footer";
pub(crate) const REL_TYPE_HYPERLINK: &str = "/hyperlink";
pub(crate) const REL_TYPE_OFFICE_DOCUMENT: &str = "/officeDocument";

#[derive(Clone, Debug)]
pub(crate) struct Relationship {
    pub(crate) target: String,
    pub(crate) rel_type: String,
    pub(crate) external: bool,
}

/// Relationships owned by one part, resolved against that part's directory.
#[derive(Clone, Debug, Default)]
pub(crate) struct Relationships {
    base_dir: String,
    by_id: HashMap<String, Relationship>,
}

/// "word/header1.xml" → "word/_rels/header1.xml.rels"
pub(crate) fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Join `target` onto `base_dir`, collapsing `.` and `..` segments.
/// A leading '/' makes the target package-rooted.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let target = match target.strip_prefix('/') {
        Some(rooted) => rooted,
        None => {
            segments.extend(base_dir.split('/').filter(|s| !s.is_empty()));
            target
        }
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

impl Relationships {
    pub(crate) fn parse(xml: &roxmltree::Document, owner_part: &str) -> Relationships {
        let base_dir = owner_part
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let mut by_id = HashMap::new();
        for node in xml.root_element().children() {
            if node.tag_name().name() != "Relationship" {
                continue;
            }
            let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
                continue;
            };
            by_id.insert(
                id.to_string(),
                Relationship {
                    target: target.to_string(),
                    rel_type: node.attribute("Type").unwrap_or("").to_string(),
                    external: node.attribute("TargetMode") == Some("External"),
                },
            );
        }
        Relationships { base_dir, by_id }
    }

    /// Load the relationships of `part_path`. A missing or malformed rels part
    /// yields an empty set.
    pub(crate) fn load(package: &Package, part_path: &str) -> Relationships {
        match parse_optional(package, &rels_path_for(part_path)) {
            Some(xml) => Relationships::parse(&xml, part_path),
            None => Relationships {
                base_dir: part_path
                    .rsplit_once('/')
                    .map(|(dir, _)| dir.to_string())
                    .unwrap_or_default(),
                by_id: HashMap::new(),
            },
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    /// Package path of an internal target.
    pub(crate) fn part_path(&self, id: &str) -> Option<String> {
        let rel = self.get(id)?;
        if rel.external {
            return None;
        }
        Some(resolve_target(&self.base_dir, &rel.target))
    }

    /// Link target for a hyperlink relationship: the raw URI.
    pub(crate) fn url(&self, id: &str) -> Option<&str> {
        self.get(id).map(|r| r.target.as_str())
    }

    /// Package path of the first internal target of a given type, in id order.
    pub(crate) fn find_by_type(&self, type_suffix: &str) -> Option<String> {
        let mut ids: Vec<&String> = self
            .by_id
            .iter()
            .filter(|(_, r)| !r.external && r.rel_type.ends_with(type_suffix))
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        ids.first().and_then(|id| self.part_path(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn count_of_type(&self, type_suffix: &str) -> usize {
        self.by_id
            .values()
            .filter(|r| r.rel_type.ends_with(type_suffix))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_path() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for("word/header2.xml"), "word/_rels/header2.xml.rels");
        assert_eq!(rels_path_for("doc.xml"), "_rels/doc.xml.rels");
    }

    #[test]
    fn targets_resolve_relative_to_owner() {
        assert_eq!(resolve_target("word", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_target("word", "../media/a.png"), "media/a.png");
        assert_eq!(resolve_target("word", "/word/media/a.png"), "word/media/a.png");
        assert_eq!(resolve_target("word", "./theme/theme1.xml"), "word/theme/theme1.xml");
    }

    #[test]
    fn external_targets_are_not_parts() {
        let xml = roxmltree::Document::parse(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
                <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
            </Relationships>"#,
        )
        .unwrap();
        let rels = Relationships::parse(&xml, "word/document.xml");
        assert_eq!(rels.len(), 2);
        assert_eq!(rels.part_path("rId1").as_deref(), Some("word/media/image1.png"));
        assert_eq!(rels.part_path("rId2"), None);
        assert_eq!(rels.url("rId2"), Some("https://example.com"));
        assert_eq!(rels.url("rId9"), None);
        assert_eq!(rels.count_of_type(REL_TYPE_IMAGE), 1);
        assert_eq!(rels.count_of_type(REL_TYPE_HYPERLINK), 1);
        assert_eq!(rels.find_by_type(REL_TYPE_IMAGE).as_deref(), Some("word/media/image1.png"));
        assert_eq!(rels.find_by_type(REL_TYPE_HYPERLINK), None);
    }

    #[test]
    fn package_rels_locate_main_part() {
        let xml = roxmltree::Document::parse(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document2.xml"/>
            </Relationships>"#,
        )
        .unwrap();
        let rels = Relationships::parse(&xml, "");
        assert_eq!(rels_path_for(""), "_rels/.rels");
        assert_eq!(
            rels.find_by_type(REL_TYPE_OFFICE_DOCUMENT).as_deref(),
            Some("word/document2.xml")
        );
    }
}
