use std::collections::HashMap;

use crate::model::Bookmark;

use super::{WML_NS, is_wml};

/// Text a node contributes to a bookmark span. Field instructions live in
/// `w:instrText` and deletions in `w:delText`, so neither shows up here.
fn visible_text<'a>(node: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    if is_wml(node, "t") {
        node.text()
    } else if is_wml(node, "tab") {
        Some("\t")
    } else {
        None
    }
}

/// Collect every `w:bookmarkStart` in `root` with the text between it and
/// the matching `w:bookmarkEnd`, even when the span crosses paragraphs.
pub(crate) fn collect_bookmarks(root: roxmltree::Node) -> Vec<Bookmark> {
    let mut bookmarks: Vec<Bookmark> = Vec::new();
    // bookmark id → index of the bookmark still collecting text
    let mut open: HashMap<String, usize> = HashMap::new();

    for node in root.descendants() {
        if is_wml(node, "bookmarkStart") {
            let id = node.attribute((WML_NS, "id")).unwrap_or("").to_string();
            let Some(name) = node.attribute((WML_NS, "name")) else {
                continue;
            };
            open.insert(id.clone(), bookmarks.len());
            bookmarks.push(Bookmark {
                id,
                name: name.to_string(),
                text: String::new(),
            });
            continue;
        }
        if is_wml(node, "bookmarkEnd") {
            if let Some(id) = node.attribute((WML_NS, "id")) {
                open.remove(id);
            }
            continue;
        }
        if open.is_empty() {
            continue;
        }
        let Some(text) = visible_text(node) else {
            continue;
        };
        if node.ancestors().any(|a| is_wml(a, "moveFrom")) {
            continue;
        }
        for &i in open.values() {
            bookmarks[i].text.push_str(text);
        }
    }

    for bm in &mut bookmarks {
        bm.text = bm.text.trim().to_string();
    }
    log::debug!("Collected {} bookmarks", bookmarks.len());
    bookmarks
}

/// Bookmarks Word creates for itself (`_GoBack`, `_Toc...`, `_Ref...`).
pub(crate) fn is_hidden(bookmark: &Bookmark) -> bool {
    bookmark.name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    #[test]
    fn spans_cross_paragraphs_and_are_trimmed() {
        let xml = format!(
            r#"<w:body {W}>
                <w:p><w:r><w:t>before </w:t></w:r><w:bookmarkStart w:id="0" w:name="intro"/><w:r><w:t xml:space="preserve"> Hello </w:t></w:r></w:p>
                <w:p><w:r><w:t>world </w:t></w:r><w:bookmarkEnd w:id="0"/><w:r><w:t>after</w:t></w:r></w:p>
                <w:p><w:bookmarkStart w:id="1" w:name="_GoBack"/><w:bookmarkEnd w:id="1"/></w:p>
            </w:body>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let bms = collect_bookmarks(doc.root_element());
        assert_eq!(bms.len(), 2);
        assert_eq!(bms[0].name, "intro");
        assert_eq!(bms[0].text, "Hello world");
        assert!(!is_hidden(&bms[0]));
        assert_eq!(bms[1].text, "");
        assert!(is_hidden(&bms[1]));
    }

    #[test]
    fn deleted_text_and_instructions_are_skipped() {
        let xml = format!(
            r#"<w:body {W}><w:p><w:bookmarkStart w:id="4" w:name="fig"/>
                <w:r><w:t>Figure </w:t></w:r>
                <w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> SEQ Figure </w:instrText></w:r>
                <w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>3</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r>
                <w:del><w:r><w:delText>gone</w:delText></w:r></w:del>
                <w:bookmarkEnd w:id="4"/></w:p></w:body>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let bms = collect_bookmarks(doc.root_element());
        assert_eq!(bms[0].text, "Figure 3");
    }
}
