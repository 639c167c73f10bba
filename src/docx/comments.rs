use crate::model::Comment;

use super::metadata::parse_w3cdtf;
use super::package::{Package, parse_optional};
use super::{WML_NS, is_wml};

const COMMENTS_PART: &str = "word/comments.xml";

/// Plain text of a comment body, one line per paragraph.
fn comment_text(comment: roxmltree::Node) -> String {
    comment
        .descendants()
        .filter(|n| is_wml(*n, "p"))
        .map(|p| {
            p.descendants()
                .filter_map(|n| {
                    if is_wml(n, "t") {
                        n.text()
                    } else if is_wml(n, "tab") {
                        Some("\t")
                    } else {
                        None
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn parse_comments(package: &Package) -> Vec<Comment> {
    let Some(xml) = parse_optional(package, COMMENTS_PART) else {
        return Vec::new();
    };
    let attr = |n: roxmltree::Node, name: &str| {
        n.attribute((WML_NS, name))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let comments: Vec<Comment> = xml
        .root_element()
        .children()
        .filter(|n| is_wml(*n, "comment"))
        .filter_map(|n| {
            Some(Comment {
                id: n.attribute((WML_NS, "id"))?.to_string(),
                author: attr(n, "author"),
                initials: attr(n, "initials"),
                date: n.attribute((WML_NS, "date")).and_then(parse_w3cdtf),
                text: comment_text(n),
            })
        })
        .collect();
    log::debug!("{COMMENTS_PART}: {} comments", comments.len());
    comments
}
