use std::sync::LazyLock;

use regex::Regex;

use crate::loader::Document;

#[allow(clippy::unwrap_used)]
static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

// Attributes before href are tolerated; matching is non-greedy and
// case-sensitive for the tag name.
#[allow(clippy::unwrap_used)]
static ANCHOR_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a\s+[^>]*href=["'](.*?)["'][^>]*>(.*?)</a>"#).unwrap());

/// A link found in a document body; ephemeral, consumed by reporting only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub url: String,
}

/// Scans the body for inline `[text](url)` links and `<a href>` anchors.
/// Results are concatenated inline-first in order of appearance, without
/// deduplication. Unreadable documents yield no links.
pub fn extract_links(document: &Document) -> Vec<Link> {
    let Some(content) = document.content.as_deref() else {
        return Vec::new();
    };

    let mut links: Vec<Link> = INLINE_LINK_RE
        .captures_iter(content)
        .map(|captures| Link {
            text: captures[1].to_owned(),
            url: captures[2].to_owned(),
        })
        .collect();

    links.extend(ANCHOR_LINK_RE.captures_iter(content).map(|captures| Link {
        text: captures[2].to_owned(),
        url: captures[1].to_owned(),
    }));

    links
}
