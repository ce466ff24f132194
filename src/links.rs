//! Wiki link discovery and rewriting
//!
//! Pages link to each other with `[[Page title]]` or `[[Page title|label]]`.
//! Discovery drives the export page order; rewriting turns links into
//! anchors pointing at the page's section inside the exported document.
//! Links inside `<pre>`/`<code>` regions are left alone; regions are
//! delimited exactly as [`normalize_line_breaks`](crate::normalize::normalize_line_breaks)
//! delimits them.

use crate::normalize::verbatim_spans;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]\|\r\n]+)(?:\|([^\]\r\n]*))?\]\]").expect("valid wiki link pattern")
});

/// Link targets in order of first appearance, duplicates removed
pub fn discover_links(html: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for segment in outside_verbatim(html) {
        for caps in WIKI_LINK.captures_iter(segment) {
            let title = caps[1].trim();
            if !title.is_empty() && !found.iter().any(|t| t == title) {
                found.push(title.to_string());
            }
        }
    }
    found
}

/// Anchor id used for a page's section in the exported document
///
/// ```
/// assert_eq!(wiki_export::links::anchor_for("Cats & Dogs"), "page-cats-dogs");
/// ```
pub fn anchor_for(title: &str) -> String {
    let mut slug = String::with_capacity(title.len() + 5);
    slug.push_str("page-");
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.ends_with('-') {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Replace wiki links with in-document anchors.
///
/// `anchor_of` maps a link target to the anchor of its section. Links whose
/// target has no anchor are replaced by their label only, since the target is
/// not part of the document.
pub fn rewrite_links(html: &str, anchor_of: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for span in verbatim_spans(html) {
        out.push_str(&rewrite_segment(&html[last..span.start], &anchor_of));
        out.push_str(&html[span.clone()]);
        last = span.end;
    }
    out.push_str(&rewrite_segment(&html[last..], &anchor_of));
    out
}

fn rewrite_segment(segment: &str, anchor_of: &impl Fn(&str) -> Option<String>) -> String {
    WIKI_LINK
        .replace_all(segment, |caps: &regex::Captures<'_>| {
            let title = caps[1].trim();
            let label = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|l| !l.is_empty())
                .unwrap_or(title);
            match anchor_of(title) {
                Some(anchor) => format!("<a href=\"#{}\">{}</a>", anchor, label),
                None => label.to_string(),
            }
        })
        .into_owned()
}

fn outside_verbatim(html: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut last = 0;
    for span in verbatim_spans(html) {
        segments.push(&html[last..span.start]);
        last = span.end;
    }
    segments.push(&html[last..]);
    segments
}
