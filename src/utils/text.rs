use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));

/// Strips anything that looks like a markup tag and collapses whitespace runs.
///
/// Some storefronts leak literal tags (`<tc>Name</tc>`) into text nodes, so this
/// runs on already-extracted text rather than on raw HTML.
pub fn sanitize_name(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escapes the three characters the messaging channel's HTML mode cares about.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
