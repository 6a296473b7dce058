//! `@handle` extraction from lead comments.

use std::sync::LazyLock;

use regex::Regex;

/// `@` at a word boundary followed by a handle of word characters, `.` or `-`.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@])@([A-Za-z0-9_][\w.\-]*)").expect("valid regex"));

/// Extract mentioned handles (without the `@`), de-duplicated in order of
/// first appearance. Trailing dots are treated as sentence punctuation.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for caps in MENTION_RE.captures_iter(content) {
        let handle = caps[1].trim_end_matches('.').to_string();
        if !handle.is_empty() && !handles.contains(&handle) {
            handles.push(handle);
        }
    }
    handles
}
