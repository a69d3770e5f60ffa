//! Input preprocessing: comment stripping and preamble skipping
//!
//! Both run before any structural processing, so later stages never see
//! comment text or preamble declarations.

use crate::core::braces::is_escaped;
use crate::data::constants::SECTIONING_COMMANDS;

/// Remove line comments: an unescaped `%` truncates the remainder of its
/// line. Trailing whitespace is trimmed, and trailing empty lines dropped.
pub fn strip_comments(content: &str) -> String {
    let mut result: Vec<String> = Vec::new();
    for line in content.lines() {
        let mut cut = line.len();
        for (idx, ch) in line.char_indices() {
            if ch == '%' && !is_escaped(line, idx) {
                cut = idx;
                break;
            }
        }
        result.push(line[..cut].trim_end().to_string());
    }
    while result.last().is_some_and(|l| l.is_empty()) {
        result.pop();
    }
    result.join("\n")
}

/// Skip everything before the document body. If `\begin{document}` exists,
/// content starts after it and anything from `\end{document}` on is
/// dropped; otherwise the body starts at the earliest sectioning command;
/// otherwise the whole content is used as-is.
pub fn skip_preamble(content: &str) -> String {
    const BODY_START: &str = "\\begin{document}";
    const BODY_END: &str = "\\end{document}";

    if let Some(pos) = content.find(BODY_START) {
        let body = &content[pos + BODY_START.len()..];
        let body = match body.find(BODY_END) {
            Some(end) => &body[..end],
            None => body,
        };
        return body.to_string();
    }

    let mut earliest = content.len();
    for (name, _) in SECTIONING_COMMANDS {
        for needle in [format!("\\{}{{", name), format!("\\{}*{{", name)] {
            if let Some(pos) = content.find(&needle) {
                earliest = earliest.min(pos);
            }
        }
    }
    content[earliest.min(content.len())..].to_string()
}
