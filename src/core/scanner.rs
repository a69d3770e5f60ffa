//! Construct scanner
//!
//! Locates occurrences of the fixed construct catalogue (environments,
//! display/inline math delimiters, multi-argument commands) in left-to-right
//! document order, using the brace matcher to delimit arguments regardless
//! of nesting. A construct recognized by its opening token but never closed
//! is reported with `closing_verified: false` and must be left untouched by
//! consumers, so the document stays inspectable.
//!
//! Overlap between priority classes is handled by the callers: each
//! extraction pass physically replaces the spans it claims before the next
//! pass runs, so a lower-priority pattern can never re-match inside a
//! claimed span.

use crate::core::braces::{is_escaped, match_brace, skip_whitespace};

/// Kind of recognized construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    Environment,
    DisplayMath,
    InlineMath,
    Command,
}

/// A single construct occurrence
#[derive(Debug, Clone)]
pub struct ConstructMatch {
    pub kind: ConstructKind,
    /// Environment or command name; empty for delimiter forms
    pub name: String,
    /// Byte offset of the construct's first character
    pub start: usize,
    /// One past the construct's last character (only meaningful when
    /// `closing_verified` is true)
    pub end: usize,
    /// Span of the main content (environment body or math text)
    pub body_start: usize,
    pub body_end: usize,
    /// Command argument texts, outer braces stripped, in order
    pub args: Vec<String>,
    /// False when the construct was never closed
    pub closing_verified: bool,
}

impl ConstructMatch {
    /// The main content slice
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body_start..self.body_end]
    }
}

/// Splice replacements into `text`. Matches must be in document order and
/// non-overlapping; a `None` replacement leaves the span untouched. This is
/// how passes physically claim spans: once replaced, a lower-priority
/// pattern can never re-match inside them.
pub fn splice(
    text: &str,
    matches: &[ConstructMatch],
    mut replace: impl FnMut(&ConstructMatch) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in matches {
        if m.start < last {
            continue;
        }
        if let Some(r) = replace(m) {
            out.push_str(&text[last..m.start]);
            out.push_str(&r);
            last = m.end;
        }
    }
    out.push_str(&text[last..]);
    out
}

// ============================================================================
// Environments
// ============================================================================

/// Find all `\begin{name}…\end{name}` spans for the given environment names,
/// in document order. Same-name nesting is counted, so the reported close is
/// the true outer one.
pub fn find_environments(text: &str, names: &[&str]) -> Vec<ConstructMatch> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find("\\begin{") {
        let start = pos + rel;
        if is_escaped(text, start) {
            pos = start + 1;
            continue;
        }

        let brace = start + "\\begin".len();
        let name_end = match match_brace(text, brace) {
            Some(e) => e,
            None => {
                pos = brace + 1;
                continue;
            }
        };
        let name = &text[brace + 1..name_end - 1];
        if !names.contains(&name) {
            pos = name_end;
            continue;
        }

        let begin_tok = format!("\\begin{{{}}}", name);
        let end_tok = format!("\\end{{{}}}", name);

        let mut depth = 1usize;
        let mut search = name_end;
        let mut close = None;
        while depth > 0 {
            let next_begin = text[search..].find(&begin_tok).map(|i| search + i);
            let next_end = text[search..].find(&end_tok).map(|i| search + i);
            match (next_begin, next_end) {
                (_, None) => break,
                (Some(b), Some(e)) if b < e => {
                    depth += 1;
                    search = b + begin_tok.len();
                }
                (_, Some(e)) => {
                    depth -= 1;
                    search = e + end_tok.len();
                    if depth == 0 {
                        close = Some(e);
                    }
                }
            }
        }

        match close {
            Some(e) => {
                let end = e + end_tok.len();
                out.push(ConstructMatch {
                    kind: ConstructKind::Environment,
                    name: name.to_string(),
                    start,
                    end,
                    body_start: name_end,
                    body_end: e,
                    args: Vec::new(),
                    closing_verified: true,
                });
                pos = end;
            }
            None => {
                out.push(ConstructMatch {
                    kind: ConstructKind::Environment,
                    name: name.to_string(),
                    start,
                    end: text.len(),
                    body_start: name_end,
                    body_end: text.len(),
                    args: Vec::new(),
                    closing_verified: false,
                });
                // Continue scanning past the opening token so the rest of
                // the document is still inspected.
                pos = name_end;
            }
        }
    }
    out
}

// ============================================================================
// Commands
// ============================================================================

/// Find all `\name{arg1}…{argN}` occurrences with exactly `argc` brace
/// groups, in document order. An occurrence with a missing or unterminated
/// argument group is reported with `closing_verified: false`.
pub fn find_commands(text: &str, name: &str, argc: usize) -> Vec<ConstructMatch> {
    let needle = format!("\\{}", name);
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find(&needle) {
        let start = pos + rel;
        if is_escaped(text, start) {
            pos = start + 1;
            continue;
        }
        let after = start + needle.len();
        // Word boundary: \section must not match inside \sectionfoo
        if text[after..]
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic())
        {
            pos = after;
            continue;
        }

        let mut args = Vec::new();
        let mut cursor = after;
        let mut verified = true;
        for _ in 0..argc {
            cursor = skip_whitespace(text, cursor);
            if text.as_bytes().get(cursor) == Some(&b'{') {
                match match_brace(text, cursor) {
                    Some(end) => {
                        args.push(text[cursor + 1..end - 1].to_string());
                        cursor = end;
                    }
                    None => {
                        verified = false;
                        break;
                    }
                }
            } else {
                verified = false;
                break;
            }
        }

        let end = if verified { cursor } else { after };
        out.push(ConstructMatch {
            kind: ConstructKind::Command,
            name: name.to_string(),
            start,
            end,
            body_start: start,
            body_end: end,
            args,
            closing_verified: verified,
        });
        pos = end.max(after);
    }
    out
}

// ============================================================================
// Math delimiters
// ============================================================================

/// Find all `$$…$$` spans, in document order. Bodies may span lines. An
/// opening `$$` with no closing pair is reported unverified.
pub fn find_display_math(text: &str) -> Vec<ConstructMatch> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'$' && !is_escaped(text, i) {
            let body_start = i + 2;
            let mut j = body_start;
            let mut close = None;
            while j + 1 < bytes.len() {
                if bytes[j] == b'$' && bytes[j + 1] == b'$' && !is_escaped(text, j) {
                    close = Some(j);
                    break;
                }
                j += 1;
            }
            match close {
                Some(j) => {
                    out.push(ConstructMatch {
                        kind: ConstructKind::DisplayMath,
                        name: String::new(),
                        start: i,
                        end: j + 2,
                        body_start,
                        body_end: j,
                        args: Vec::new(),
                        closing_verified: true,
                    });
                    i = j + 2;
                }
                None => {
                    out.push(ConstructMatch {
                        kind: ConstructKind::DisplayMath,
                        name: String::new(),
                        start: i,
                        end: body_start,
                        body_start,
                        body_end: text.len(),
                        args: Vec::new(),
                        closing_verified: false,
                    });
                    i = body_start;
                }
            }
        } else {
            i += 1;
        }
    }
    out
}

/// Find all single-`$` inline math spans, in document order. The closing
/// delimiter must appear on the same line; a lone `$` is reported
/// unverified and scanning continues past it.
pub fn find_inline_math(text: &str) -> Vec<ConstructMatch> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' || is_escaped(text, i) {
            i += 1;
            continue;
        }
        // Skip any $$ pair left over (should have been claimed already)
        if bytes.get(i + 1) == Some(&b'$') {
            i += 2;
            continue;
        }

        let body_start = i + 1;
        let mut j = body_start;
        let mut close = None;
        while j < bytes.len() && bytes[j] != b'\n' {
            if bytes[j] == b'$' && !is_escaped(text, j) {
                close = Some(j);
                break;
            }
            j += 1;
        }
        match close {
            Some(j) => {
                out.push(ConstructMatch {
                    kind: ConstructKind::InlineMath,
                    name: String::new(),
                    start: i,
                    end: j + 1,
                    body_start,
                    body_end: j,
                    args: Vec::new(),
                    closing_verified: true,
                });
                i = j + 1;
            }
            None => {
                out.push(ConstructMatch {
                    kind: ConstructKind::InlineMath,
                    name: String::new(),
                    start: i,
                    end: body_start,
                    body_start,
                    body_end: body_start,
                    args: Vec::new(),
                    closing_verified: false,
                });
                i = body_start;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_environment_basic() {
        let text = r"before \begin{equation} x = 1 \end{equation} after";
        let matches = find_environments(text, &["equation"]);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert!(m.closing_verified);
        assert_eq!(m.body(text).trim(), "x = 1");
        assert_eq!(&text[m.start..m.end], r"\begin{equation} x = 1 \end{equation}");
    }

    #[test]
    fn test_find_environment_nested_same_name() {
        let text = r"\begin{itemize}\item a \begin{itemize}\item b\end{itemize}\end{itemize}";
        let matches = find_environments(text, &["itemize"]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].end, text.len());
    }

    #[test]
    fn test_unterminated_environment() {
        let text = r"\begin{align} x &= 1";
        let matches = find_environments(text, &["align"]);
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].closing_verified);
    }

    #[test]
    fn test_environment_name_not_in_catalogue() {
        let text = r"\begin{verbatim}ignored\end{verbatim}";
        assert!(find_environments(text, &["equation"]).is_empty());
    }

    #[test]
    fn test_find_commands_nested_args() {
        let text = r"\multicolumn{2}{|c|}{a \textbf{b} c}";
        let matches = find_commands(text, "multicolumn", 3);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert!(m.closing_verified);
        assert_eq!(m.args, vec!["2", "|c|", r"a \textbf{b} c"]);
        assert_eq!(m.end, text.len());
    }

    #[test]
    fn test_find_commands_word_boundary() {
        let text = r"\sectional{x} and \section{Intro}";
        let matches = find_commands(text, "section", 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].args[0], "Intro");
    }

    #[test]
    fn test_find_commands_missing_arg() {
        let text = r"\caption";
        let matches = find_commands(text, "caption", 1);
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].closing_verified);
    }

    #[test]
    fn test_display_math() {
        let text = "a $$x+y$$ b $$p\nq$$ c";
        let matches = find_display_math(text);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].body(text), "x+y");
        assert_eq!(matches[1].body(text), "p\nq");
        assert!(matches.iter().all(|m| m.closing_verified));
    }

    #[test]
    fn test_unclosed_display_math() {
        let text = "a $$x+y";
        let matches = find_display_math(text);
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].closing_verified);
    }

    #[test]
    fn test_inline_math_same_line_only() {
        let text = "cost is $5 and\nweight $w$ here";
        let matches = find_inline_math(text);
        assert_eq!(matches.len(), 2);
        assert!(!matches[0].closing_verified);
        assert!(matches[1].closing_verified);
        assert_eq!(matches[1].body(text), "w");
    }

    #[test]
    fn test_escaped_dollar_ignored() {
        let text = r"price \$5 and $x$";
        let matches = find_inline_math(text);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].body(text), "x");
    }
}
