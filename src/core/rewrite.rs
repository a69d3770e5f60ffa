//! Structural rewriter
//!
//! Converts the remaining document markup (after equation extraction) into
//! the intermediate line-oriented representation. Passes run in a fixed
//! order (later steps assume earlier ones already ran) and each pass is
//! total: absence of a pattern is a no-op, and a malformed construct is
//! left in place with a warning.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::braces::{is_escaped, match_brace, skip_whitespace};
use crate::core::scanner::{find_commands, find_environments, splice, ConstructMatch};
use crate::data::constants::{
    heading_marker, BULLET_LIST_ENVS, EMPHASIS_COMMANDS, FIGURE_ENVS, ITEM_BULLET_MARK,
    ITEM_NUMBER_MARK, NUMBER_LIST_ENVS, REFERENCE_COMMANDS, SECTIONING_COMMANDS, SUB_CLOSE,
    SUB_OPEN, SUP_CLOSE, SUP_OPEN, TABLE_ENVS, TABLE_END_MARK, TABLE_MARK, TABULAR_ENVS,
};
use crate::utils::error::ConversionWarning;

lazy_static! {
    static ref DISPLAY_RE: Regex = Regex::new("\u{E000}MATHD:[0-9]+\u{E001}").unwrap();
    static ref REF_RE: Regex = {
        let names: Vec<&str> = REFERENCE_COMMANDS.iter().copied().collect();
        Regex::new(&format!(r"\\(?:{})\{{([^}}]*)\}}", names.join("|"))).unwrap()
    };
    static ref LABEL_RE: Regex = Regex::new(r"\\label\{[^}]*\}").unwrap();
    static ref CITE_RE: Regex =
        Regex::new(r"\\[cC]ite[tp]?\*?(?:\[[^\]]*\])?\{([^}]*)\}").unwrap();
    static ref LINEBREAK_RE: Regex = Regex::new(r"\\\\(\[[^\]]*\])?|\\newline\b").unwrap();
}

/// Apply all rewrite passes in order. The returned text is the
/// line-oriented intermediate representation consumed by reinsertion.
pub fn rewrite_structure(text: &str) -> (String, Vec<ConversionWarning>) {
    let mut warnings = Vec::new();
    let text = collapse_alt_text(text);
    let text = collapse_size_wrappers(&text);
    let text = rewrite_figures(&text, &mut warnings);
    let text = rewrite_tables(&text, &mut warnings);
    let text = rewrite_lists(&text, &mut warnings);
    let text = rewrite_headings(&text);
    let text = rewrite_references(&text);
    let text = rewrite_inline_formatting(&text);
    let text = rewrite_line_breaks(&text);
    (clean_lines(&text), warnings)
}

// ============================================================================
// Pass 1: alternate-text commands
// ============================================================================

/// `\texorpdfstring{tex}{plain}` collapses to its second argument.
fn collapse_alt_text(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let matches = find_commands(&current, "texorpdfstring", 2);
        if !matches.iter().any(|m| m.closing_verified) {
            return current;
        }
        current = splice(&current, &matches, |m| {
            m.closing_verified.then(|| m.args[1].clone())
        });
    }
}

// ============================================================================
// Pass 2: size wrappers
// ============================================================================

/// `\resizebox{w}{h}{content}` and `\scalebox{f}{content}` collapse to
/// their content, stripping surrounding math delimiters when the entire
/// content was a single inline formula.
fn collapse_size_wrappers(text: &str) -> String {
    let mut current = text.to_string();
    for (name, argc, content_arg) in [("resizebox", 3, 2), ("scalebox", 2, 1)] {
        loop {
            let matches = find_commands(&current, name, argc);
            if !matches.iter().any(|m| m.closing_verified) {
                break;
            }
            current = splice(&current, &matches, |m| {
                m.closing_verified
                    .then(|| unwrap_inline_math(&m.args[content_arg]))
            });
        }
    }
    current
}

/// If the whole content is one `$…$` formula, strip the delimiters
fn unwrap_inline_math(content: &str) -> String {
    let t = content.trim();
    if t.len() >= 2 && t.starts_with('$') && t.ends_with('$') && !t.ends_with("\\$") {
        let inner = &t[1..t.len() - 1];
        if !inner.contains('$') {
            return inner.trim().to_string();
        }
    }
    t.to_string()
}

// ============================================================================
// Pass 3: figures
// ============================================================================

/// Figure environments reduce to an optional `[Figure: label]` marker line
/// and an optional bracketed caption line. Display placeholders found in
/// the discarded body are salvaged onto their own lines; deleting them
/// would desynchronize the display pool for every later equation.
fn rewrite_figures(text: &str, warnings: &mut Vec<ConversionWarning>) -> String {
    let matches = find_environments(text, FIGURE_ENVS);
    splice(text, &matches, |m| {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                format!("environment '{}' opened but never closed", m.name),
                "left in place",
            ));
            return None;
        }
        let body = m.body(text);
        let caption = first_command_arg(body, "caption");
        let label = first_command_arg(body, "label");

        let scrub = remove_commands(body, "caption", 1);
        let scrub = remove_commands(&scrub, "label", 1);

        let mut lines = Vec::new();
        if let Some(l) = &label {
            lines.push(format!("[Figure: {}]", l.trim()));
        }
        if let Some(c) = &caption {
            lines.push(format!("[{}]", c.trim()));
        }
        for ph in DISPLAY_RE.find_iter(&scrub) {
            lines.push(ph.as_str().to_string());
        }
        if lines.is_empty() {
            Some(String::new())
        } else {
            Some(format!("\n{}\n", lines.join("\n")))
        }
    })
}

/// First verified occurrence of `\name{arg}` in `text`, returning the arg
fn first_command_arg(text: &str, name: &str) -> Option<String> {
    find_commands(text, name, 1)
        .into_iter()
        .find(|m| m.closing_verified)
        .map(|mut m| m.args.remove(0))
}

/// Delete all verified `\name{…}` spans
fn remove_commands(text: &str, name: &str, argc: usize) -> String {
    let matches = find_commands(text, name, argc);
    splice(text, &matches, |m| m.closing_verified.then(String::new))
}

// ============================================================================
// Pass 4: tables
// ============================================================================

/// Table environments reduce to caption/label marker lines plus a raw
/// table region deferred to the cell tokenizer. Bare tabular environments
/// outside a table wrapper get a region of their own.
fn rewrite_tables(text: &str, warnings: &mut Vec<ConversionWarning>) -> String {
    let matches = find_environments(text, TABLE_ENVS);
    let pass1 = splice(text, &matches, |m| {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                format!("environment '{}' opened but never closed", m.name),
                "left in place",
            ));
            return None;
        }
        Some(table_replacement(m.body(text), warnings))
    });

    let matches = find_environments(&pass1, TABULAR_ENVS);
    splice(&pass1, &matches, |m| {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                format!("environment '{}' opened but never closed", m.name),
                "left in place",
            ));
            return None;
        }
        let interior = tabular_interior(m.body(&pass1));
        Some(format!(
            "\n{}\n{}\n{}\n",
            TABLE_MARK,
            interior.trim(),
            TABLE_END_MARK
        ))
    })
}

fn table_replacement(body: &str, warnings: &mut Vec<ConversionWarning>) -> String {
    let caption = first_command_arg(body, "caption");
    let label = first_command_arg(body, "label");

    let mut lines = Vec::new();
    if let Some(l) = &label {
        lines.push(format!("[Table: {}]", l.trim()));
    }
    if let Some(c) = &caption {
        lines.push(format!("[{}]", c.trim()));
    }

    let tabs = find_environments(body, TABULAR_ENVS);
    if let Some(t) = tabs.iter().find(|t| t.closing_verified) {
        let interior = tabular_interior(t.body(body));
        lines.push(TABLE_MARK.to_string());
        lines.push(interior.trim().to_string());
        lines.push(TABLE_END_MARK.to_string());
    } else if tabs.iter().any(|t| !t.closing_verified) {
        warnings.push(ConversionWarning::with_suggestion(
            "tabular grid opened but never closed inside table environment".to_string(),
            "caption and label kept, grid dropped",
        ));
    }

    if lines.is_empty() {
        String::new()
    } else {
        format!("\n{}\n", lines.join("\n"))
    }
}

/// Skip the optional `[pos]` and required `{colspec}` arguments after
/// `\begin{tabular}`, returning the grid body
fn tabular_interior(body: &str) -> &str {
    let bytes = body.as_bytes();
    let mut i = skip_whitespace(body, 0);
    if bytes.get(i) == Some(&b'[') {
        if let Some(e) = match_brace(body, i) {
            i = skip_whitespace(body, e);
        }
    }
    if bytes.get(i) == Some(&b'{') {
        if let Some(e) = match_brace(body, i) {
            i = e;
        }
    }
    &body[i..]
}

// ============================================================================
// Pass 5: lists
// ============================================================================

/// List environments split on `\item` into one marked line per item,
/// innermost lists first.
fn rewrite_lists(text: &str, warnings: &mut Vec<ConversionWarning>) -> String {
    let list_names: Vec<&str> = BULLET_LIST_ENVS
        .iter()
        .chain(NUMBER_LIST_ENVS.iter())
        .copied()
        .collect();

    let mut current = text.to_string();
    while let Some(m) = innermost_list(&current, &list_names) {
        let prefix = if BULLET_LIST_ENVS.contains(&m.name.as_str()) {
            ITEM_BULLET_MARK
        } else {
            ITEM_NUMBER_MARK
        };
        let replacement = list_replacement(m.body(&current), prefix);
        current = format!("{}{}{}", &current[..m.start], replacement, &current[m.end..]);
    }
    for m in find_environments(&current, &list_names) {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                format!("environment '{}' opened but never closed", m.name),
                "left in place",
            ));
        }
    }
    current
}

/// First verified list environment, descending into its body until a list
/// without nested lists is found. Offsets are absolute in `text`.
fn innermost_list(text: &str, names: &[&str]) -> Option<ConstructMatch> {
    let matches = find_environments(text, names);
    let m = matches.into_iter().find(|m| m.closing_verified)?;
    match innermost_list(m.body(text), names) {
        Some(inner) => Some(ConstructMatch {
            start: m.body_start + inner.start,
            end: m.body_start + inner.end,
            body_start: m.body_start + inner.body_start,
            body_end: m.body_start + inner.body_end,
            ..inner
        }),
        None => Some(m),
    }
}

fn list_replacement(body: &str, prefix: &str) -> String {
    let mut lines = Vec::new();
    for item in split_items(body) {
        // Marker lines inside the item (already-rewritten nested lists,
        // display placeholders on their own lines) keep their own line;
        // everything else joins into the item's text.
        let mut own_text: Vec<&str> = Vec::new();
        let mut nested: Vec<String> = Vec::new();
        for part in item.lines() {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let is_marker_line = part.starts_with(ITEM_BULLET_MARK)
                || part.starts_with(ITEM_NUMBER_MARK)
                || DISPLAY_RE.find(part).is_some_and(|f| f.as_str() == part);
            if is_marker_line {
                nested.push(part.to_string());
            } else {
                own_text.push(part);
            }
        }
        let text = own_text.join(" ");
        if !text.is_empty() {
            lines.push(format!("{}{}", prefix, text));
        }
        lines.extend(nested);
    }
    format!("\n{}\n", lines.join("\n"))
}

fn split_items(body: &str) -> Vec<String> {
    let matches = find_commands(body, "item", 0);
    let mut items = Vec::new();
    for (i, m) in matches.iter().enumerate() {
        let mut s = skip_whitespace(body, m.end);
        // optional [label] argument
        if body.as_bytes().get(s) == Some(&b'[') {
            if let Some(e) = match_brace(body, s) {
                s = e;
            }
        }
        let seg_end = matches.get(i + 1).map(|n| n.start).unwrap_or(body.len());
        items.push(body[s.min(seg_end)..seg_end].to_string());
    }
    items
}

// ============================================================================
// Headings
// ============================================================================

/// Sectioning commands become heading marker lines
fn rewrite_headings(text: &str) -> String {
    let mut current = text.to_string();
    for (name, level) in SECTIONING_COMMANDS {
        for variant in [name.to_string(), format!("{}*", name)] {
            let matches = find_commands(&current, &variant, 1);
            current = splice(&current, &matches, |m| {
                m.closing_verified
                    .then(|| format!("\n{}\n", heading_marker(*level, m.args[0].trim())))
            });
        }
    }
    current
}

// ============================================================================
// Pass 6: labels, references, citations
// ============================================================================

fn rewrite_references(text: &str) -> String {
    let text = LABEL_RE.replace_all(text, "");
    let text = REF_RE.replace_all(&text, "[$1]");
    let text = CITE_RE.replace_all(&text, |caps: &regex::Captures| {
        let keys: Vec<&str> = caps[1]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        format!("[{}]", keys.join(", "))
    });
    text.into_owned()
}

// ============================================================================
// Pass 7: inline formatting
// ============================================================================

fn rewrite_inline_formatting(text: &str) -> String {
    let text = wrap_command(text, "textsubscript", SUB_OPEN, SUB_CLOSE);
    let text = wrap_command(&text, "textsuperscript", SUP_OPEN, SUP_CLOSE);
    let text = collapse_emphasis(&text);
    replace_ties(&text)
}

/// Replace `\name{arg}` with `open ++ arg ++ close`, rescanning for nested
/// occurrences
fn wrap_command(text: &str, name: &str, open: &str, close: &str) -> String {
    let mut current = text.to_string();
    loop {
        let matches = find_commands(&current, name, 1);
        if !matches.iter().any(|m| m.closing_verified) {
            return current;
        }
        current = splice(&current, &matches, |m| {
            m.closing_verified
                .then(|| format!("{}{}{}", open, m.args[0], close))
        });
    }
}

/// Collapse formatting commands to their argument text, one innermost-safe
/// step at a time (the replacement is rescanned, so nesting in any order
/// is handled)
fn collapse_emphasis(text: &str) -> String {
    let mut current = text.to_string();
    while let Some((start, end, inner)) = next_emphasis(&current) {
        current = format!("{}{}{}", &current[..start], inner, &current[end..]);
    }
    current
}

fn next_emphasis(text: &str) -> Option<(usize, usize, String)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && !is_escaped(text, i) {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            let name = &text[i + 1..j];
            if EMPHASIS_COMMANDS.contains(name) {
                let k = skip_whitespace(text, j);
                if bytes.get(k) == Some(&b'{') {
                    if let Some(end) = match_brace(text, k) {
                        return Some((i, end, text[k + 1..end - 1].to_string()));
                    }
                }
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }
    None
}

/// Unescaped ties (`~`) become regular spaces
fn replace_ties(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        if ch == '~' && !is_escaped(text, idx) {
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}

// ============================================================================
// Pass 8: line breaks
// ============================================================================

/// Explicit line-break commands become line breaks, except inside table
/// regions, whose row separators are structurally meaningful to the
/// tokenizer.
fn rewrite_line_breaks(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    loop {
        match rest.find(TABLE_MARK) {
            None => {
                out.push_str(&LINEBREAK_RE.replace_all(rest, "\n"));
                return out;
            }
            Some(i) => {
                out.push_str(&LINEBREAK_RE.replace_all(&rest[..i], "\n"));
                let after = &rest[i..];
                match after.find(TABLE_END_MARK) {
                    Some(j) => {
                        let end = j + TABLE_END_MARK.len();
                        out.push_str(&after[..end]);
                        rest = &after[end..];
                    }
                    None => {
                        out.push_str(after);
                        return out;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Final cleanup
// ============================================================================

/// Trim line whitespace and collapse runs of blank lines to a single
/// paragraph separator
fn clean_lines(text: &str) -> String {
    let mut result = String::new();
    let mut blanks = 0;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blanks += 1;
            if blanks == 1 {
                result.push('\n');
            }
        } else {
            result.push_str(trimmed);
            result.push('\n');
            blanks = 0;
        }
    }
    result.trim_matches('\n').to_string()
}
