//! Equation extraction
//!
//! A specialization of the scanner restricted to math-bearing constructs.
//! Runs the priority-ordered extraction passes (wrapper-preserving
//! environments, plain display environments, `$$…$$`, `$…$`), replaces each
//! claimed span with a class-indexed placeholder, and finally renumbers the
//! placeholders per class in textual order so reinsertion can consume
//! records by sequential pop.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::scanner::{
    find_commands, find_display_math, find_environments, find_inline_math, splice,
};
use crate::data::constants::{
    display_placeholder, inline_placeholder, DISPLAY_MARK_PREFIX, MARK_CLOSE,
    PLAIN_DISPLAY_ENVS, WRAPPER_PRESERVING_ENVS,
};
use crate::utils::error::ConversionWarning;

/// Display vs. inline rendering class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathMode {
    Display,
    Inline,
}

/// One extracted equation. `source_order` is the index at which the
/// equation's placeholder appears scanning the rewritten text left to
/// right; it is the sole correlation key between extraction and
/// reinsertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationRecord {
    pub formula: String,
    pub mode: MathMode,
    pub label: Option<String>,
    pub source_order: usize,
}

/// Result of the extraction passes
#[derive(Debug, Default)]
pub struct ExtractedEquations {
    pub display: Vec<EquationRecord>,
    pub inline: Vec<EquationRecord>,
    pub warnings: Vec<ConversionWarning>,
}

impl ExtractedEquations {
    pub fn total(&self) -> usize {
        self.display.len() + self.inline.len()
    }
}

/// Run the full priority catalogue over the text. Returns the rewritten
/// text with placeholders substituted plus the extracted records.
pub fn extract_equations(text: &str) -> (String, ExtractedEquations) {
    let mut extracted = ExtractedEquations::default();

    let text = extract_env_pass(
        text,
        WRAPPER_PRESERVING_ENVS,
        true,
        &mut extracted.display,
        &mut extracted.warnings,
    );
    let text = extract_env_pass(
        &text,
        PLAIN_DISPLAY_ENVS,
        false,
        &mut extracted.display,
        &mut extracted.warnings,
    );
    let text = extract_display_dollar_pass(&text, &mut extracted.display, &mut extracted.warnings);
    let text = extract_inline_pass(&text, &mut extracted.inline, &mut extracted.warnings);

    let text = normalize_order(&text, &mut extracted.display, &mut extracted.inline);
    (text, extracted)
}

/// Delimiter-only extraction (`$$` then `$`), used by the markdown entry
/// point where environments do not exist.
pub fn extract_delimited_only(text: &str) -> (String, ExtractedEquations) {
    let mut extracted = ExtractedEquations::default();
    let text = extract_display_dollar_pass(text, &mut extracted.display, &mut extracted.warnings);
    let text = extract_inline_pass(&text, &mut extracted.inline, &mut extracted.warnings);
    let text = normalize_order(&text, &mut extracted.display, &mut extracted.inline);
    (text, extracted)
}

// ============================================================================
// Extraction passes
// ============================================================================

/// Remove `\label{…}` commands from a formula, concatenating multiple
/// labels with a separator (multi-label equations occur in multi-line
/// alignment blocks).
fn strip_labels(formula: &str) -> (String, Option<String>) {
    let matches = find_commands(formula, "label", 1);
    if matches.is_empty() {
        return (formula.to_string(), None);
    }
    let mut labels: Vec<String> = Vec::new();
    let stripped = splice(formula, &matches, |m| {
        if m.closing_verified {
            labels.push(m.args[0].trim().to_string());
            Some(String::new())
        } else {
            None
        }
    });
    let label = if labels.is_empty() {
        None
    } else {
        Some(labels.join(", "))
    };
    (stripped, label)
}

/// If `s` is exactly one display placeholder (modulo whitespace), return
/// its pool index. Happens when a wrapper-preserving environment was
/// already claimed inside a plain one (`equation` around `split`).
fn lone_display_placeholder(s: &str) -> Option<usize> {
    let s = s.trim();
    let rest = s.strip_prefix(DISPLAY_MARK_PREFIX)?;
    let rest = rest.strip_suffix(MARK_CLOSE)?;
    rest.parse().ok()
}

fn extract_env_pass(
    text: &str,
    names: &[&str],
    keep_wrapper: bool,
    records: &mut Vec<EquationRecord>,
    warnings: &mut Vec<ConversionWarning>,
) -> String {
    let matches = find_environments(text, names);
    splice(text, &matches, |m| {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                format!("environment '{}' opened but never closed", m.name),
                "left in place",
            ));
            return None;
        }
        let raw = if keep_wrapper {
            &text[m.start..m.end]
        } else {
            m.body(text)
        };
        let (formula, label) = strip_labels(raw);
        let formula = formula.trim().to_string();

        // A body that is just an already-claimed inner environment: unwrap
        // instead of recording a second equation, and carry the label over.
        if let Some(inner) = lone_display_placeholder(&formula) {
            if let (Some(label), Some(rec)) = (label, records.get_mut(inner)) {
                rec.label = match rec.label.take() {
                    Some(existing) => Some(format!("{}, {}", existing, label)),
                    None => Some(label),
                };
            }
            return Some(format!("\n{}\n", display_placeholder(inner)));
        }

        if formula.is_empty() {
            return Some(String::new());
        }
        let idx = records.len();
        records.push(EquationRecord {
            formula,
            mode: MathMode::Display,
            label,
            source_order: 0,
        });
        Some(format!("\n{}\n", display_placeholder(idx)))
    })
}

fn extract_display_dollar_pass(
    text: &str,
    records: &mut Vec<EquationRecord>,
    warnings: &mut Vec<ConversionWarning>,
) -> String {
    let matches = find_display_math(text);
    splice(text, &matches, |m| {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                "display math '$$' opened but never closed".to_string(),
                "left in place",
            ));
            return None;
        }
        let (formula, label) = strip_labels(m.body(text));
        let formula = formula.trim().to_string();
        if formula.is_empty() {
            return Some(String::new());
        }
        let idx = records.len();
        records.push(EquationRecord {
            formula,
            mode: MathMode::Display,
            label,
            source_order: 0,
        });
        Some(format!("\n{}\n", display_placeholder(idx)))
    })
}

fn extract_inline_pass(
    text: &str,
    records: &mut Vec<EquationRecord>,
    warnings: &mut Vec<ConversionWarning>,
) -> String {
    let matches = find_inline_math(text);
    splice(text, &matches, |m| {
        if !m.closing_verified {
            warnings.push(ConversionWarning::with_suggestion(
                "unpaired inline math delimiter '$'".to_string(),
                "left in place",
            ));
            return None;
        }
        let formula = m.body(text).trim().to_string();
        if formula.is_empty() {
            return Some(String::new());
        }
        let idx = records.len();
        records.push(EquationRecord {
            formula,
            mode: MathMode::Inline,
            label: None,
            source_order: 0,
        });
        Some(inline_placeholder(idx))
    })
}

// ============================================================================
// Order normalization
// ============================================================================

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new("\u{E000}MATH([DI]):([0-9]+)\u{E001}").unwrap();
}

/// Renumber placeholders per class in textual order and permute the record
/// vectors to match, so that `source_order` strictly increases with
/// placeholder position and sequential pop at reinsertion is correct.
/// Extraction runs in priority order, which is not document order across
/// classes of the same mode (`$$` before an `equation` environment is
/// claimed in a later pass but appears earlier).
fn normalize_order(
    text: &str,
    display: &mut Vec<EquationRecord>,
    inline: &mut Vec<EquationRecord>,
) -> String {
    let mut new_display: Vec<EquationRecord> = Vec::with_capacity(display.len());
    let mut new_inline: Vec<EquationRecord> = Vec::with_capacity(inline.len());
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut global = 0usize;

    for cap in PLACEHOLDER_RE.captures_iter(text) {
        let whole = cap.get(0).unwrap();
        let old: usize = cap[2].parse().unwrap();
        out.push_str(&text[last..whole.start()]);

        let replacement = if &cap[1] == "D" {
            match display.get(old) {
                Some(rec) => {
                    let mut rec = rec.clone();
                    rec.source_order = global;
                    new_display.push(rec);
                    display_placeholder(new_display.len() - 1)
                }
                None => whole.as_str().to_string(),
            }
        } else {
            match inline.get(old) {
                Some(rec) => {
                    let mut rec = rec.clone();
                    rec.source_order = global;
                    new_inline.push(rec);
                    inline_placeholder(new_inline.len() - 1)
                }
                None => whole.as_str().to_string(),
            }
        };
        out.push_str(&replacement);
        last = whole.end();
        global += 1;
    }
    out.push_str(&text[last..]);

    *display = new_display;
    *inline = new_inline;
    out
}
