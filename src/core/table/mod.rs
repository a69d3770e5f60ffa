//! Table cell tokenizer
//!
//! Parses the raw interior of a table region into a grid of cells with
//! column spans. Row separators are depth-0 `\\` sequences; column
//! separators are depth-0 `&`. Separators inside brace groups are not
//! structural. Irregular grids are legal: the grid's column count is the
//! maximum per-row colspan sum, and shorter rows leave trailing columns
//! empty at build time.

pub mod cell;

#[cfg(test)]
mod tests;

pub use cell::{parse_cell, TableCell};

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::braces::{is_escaped, match_brace};
use crate::core::scanner::find_commands;
use crate::data::constants::TABLE_RULE_COMMANDS;

lazy_static! {
    // Booktabs trim specs: \cmidrule(lr){2-3} -> \cmidrule{2-3}
    static ref RULE_TRIM_RE: Regex = Regex::new(r"\\(cmidrule|cline)\([^)]*\)").unwrap();
}

/// A tokenized table grid
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableGrid {
    pub rows: Vec<Vec<TableCell>>,
}

impl TableGrid {
    /// Grid column count: the maximum per-row colspan sum
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.colspan).sum())
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Tokenize the raw interior of a tabular body
pub fn tokenize_table(interior: &str) -> TableGrid {
    let mut grid = TableGrid::default();
    for raw_row in split_rows(interior) {
        let row_text = strip_rule_commands(&raw_row);
        if row_text.trim().is_empty() {
            continue;
        }
        let cells: Vec<TableCell> = split_cells(&row_text)
            .iter()
            .map(|c| parse_cell(c))
            .collect();
        if cells.iter().all(|c| c.text.is_empty()) && cells.len() <= 1 {
            continue;
        }
        grid.rows.push(cells);
    }
    grid
}

/// Split on row separators: a `\\` at brace depth 0 that is not part of a
/// longer backslash run (an escaped separator is not a row boundary). An
/// optional `[gap]` spacing argument after the separator is consumed.
fn split_rows(interior: &str) -> Vec<String> {
    let bytes = interior.as_bytes();
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'{' | b'}' if !is_escaped(interior, i) => {
                depth = if b == b'{' {
                    depth + 1
                } else {
                    depth.saturating_sub(1)
                };
                current.push(b as char);
                i += 1;
            }
            b'\\' if depth == 0 => {
                // A run of exactly two backslashes is a row separator;
                // any other run length is literal content (an escaped
                // separator must not be misread as a row boundary).
                let mut n = 1;
                while bytes.get(i + n) == Some(&b'\\') {
                    n += 1;
                }
                if n == 2 {
                    rows.push(std::mem::take(&mut current));
                    i += 2;
                    // optional [gap] argument
                    if bytes.get(i) == Some(&b'[') {
                        if let Some(e) = match_brace(interior, i) {
                            i = e;
                        }
                    }
                } else {
                    current.push_str(&interior[i..i + n]);
                    i += n;
                }
            }
            _ => {
                // Copy the full UTF-8 character, not just the lead byte
                let ch_len = utf8_len(b);
                current.push_str(&interior[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    if !current.trim().is_empty() {
        rows.push(current);
    }
    rows
}

fn utf8_len(lead: u8) -> usize {
    match lead {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

/// Split a row on unguarded `&` column separators (depth 0, not escaped)
fn split_cells(row: &str) -> Vec<String> {
    let bytes = row.as_bytes();
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'{' | b'}' if !is_escaped(row, i) => {
                depth = if b == b'{' {
                    depth + 1
                } else {
                    depth.saturating_sub(1)
                };
                current.push(b as char);
                i += 1;
            }
            b'&' if depth == 0 && !is_escaped(row, i) => {
                cells.push(std::mem::take(&mut current));
                i += 1;
            }
            _ => {
                let ch_len = utf8_len(b);
                current.push_str(&row[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    cells.push(current);
    cells
}

/// Remove horizontal-rule commands (`\hline`, booktabs rules, `\cmidrule`
/// with its argument) from a row's text
fn strip_rule_commands(row: &str) -> String {
    let mut current = RULE_TRIM_RE.replace_all(row, "\\$1").into_owned();
    for (name, argc) in TABLE_RULE_COMMANDS {
        loop {
            let matches = find_commands(&current, name, *argc);
            let Some(m) = matches.iter().find(|m| m.closing_verified) else {
                break;
            };
            current = format!("{}{}", &current[..m.start], &current[m.end..]);
        }
    }
    current
}
