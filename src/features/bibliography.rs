//! BibTeX file parser and reference formatter
//!
//! Parses BibTeX (.bib) files and converts them to a bibliography block
//! stream: a heading followed by one paragraph per entry, the citation key
//! in bold, the reference formatted per entry type (article,
//! inproceedings, book, or generic). Entries keep their file order.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::core::blocks::{Block, Run, RunStyle};
use crate::core::braces::match_brace;

lazy_static! {
    // LaTeX accents in field values: {\"o}, \'e, \~n and friends
    static ref ACCENT_RE: Regex = Regex::new(r#"\{?\\(["'`^~])\{?([A-Za-z])\}?\}?"#).unwrap();
}

/// A single BibTeX entry
#[derive(Debug, Clone, Default)]
pub struct BibEntry {
    /// Entry type (article, book, inproceedings, etc.), lowercased
    pub entry_type: String,
    /// Citation key
    pub key: String,
    /// Fields in file order
    pub fields: IndexMap<String, String>,
}

impl BibEntry {
    pub fn new(entry_type: &str, key: &str) -> Self {
        Self {
            entry_type: entry_type.to_lowercase(),
            key: key.to_string(),
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.as_str())
    }

    pub fn set(&mut self, field: &str, value: &str) {
        self.fields.insert(field.to_lowercase(), value.to_string());
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a complete BibTeX file, in file order. `@string`, `@preamble` and
/// `@comment` blocks are skipped.
pub fn parse_bibtex(input: &str) -> Vec<BibEntry> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let remaining = &input[pos..];
        let Some(at_rel) = remaining.find('@') else {
            break;
        };
        let entry_start = pos + at_rel;
        let entry_content = &input[entry_start..];

        let Some(brace_rel) = entry_content.find('{') else {
            pos = entry_start + 1;
            continue;
        };
        let entry_type = entry_content[1..brace_rel].trim().to_lowercase();

        let Some(end) = match_brace(entry_content, brace_rel) else {
            pos = entry_start + 1;
            continue;
        };

        match entry_type.as_str() {
            "string" | "preamble" | "comment" => {}
            _ => {
                if let Some(entry) = parse_single_entry(&entry_content[..end]) {
                    entries.push(entry);
                }
            }
        }
        pos = entry_start + end;
    }
    entries
}

/// Parse one `@type{key, field = value, …}` block
fn parse_single_entry(input: &str) -> Option<BibEntry> {
    let input = input.trim();
    let at_pos = input.find('@')?;
    let after_at = &input[at_pos + 1..];

    let brace_pos = after_at.find('{')?;
    let entry_type = after_at[..brace_pos].trim();

    let after_brace = &after_at[brace_pos + 1..];
    let comma_pos = after_brace.find(',')?;
    let key = after_brace[..comma_pos].trim();
    if key.is_empty() {
        return None;
    }

    let mut entry = BibEntry::new(entry_type, key);
    parse_fields(&after_brace[comma_pos + 1..], &mut entry);

    let cleaned: IndexMap<String, String> = entry
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), clean_latex_value(v)))
        .collect();
    entry.fields = cleaned;
    Some(entry)
}

/// Parse `name = value` pairs from an entry body
fn parse_fields(content: &str, entry: &mut BibEntry) {
    let chars: Vec<char> = content.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos >= chars.len() || chars[pos] == '}' {
            break;
        }

        let name_start = pos;
        while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
            pos += 1;
        }
        let field_name: String = chars[name_start..pos].iter().collect();
        if field_name.is_empty() {
            pos += 1;
            continue;
        }

        while pos < chars.len() && (chars[pos].is_whitespace() || chars[pos] == '=') {
            pos += 1;
        }

        if pos < chars.len() {
            let (value, consumed) = parse_field_value(&chars[pos..]);
            entry.set(&field_name, value.trim());
            pos += consumed.max(1);
            while pos < chars.len() && (chars[pos].is_whitespace() || chars[pos] == ',') {
                pos += 1;
            }
        }
    }
}

/// Parse one field value: braced, quoted, or bare, with `#` concatenation
fn parse_field_value(chars: &[char]) -> (String, usize) {
    let mut value = String::new();
    let mut pos = 0;

    loop {
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }

        match chars[pos] {
            '{' => {
                let (braced, end) = extract_delimited(&chars[pos..], '{', '}');
                value.push_str(&braced);
                pos += end;
            }
            '"' => {
                let (quoted, end) = extract_delimited(&chars[pos..], '"', '"');
                value.push_str(&quoted);
                pos += end;
            }
            c if c.is_alphanumeric() => {
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    value.push(chars[pos]);
                    pos += 1;
                }
            }
            ',' | '}' => break,
            _ => pos += 1,
        }

        // concatenation with #
        let mut look = pos;
        while look < chars.len() && chars[look].is_whitespace() {
            look += 1;
        }
        if chars.get(look) == Some(&'#') {
            pos = look + 1;
        } else {
            break;
        }
    }

    (value, pos)
}

/// Extract the inner content of a delimited value starting at index 0
fn extract_delimited(chars: &[char], open: char, close: char) -> (String, usize) {
    let mut inner = String::new();
    let mut depth = 0;
    for (i, &c) in chars.iter().enumerate() {
        if c == open && (open != close || depth == 0) {
            depth += 1;
            if i > 0 {
                inner.push(c);
            }
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return (inner, i + 1);
            }
            inner.push(c);
        } else {
            inner.push(c);
        }
    }
    (inner, chars.len())
}

/// Strip capitalization braces and decode common LaTeX accents
fn clean_latex_value(value: &str) -> String {
    let value = ACCENT_RE.replace_all(value, |caps: &regex::Captures| {
        decode_accent(
            caps[1].chars().next().unwrap(),
            caps[2].chars().next().unwrap(),
        )
        .map(String::from)
        .unwrap_or_else(|| caps[2].to_string())
    });
    value
        .replace(['{', '}'], "")
        .replace("\\&", "&")
        .replace("--", "–")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_accent(accent: char, letter: char) -> Option<char> {
    let decoded = match (accent, letter) {
        ('"', 'a') => 'ä',
        ('"', 'e') => 'ë',
        ('"', 'i') => 'ï',
        ('"', 'o') => 'ö',
        ('"', 'u') => 'ü',
        ('"', 'A') => 'Ä',
        ('"', 'O') => 'Ö',
        ('"', 'U') => 'Ü',
        ('\'', 'a') => 'á',
        ('\'', 'e') => 'é',
        ('\'', 'i') => 'í',
        ('\'', 'o') => 'ó',
        ('\'', 'u') => 'ú',
        ('\'', 'E') => 'É',
        ('`', 'a') => 'à',
        ('`', 'e') => 'è',
        ('`', 'o') => 'ò',
        ('`', 'u') => 'ù',
        ('^', 'a') => 'â',
        ('^', 'e') => 'ê',
        ('^', 'i') => 'î',
        ('^', 'o') => 'ô',
        ('^', 'u') => 'û',
        ('~', 'n') => 'ñ',
        ('~', 'N') => 'Ñ',
        ('~', 'a') => 'ã',
        ('~', 'o') => 'õ',
        _ => return None,
    };
    Some(decoded)
}

// ============================================================================
// Reference formatting
// ============================================================================

/// Join a BibTeX author list (`A and B and C`) for display
pub fn format_author_list(authors: &str) -> String {
    let list: Vec<&str> = authors.split(" and ").map(str::trim).collect();
    match list.len() {
        0 => String::new(),
        1 => list[0].to_string(),
        2 => format!("{} and {}", list[0], list[1]),
        _ => format!(
            "{}, and {}",
            list[..list.len() - 1].join(", "),
            list[list.len() - 1]
        ),
    }
}

/// Format a reference per its entry type
pub fn format_reference(entry: &BibEntry) -> String {
    match entry.entry_type.as_str() {
        "article" => format_article(entry),
        "inproceedings" | "conference" => format_inproceedings(entry),
        "book" => format_book(entry),
        _ => format_generic(entry),
    }
}

fn format_article(entry: &BibEntry) -> String {
    let mut parts = Vec::new();
    if let Some(author) = entry.get("author") {
        parts.push(format_author_list(author));
    }
    if let Some(title) = entry.get("title") {
        parts.push(format!("\"{}\"", title));
    }
    if let Some(journal) = entry.get("journal") {
        parts.push(journal.to_string());
    }
    let mut vol_num = Vec::new();
    if let Some(volume) = entry.get("volume") {
        vol_num.push(format!("vol. {}", volume));
    }
    if let Some(number) = entry.get("number") {
        vol_num.push(format!("no. {}", number));
    }
    if !vol_num.is_empty() {
        parts.push(vol_num.join(", "));
    }
    if let Some(pages) = entry.get("pages") {
        parts.push(format!("pp. {}", pages));
    }
    let mut when = Vec::new();
    if let Some(month) = entry.get("month") {
        when.push(month.to_string());
    }
    if let Some(year) = entry.get("year") {
        when.push(year.to_string());
    }
    if !when.is_empty() {
        parts.push(when.join(" "));
    }
    if let Some(doi) = entry.get("doi") {
        parts.push(format!("doi: {}", doi));
    }
    finish(parts)
}

fn format_inproceedings(entry: &BibEntry) -> String {
    let mut parts = Vec::new();
    if let Some(author) = entry.get("author") {
        parts.push(format_author_list(author));
    }
    if let Some(title) = entry.get("title") {
        parts.push(format!("\"{}\"", title));
    }
    if let Some(booktitle) = entry.get("booktitle") {
        parts.push(format!("in {}", booktitle));
    }
    if let Some(year) = entry.get("year") {
        parts.push(year.to_string());
    }
    if let Some(pages) = entry.get("pages") {
        parts.push(format!("p. {}", pages));
    }
    if let Some(doi) = entry.get("doi") {
        parts.push(format!("doi: {}", doi));
    }
    finish(parts)
}

fn format_book(entry: &BibEntry) -> String {
    let mut parts = Vec::new();
    if let Some(author) = entry.get("author") {
        parts.push(format_author_list(author));
    } else if let Some(editor) = entry.get("editor") {
        parts.push(format!("{} (Ed.)", format_author_list(editor)));
    }
    if let Some(title) = entry.get("title") {
        parts.push(title.to_string());
    }
    if let Some(publisher) = entry.get("publisher") {
        parts.push(publisher.to_string());
    }
    if let Some(year) = entry.get("year") {
        parts.push(year.to_string());
    }
    if let Some(edition) = entry.get("edition") {
        parts.push(format!("{} ed.", edition));
    }
    finish(parts)
}

fn format_generic(entry: &BibEntry) -> String {
    let mut parts = Vec::new();
    if let Some(author) = entry.get("author") {
        parts.push(format_author_list(author));
    }
    if let Some(title) = entry.get("title") {
        parts.push(format!("\"{}\"", title));
    }
    if let Some(year) = entry.get("year") {
        parts.push(year.to_string());
    }
    finish(parts)
}

fn finish(parts: Vec<String>) -> String {
    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        joined
    } else {
        format!("{}.", joined)
    }
}

// ============================================================================
// Block stream
// ============================================================================

/// Convert a BibTeX source to the bibliography block stream
pub fn bibliography_to_blocks(input: &str) -> Vec<Block> {
    let entries = parse_bibtex(input);
    let mut blocks = Vec::with_capacity(entries.len() + 1);
    blocks.push(Block::Heading {
        level: 1,
        text: "Bibliography".to_string(),
    });
    for entry in &entries {
        blocks.push(Block::Paragraph {
            runs: vec![
                Run::styled(format!("[{}] ", entry.key), RunStyle::Bold),
                Run::plain(format_reference(entry)),
            ],
        });
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
@article{einstein1905,
  author = {Albert Einstein},
  title = {On the Electrodynamics of Moving Bodies},
  journal = {Annalen der Physik},
  volume = {17},
  pages = {891--921},
  year = {1905}
}

@inproceedings{turing1936,
  author = {Alan Turing and Alonzo Church},
  title = {On Computable Numbers},
  booktitle = {Proc. London Math. Soc.},
  year = {1936}
}
"#;

    #[test]
    fn test_parse_preserves_file_order() {
        let entries = parse_bibtex(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "einstein1905");
        assert_eq!(entries[1].key, "turing1936");
        assert_eq!(entries[0].entry_type, "article");
    }

    #[test]
    fn test_field_values_cleaned() {
        let entries = parse_bibtex(r#"@book{k, title = {The {TeX}book}, year = 1984}"#);
        assert_eq!(entries[0].get("title"), Some("The TeXbook"));
        assert_eq!(entries[0].get("year"), Some("1984"));
    }

    #[test]
    fn test_quoted_values_and_concatenation() {
        let entries =
            parse_bibtex(r#"@misc{x, note = "part one" # " and two", year = {2001}}"#);
        assert_eq!(entries[0].get("note"), Some("part one and two"));
    }

    #[test]
    fn test_accent_decoding() {
        let entries = parse_bibtex(r#"@misc{x, author = {Kurt G{\"o}del}}"#);
        assert_eq!(entries[0].get("author"), Some("Kurt Gödel"));
    }

    #[test]
    fn test_string_blocks_skipped() {
        let input = r#"@string{ap = {Annalen der Physik}}
@misc{only, title = {Real entry}}"#;
        let entries = parse_bibtex(input);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "only");
    }

    #[test]
    fn test_author_list_joining() {
        assert_eq!(format_author_list("A. Smith"), "A. Smith");
        assert_eq!(format_author_list("A. Smith and J. Doe"), "A. Smith and J. Doe");
        assert_eq!(
            format_author_list("A and B and C"),
            "A, B, and C"
        );
    }

    #[test]
    fn test_article_formatting() {
        let entries = parse_bibtex(SAMPLE);
        let formatted = format_reference(&entries[0]);
        assert!(formatted.starts_with("Albert Einstein"));
        assert!(formatted.contains("\"On the Electrodynamics of Moving Bodies\""));
        assert!(formatted.contains("vol. 17"));
        assert!(formatted.contains("pp. 891–921"));
        assert!(formatted.ends_with("1905."));
    }

    #[test]
    fn test_inproceedings_formatting() {
        let entries = parse_bibtex(SAMPLE);
        let formatted = format_reference(&entries[1]);
        assert!(formatted.contains("Alan Turing and Alonzo Church"));
        assert!(formatted.contains("in Proc. London Math. Soc."));
    }

    #[test]
    fn test_blocks_have_bold_keys() {
        let blocks = bibliography_to_blocks(SAMPLE);
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::Heading { level: 1, .. }));
        let Block::Paragraph { runs } = &blocks[1] else {
            panic!("expected paragraph");
        };
        assert!(
            matches!(&runs[0], Run::Text { text, style: RunStyle::Bold } if text == "[einstein1905] ")
        );
    }
}
