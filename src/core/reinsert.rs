//! Placeholder reinsertion
//!
//! The second walk over the intermediate representation: matches each
//! placeholder token to its externally-rendered replacement by the same
//! left-to-right ordering used at extraction time, and emits the final
//! block stream. Two independent cursors consume the display and inline
//! pools; reinsertion never reorders content, and a missing rendering
//! resolves to a visible fallback rather than desynchronizing later
//! placeholders.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::blocks::{Block, ListKind, MathContent, ResolvedCell, Run, RunStyle};
use crate::core::table::tokenize_table;
use crate::data::constants::{
    HEADING_MARK_PREFIX, ITEM_BULLET_MARK, ITEM_NUMBER_MARK, MARK_CLOSE, TABLE_END_MARK,
    TABLE_MARK,
};
use crate::render::MathFragment;
use crate::utils::error::ConversionWarning;

lazy_static! {
    static ref DISPLAY_RE: Regex = Regex::new("\u{E000}MATHD:[0-9]+\u{E001}").unwrap();
    static ref INLINE_RE: Regex = Regex::new("\u{E000}MATHI:[0-9]+\u{E001}").unwrap();
    static ref STYLE_RE: Regex =
        Regex::new("\u{E000}(SUB|SUP)\u{E001}(.*?)\u{E000}/(?:SUB|SUP)\u{E001}").unwrap();
}

/// One pool entry: the record's formula (for fallbacks), its label, and
/// the rendered fragment when the renderer succeeded
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub formula: String,
    pub label: Option<String>,
    pub content: Option<MathFragment>,
}

/// The two independently-indexed rendering pools
#[derive(Debug, Clone, Default)]
pub struct RenderedPools {
    pub display: Vec<PoolEntry>,
    pub inline: Vec<PoolEntry>,
}

/// Walk the intermediate lines and emit the final block stream
pub fn emit_blocks(text: &str, pools: &RenderedPools) -> (Vec<Block>, Vec<ConversionWarning>) {
    let mut r = Reinserter {
        pools,
        display_cursor: 0,
        inline_cursor: 0,
        blocks: Vec::new(),
        para: Vec::new(),
        warnings: Vec::new(),
    };
    r.walk(text);

    if r.display_cursor < pools.display.len() {
        r.warnings.push(ConversionWarning::new(format!(
            "{} display equation(s) were extracted but never referenced",
            pools.display.len() - r.display_cursor
        )));
    }
    if r.inline_cursor < pools.inline.len() {
        r.warnings.push(ConversionWarning::new(format!(
            "{} inline equation(s) were extracted but never referenced",
            pools.inline.len() - r.inline_cursor
        )));
    }
    (r.blocks, r.warnings)
}

struct Reinserter<'a> {
    pools: &'a RenderedPools,
    display_cursor: usize,
    inline_cursor: usize,
    blocks: Vec<Block>,
    para: Vec<Run>,
    warnings: Vec<ConversionWarning>,
}

impl Reinserter<'_> {
    fn walk(&mut self, text: &str) {
        let lines: Vec<&str> = text.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();

            if line.is_empty() {
                self.flush();
                i += 1;
                continue;
            }

            if line == TABLE_MARK {
                self.flush();
                let mut region = Vec::new();
                i += 1;
                while i < lines.len() && lines[i].trim() != TABLE_END_MARK {
                    region.push(lines[i]);
                    i += 1;
                }
                i = (i + 1).min(lines.len());
                self.emit_table(&region.join("\n"));
                continue;
            }

            if let Some(rest) = line.strip_prefix(HEADING_MARK_PREFIX) {
                self.flush();
                if let Some(close) = rest.find(MARK_CLOSE) {
                    let level: u8 = rest[..close].parse().unwrap_or(1);
                    let title = self.resolve_flat_text(&rest[close + MARK_CLOSE.len_utf8()..]);
                    self.blocks.push(Block::Heading { level, text: title });
                }
                i += 1;
                continue;
            }

            if let Some(rest) = line.strip_prefix(ITEM_BULLET_MARK) {
                self.flush();
                let runs = self.resolve_runs(rest);
                self.blocks.push(Block::ListItem {
                    kind: ListKind::Bullet,
                    runs,
                });
                i += 1;
                continue;
            }

            if let Some(rest) = line.strip_prefix(ITEM_NUMBER_MARK) {
                self.flush();
                let runs = self.resolve_runs(rest);
                self.blocks.push(Block::ListItem {
                    kind: ListKind::Numbered,
                    runs,
                });
                i += 1;
                continue;
            }

            if DISPLAY_RE.is_match(line) {
                self.flush();
                self.emit_display_line(line);
                i += 1;
                continue;
            }

            // Plain paragraph line; consecutive lines accumulate into one
            // paragraph until a blank line or block-level marker flushes it
            let runs = self.resolve_runs(line);
            if !self.para.is_empty() {
                self.para.push(Run::plain(" "));
            }
            self.para.extend(runs);
            i += 1;
        }
        self.flush();
    }

    fn flush(&mut self) {
        if !self.para.is_empty() {
            let runs = std::mem::take(&mut self.para);
            self.blocks.push(Block::Paragraph { runs });
        }
    }

    /// Emit a line containing one or more display placeholders. Each
    /// placeholder becomes a standalone equation block, followed by a
    /// bracketed label line when a label was recorded; interleaved text
    /// becomes its own paragraphs.
    fn emit_display_line(&mut self, line: &str) {
        let mut last = 0;
        for m in DISPLAY_RE.find_iter(line) {
            let before = line[last..m.start()].trim().to_string();
            if !before.is_empty() {
                let runs = self.resolve_runs(&before);
                self.blocks.push(Block::Paragraph { runs });
            }
            let (content, label) = self.next_display();
            self.blocks.push(Block::Equation {
                content,
                label: label.clone(),
            });
            if let Some(l) = label {
                self.blocks.push(Block::plain_paragraph(format!("[{}]", l)));
            }
            last = m.end();
        }
        let after = line[last..].trim().to_string();
        if !after.is_empty() {
            let runs = self.resolve_runs(&after);
            self.blocks.push(Block::Paragraph { runs });
        }
    }

    fn emit_table(&mut self, interior: &str) {
        let grid = tokenize_table(interior);
        if grid.is_empty() {
            return;
        }
        let columns = grid.column_count();
        let mut rows = Vec::with_capacity(grid.rows.len());
        for row in &grid.rows {
            let mut cells = Vec::with_capacity(row.len());
            for cell in row {
                cells.push(ResolvedCell {
                    runs: self.resolve_runs(&cell.text),
                    colspan: cell.colspan,
                });
            }
            rows.push(cells);
        }
        self.blocks.push(Block::Table { rows, columns });
    }

    /// Consume the next display record, by cursor position
    fn next_display(&mut self) -> (MathContent, Option<String>) {
        let entry = self.pools.display.get(self.display_cursor);
        self.display_cursor += 1;
        match entry {
            Some(entry) => {
                let content = match &entry.content {
                    Some(f) => MathContent::Rendered(f.clone()),
                    None => MathContent::Fallback(entry.formula.clone()),
                };
                (content, entry.label.clone())
            }
            None => {
                self.warnings.push(ConversionWarning::new(
                    "display equation pool exhausted; substituting fallback",
                ));
                (MathContent::Fallback("unresolved".to_string()), None)
            }
        }
    }

    /// Consume the next inline record, by cursor position
    fn next_inline(&mut self) -> MathContent {
        let entry = self.pools.inline.get(self.inline_cursor);
        self.inline_cursor += 1;
        match entry {
            Some(entry) => match &entry.content {
                Some(f) => MathContent::Rendered(f.clone()),
                None => MathContent::Fallback(entry.formula.clone()),
            },
            None => {
                self.warnings.push(ConversionWarning::new(
                    "inline equation pool exhausted; substituting fallback",
                ));
                MathContent::Fallback("unresolved".to_string())
            }
        }
    }

    /// Split a line into alternating text/placeholder segments, replacing
    /// each placeholder with the next inline record in pool order
    fn resolve_runs(&mut self, text: &str) -> Vec<Run> {
        let mut runs = Vec::new();
        let mut last = 0;
        for m in INLINE_RE.find_iter(text) {
            push_text_runs(&text[last..m.start()], &mut runs);
            runs.push(Run::Math(self.next_inline()));
            last = m.end();
        }
        push_text_runs(&text[last..], &mut runs);
        runs
    }

    /// Heading text is plain: inline placeholders still consume their pool
    /// entry (skipping would shift every later inline equation) but
    /// flatten to the formula text
    fn resolve_flat_text(&mut self, text: &str) -> String {
        let mut out = String::new();
        let mut last = 0;
        for m in INLINE_RE.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            if let Some(entry) = self.pools.inline.get(self.inline_cursor) {
                out.push_str(&entry.formula);
            }
            self.inline_cursor += 1;
            last = m.end();
        }
        out.push_str(&text[last..]);
        let out = STYLE_RE.replace_all(&out, "$2").into_owned();
        unescape_specials(&out)
    }
}

/// Split a text segment on subscript/superscript markers into styled runs
fn push_text_runs(text: &str, runs: &mut Vec<Run>) {
    let mut last = 0;
    for cap in STYLE_RE.captures_iter(text) {
        let whole = cap.get(0).unwrap();
        let before = &text[last..whole.start()];
        if !before.is_empty() {
            runs.push(Run::plain(unescape_specials(before)));
        }
        let style = if &cap[1] == "SUB" {
            RunStyle::Subscript
        } else {
            RunStyle::Superscript
        };
        let inner = &cap[2];
        if !inner.is_empty() {
            runs.push(Run::styled(unescape_specials(inner), style));
        }
        last = whole.end();
    }
    let tail = &text[last..];
    if !tail.is_empty() {
        runs.push(Run::plain(unescape_specials(tail)));
    }
}

/// Escaped special characters become their literal form in output text
fn unescape_specials(text: &str) -> String {
    text.replace("\\&", "&")
        .replace("\\%", "%")
        .replace("\\_", "_")
        .replace("\\#", "#")
        .replace("\\$", "$")
        .replace("\\{", "{")
        .replace("\\}", "}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::constants::{
        display_placeholder, inline_placeholder, ITEM_BULLET_MARK, SUB_CLOSE, SUB_OPEN,
    };
    use crate::render::MathFragment;

    fn fragment(text: &str) -> MathFragment {
        MathFragment::classify(format!(
            "<m:oMathPara><m:oMath><m:r><m:t>{}</m:t></m:r></m:oMath></m:oMathPara>",
            text
        ))
    }

    fn entry(formula: &str, rendered: bool) -> PoolEntry {
        PoolEntry {
            formula: formula.to_string(),
            label: None,
            content: rendered.then(|| fragment(formula)),
        }
    }

    #[test]
    fn test_display_with_label_emits_label_line() {
        let pools = RenderedPools {
            display: vec![PoolEntry {
                formula: "E=mc^2".into(),
                label: Some("eq:energy".into()),
                content: Some(fragment("E=mc^2")),
            }],
            inline: vec![],
        };
        let text = display_placeholder(0);
        let (blocks, warnings) = emit_blocks(&text, &pools);
        assert!(warnings.is_empty());
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], Block::Equation { label: Some(l), .. } if l == "eq:energy"));
        assert_eq!(blocks[1], Block::plain_paragraph("[eq:energy]"));
    }

    #[test]
    fn test_inline_placeholders_alternate_with_text() {
        let pools = RenderedPools {
            display: vec![],
            inline: vec![entry("a", true), entry("b", true)],
        };
        let text = format!(
            "before {} middle {} after",
            inline_placeholder(0),
            inline_placeholder(1)
        );
        let (blocks, _) = emit_blocks(&text, &pools);
        assert_eq!(blocks.len(), 1);
        let Block::Paragraph { runs } = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(runs.len(), 5);
        assert!(matches!(&runs[0], Run::Text { text, .. } if text == "before "));
        assert!(matches!(&runs[1], Run::Math(MathContent::Rendered(_))));
        assert!(matches!(&runs[2], Run::Text { text, .. } if text == " middle "));
        assert!(matches!(&runs[3], Run::Math(MathContent::Rendered(_))));
        assert!(matches!(&runs[4], Run::Text { text, .. } if text == " after"));
    }

    #[test]
    fn test_render_failure_becomes_fallback_without_shifting() {
        let pools = RenderedPools {
            display: vec![],
            inline: vec![entry("one", true), entry("two", false), entry("three", true)],
        };
        let text = format!(
            "{} x {} y {}",
            inline_placeholder(0),
            inline_placeholder(1),
            inline_placeholder(2)
        );
        let (blocks, _) = emit_blocks(&text, &pools);
        let Block::Paragraph { runs } = &blocks[0] else {
            panic!("expected paragraph");
        };
        let math: Vec<&MathContent> = runs
            .iter()
            .filter_map(|r| match r {
                Run::Math(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(math.len(), 3);
        assert!(matches!(math[0], MathContent::Rendered(_)));
        assert!(matches!(math[1], MathContent::Fallback(f) if f == "two"));
        assert!(matches!(math[2], MathContent::Rendered(_)));
    }

    #[test]
    fn test_pool_exhaustion_yields_fallback_and_warning() {
        let pools = RenderedPools::default();
        let text = format!("text {}", inline_placeholder(0));
        let (blocks, warnings) = emit_blocks(&text, &pools);
        let Block::Paragraph { runs } = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&runs[1], Run::Math(MathContent::Fallback(_))));
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_subscript_markers_become_styled_runs() {
        let pools = RenderedPools::default();
        let text = format!("H{}2{}O", SUB_OPEN, SUB_CLOSE);
        let (blocks, _) = emit_blocks(&text, &pools);
        let Block::Paragraph { runs } = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(runs.len(), 3);
        assert!(matches!(&runs[1], Run::Text { text, style: RunStyle::Subscript } if text == "2"));
    }

    #[test]
    fn test_consecutive_lines_accumulate_one_paragraph() {
        let pools = RenderedPools::default();
        let (blocks, _) = emit_blocks("line one\nline two\n\nline three", &pools);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_item_lines_become_list_items() {
        let pools = RenderedPools::default();
        let text = format!("{}first\n{}second", ITEM_BULLET_MARK, ITEM_BULLET_MARK);
        let (blocks, _) = emit_blocks(&text, &pools);
        assert_eq!(blocks.len(), 2);
        assert!(matches!(
            &blocks[0],
            Block::ListItem {
                kind: ListKind::Bullet,
                ..
            }
        ));
    }

    #[test]
    fn test_table_region_with_inline_math_in_cells() {
        let pools = RenderedPools {
            display: vec![],
            inline: vec![entry("x", true)],
        };
        let text = format!(
            "{}\na & {} \\\\\nc & d\n{}",
            TABLE_MARK,
            inline_placeholder(0),
            TABLE_END_MARK
        );
        let (blocks, _) = emit_blocks(&text, &pools);
        assert_eq!(blocks.len(), 1);
        let Block::Table { rows, columns } = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(*columns, 2);
        assert!(matches!(&rows[0][1].runs[0], Run::Math(_)));
    }

    #[test]
    fn test_heading_with_inline_math_consumes_pool_entry() {
        let pools = RenderedPools {
            display: vec![],
            inline: vec![entry("x^2", true), entry("y", true)],
        };
        let text = format!(
            "{}1{}About {}\nuses {}",
            HEADING_MARK_PREFIX,
            MARK_CLOSE,
            inline_placeholder(0),
            inline_placeholder(1)
        );
        let (blocks, warnings) = emit_blocks(&text, &pools);
        assert!(warnings.is_empty());
        assert!(matches!(&blocks[0], Block::Heading { text, .. } if text == "About x^2"));
        // Second entry still lands on the second placeholder
        let Block::Paragraph { runs } = &blocks[1] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&runs[1], Run::Math(MathContent::Rendered(f)) if f.omml.contains(">y<")));
    }
}
