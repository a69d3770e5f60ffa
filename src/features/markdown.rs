//! Markdown entry point
//!
//! Converts markdown documents with embedded LaTeX math (`$$…$$` and
//! `$…$`) to the block stream. Math extraction, the placeholder model and
//! reinsertion are shared with the LaTeX pipeline; only the line-level
//! structure (headings, list items) differs.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::equations::extract_delimited_only;
use crate::core::{reinsert, render_pools, ConversionOutput};
use crate::data::constants::{heading_marker, ITEM_BULLET_MARK, ITEM_NUMBER_MARK};
use crate::render::FormulaRenderer;

lazy_static! {
    static ref NUMBERED_RE: Regex = Regex::new(r"^\d+\.\s+(.*)$").unwrap();
}

/// Convert a markdown source to the block stream
pub fn convert_markdown(content: &str, renderer: &dyn FormulaRenderer) -> ConversionOutput {
    let (text, extracted) = extract_delimited_only(content);
    let text = rewrite_markdown_lines(&text);

    let mut warnings = extracted.warnings.clone();
    let pools = render_pools(&extracted, renderer);
    let (blocks, reinsert_warnings) = reinsert::emit_blocks(&text, &pools);
    warnings.extend(reinsert_warnings);

    ConversionOutput { blocks, warnings }
}

/// Convert markdown heading and list lines to the shared marker
/// representation; everything else passes through untouched
fn rewrite_markdown_lines(text: &str) -> String {
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let converted = if let Some(title) = trimmed.strip_prefix("#### ") {
            heading_marker(4, title.trim())
        } else if let Some(title) = trimmed.strip_prefix("### ") {
            heading_marker(3, title.trim())
        } else if let Some(title) = trimmed.strip_prefix("## ") {
            heading_marker(2, title.trim())
        } else if let Some(title) = trimmed.strip_prefix("# ") {
            heading_marker(1, title.trim())
        } else if let Some(item) = trimmed.strip_prefix("- ") {
            format!("{}{}", ITEM_BULLET_MARK, item.trim())
        } else if let Some(item) = trimmed.strip_prefix("* ") {
            format!("{}{}", ITEM_BULLET_MARK, item.trim())
        } else if let Some(caps) = NUMBERED_RE.captures(trimmed) {
            format!("{}{}", ITEM_NUMBER_MARK, caps[1].trim())
        } else {
            trimmed.to_string()
        };
        out.push(converted);
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blocks::{Block, ListKind, MathContent, Run};
    use crate::core::equations::MathMode;
    use crate::render::{FormulaRenderer, MathFragment};

    struct EchoRenderer;

    impl FormulaRenderer for EchoRenderer {
        fn render(&self, formula: &str, _mode: MathMode) -> Option<MathFragment> {
            Some(MathFragment::classify(format!(
                "<m:oMathPara><m:oMath><m:r><m:t>{}</m:t></m:r></m:oMath></m:oMathPara>",
                formula
            )))
        }
    }

    #[test]
    fn test_headings_and_lists() {
        let input = "# Title\n\nSome text.\n\n- first\n- second\n\n1. one\n2. two";
        let out = convert_markdown(input, &EchoRenderer);
        assert!(matches!(&out.blocks[0], Block::Heading { level: 1, text } if text == "Title"));
        let bullets = out
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::ListItem { kind: ListKind::Bullet, .. }))
            .count();
        let numbered = out
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::ListItem { kind: ListKind::Numbered, .. }))
            .count();
        assert_eq!(bullets, 2);
        assert_eq!(numbered, 2);
    }

    #[test]
    fn test_display_and_inline_math() {
        let input = "intro $a+b$ text\n\n$$x^2 + y^2 = z^2$$\n\nmore $c$ here";
        let out = convert_markdown(input, &EchoRenderer);
        let equations = out
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Equation { .. }))
            .count();
        assert_eq!(equations, 1);

        let inline_math: usize = out
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph { runs } => Some(
                    runs.iter()
                        .filter(|r| matches!(r, Run::Math(MathContent::Rendered(_))))
                        .count(),
                ),
                _ => None,
            })
            .sum();
        assert_eq!(inline_math, 2);
    }

    #[test]
    fn test_multiline_display_math() {
        let input = "$$\na = b\\\\\nc = d\n$$";
        let out = convert_markdown(input, &EchoRenderer);
        assert!(out
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Equation { .. })));
    }
}
