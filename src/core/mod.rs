//! Core conversion pipeline
//!
//! The extraction/placeholder/reinsertion pipeline: preprocess, extract
//! equations in document order, rewrite structure to the intermediate
//! representation, render each formula through the external adapter, and
//! splice the results back in place.
//!
//! # Module Structure
//!
//! - `braces`: the shared brace-matching primitive
//! - `scanner`: construct location over the fixed catalogue
//! - `preprocess`: comment stripping and preamble skipping
//! - `equations`: math extraction and placeholder substitution
//! - `rewrite`: structural rewriting to the line-oriented representation
//! - `table`: table cell tokenization
//! - `blocks`: the output block model
//! - `reinsert`: placeholder resolution into the final block stream

pub mod blocks;
pub mod braces;
pub mod equations;
pub mod preprocess;
pub mod reinsert;
pub mod rewrite;
pub mod scanner;
pub mod table;

use crate::core::blocks::Block;
use crate::core::equations::{EquationRecord, ExtractedEquations, MathMode};
use crate::core::reinsert::{PoolEntry, RenderedPools};
use crate::render::FormulaRenderer;
use crate::utils::error::ConversionWarning;

/// Result of one conversion run: the ordered block stream plus any
/// non-fatal warnings collected along the way
#[derive(Debug, Clone, Default)]
pub struct ConversionOutput {
    pub blocks: Vec<Block>,
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionOutput {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Convert a LaTeX document source to the block stream
pub fn convert_latex(content: &str, renderer: &dyn FormulaRenderer) -> ConversionOutput {
    let text = preprocess::strip_comments(content);
    let text = preprocess::skip_preamble(&text);

    let (text, extracted) = equations::extract_equations(&text);
    log::debug!(
        "extracted {} display and {} inline equation(s)",
        extracted.display.len(),
        extracted.inline.len()
    );

    let (text, rewrite_warnings) = rewrite::rewrite_structure(&text);

    let mut warnings = extracted.warnings.clone();
    warnings.extend(rewrite_warnings);

    let pools = render_pools(&extracted, renderer);
    let (blocks, reinsert_warnings) = reinsert::emit_blocks(&text, &pools);
    warnings.extend(reinsert_warnings);

    ConversionOutput { blocks, warnings }
}

/// Invoke the renderer once per extracted formula, sequentially in
/// `source_order`, and collect the results into the two class pools. A
/// failed rendering keeps its pool slot (with no content) so reinsertion
/// stays aligned.
pub fn render_pools(
    extracted: &ExtractedEquations,
    renderer: &dyn FormulaRenderer,
) -> RenderedPools {
    let mut pools = RenderedPools {
        display: extracted.display.iter().map(empty_entry).collect(),
        inline: extracted.inline.iter().map(empty_entry).collect(),
    };

    let mut order: Vec<(usize, MathMode, usize)> = extracted
        .display
        .iter()
        .enumerate()
        .map(|(i, r)| (r.source_order, MathMode::Display, i))
        .chain(
            extracted
                .inline
                .iter()
                .enumerate()
                .map(|(i, r)| (r.source_order, MathMode::Inline, i)),
        )
        .collect();
    order.sort_by_key(|(so, _, _)| *so);

    for (_, mode, idx) in order {
        let (record, slot) = match mode {
            MathMode::Display => (&extracted.display[idx], &mut pools.display[idx]),
            MathMode::Inline => (&extracted.inline[idx], &mut pools.inline[idx]),
        };
        slot.content = renderer.render(&record.formula, mode);
        if slot.content.is_none() {
            log::warn!("formula left unconverted: {}", record.formula);
        }
    }
    pools
}

fn empty_entry(record: &EquationRecord) -> PoolEntry {
    PoolEntry {
        formula: record.formula.clone(),
        label: record.label.clone(),
        content: None,
    }
}
