//! # texword
//!
//! LaTeX / Markdown / BibTeX to Word (.docx) converter with OMML equation
//! support, written in Rust.
//!
//! ## Features
//!
//! - **Equation Pipeline**: brace-aware extraction of display and inline
//!   math, external rendering to OMML via `texmath`, position-exact
//!   reinsertion
//! - **Full Document**: headings, paragraphs, lists, tables with
//!   multicolumn cells, figure and table captions, cross-references
//! - **Resilient**: a failed formula rendering degrades to a visible
//!   fallback; malformed constructs are left in place with a warning
//! - **Three Entry Points**: `.tex`, `.md` and `.bib` inputs share the
//!   same block model and document builder
//!
//! ## Usage Examples
//!
//! ```no_run
//! use std::path::Path;
//! use texword::{convert_file, TexmathRenderer};
//!
//! let renderer = TexmathRenderer::new();
//! let (output, warnings) =
//!     convert_file(Path::new("paper.tex"), None, &renderer).unwrap();
//! println!("wrote {} ({} warnings)", output.display(), warnings.len());
//! ```
//!
//! Converting in-memory content to the block stream:
//!
//! ```
//! use texword::{convert_latex, FormulaRenderer, MathFragment};
//! use texword::core::equations::MathMode;
//!
//! struct NoRenderer;
//! impl FormulaRenderer for NoRenderer {
//!     fn render(&self, _: &str, _: MathMode) -> Option<MathFragment> {
//!         None
//!     }
//! }
//!
//! let out = convert_latex(r"\section{Intro} Pythagoras: $a^2+b^2=c^2$", &NoRenderer);
//! assert_eq!(out.blocks.len(), 2);
//! ```

/// Core conversion pipeline
pub mod core;

/// Data layer - static catalogues and markers
pub mod data;

/// OOXML document builder
pub mod docx;

/// Feature modules - additional conversion entry points
pub mod features;

/// External formula renderer adapter
pub mod render;

/// Utility modules
pub mod utils;

use std::path::{Path, PathBuf};

// Re-export the core pipeline
pub use crate::core::blocks::{Block, ListKind, MathContent, ResolvedCell, Run, RunStyle};
pub use crate::core::equations::{EquationRecord, MathMode};
pub use crate::core::{convert_latex, ConversionOutput};

// Re-export feature entry points
pub use crate::features::bibliography::{bibliography_to_blocks, parse_bibtex, BibEntry};
pub use crate::features::markdown::convert_markdown;

// Re-export the renderer adapter
pub use crate::render::{
    clean_delimiters, FormulaRenderer, FragmentForm, MathFragment, TexmathRenderer,
};

// Re-export utilities
pub use crate::utils::error::{ConversionError, ConversionResult, ConversionWarning};
pub use crate::utils::files::{derive_output_path, read_input, InputKind};

/// Convert an input file to a `.docx` document.
///
/// The entry point is selected by the input extension (`.tex`, `.md`,
/// `.bib`). Returns the output path and any non-fatal warnings; only
/// I/O-level failures abort the run.
pub fn convert_file(
    input: &Path,
    output: Option<&Path>,
    renderer: &dyn FormulaRenderer,
) -> ConversionResult<(PathBuf, Vec<ConversionWarning>)> {
    let (content, kind) = read_input(input)?;
    log::info!("converting {} ({:?})", input.display(), kind);

    let result = match kind {
        InputKind::Latex => convert_latex(&content, renderer),
        InputKind::Markdown => convert_markdown(&content, renderer),
        InputKind::Bibtex => ConversionOutput {
            blocks: bibliography_to_blocks(&content),
            warnings: Vec::new(),
        },
    };

    let out_path = derive_output_path(input, output);
    docx::save_docx(&result.blocks, &out_path)?;
    Ok((out_path, result.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoRenderer;

    impl FormulaRenderer for NoRenderer {
        fn render(&self, _formula: &str, _mode: MathMode) -> Option<MathFragment> {
            None
        }
    }

    #[test]
    fn test_convert_latex_basic_structure() {
        let out = convert_latex(
            r"\section{Intro} Hello world. \subsection{Next} More text.",
            &NoRenderer,
        );
        assert_eq!(out.blocks.len(), 4);
        assert!(matches!(&out.blocks[0], Block::Heading { level: 1, text } if text == "Intro"));
        assert!(matches!(&out.blocks[2], Block::Heading { level: 2, text } if text == "Next"));
    }

    #[test]
    fn test_convert_latex_unrendered_math_falls_back() {
        let out = convert_latex("value $x$ here", &NoRenderer);
        let Block::Paragraph { runs } = &out.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(runs
            .iter()
            .any(|r| matches!(r, Run::Math(MathContent::Fallback(f)) if f == "x")));
    }

    #[test]
    fn test_convert_file_rejects_unknown_extension() {
        let err = convert_file(Path::new("input.docx"), None, &NoRenderer).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidInput { .. }));
    }
}
