//! Document block model
//!
//! The ordered block stream produced by reinsertion and consumed by the
//! document builder. All entities live for one conversion call only.

use crate::render::MathFragment;

/// Style of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStyle {
    Plain,
    Subscript,
    Superscript,
    Bold,
}

/// Rendered math, or a visible fallback when the renderer failed for this
/// formula (the raw formula text is carried so nothing is silently lost)
#[derive(Debug, Clone, PartialEq)]
pub enum MathContent {
    Rendered(MathFragment),
    Fallback(String),
}

/// One run inside a paragraph-like block
#[derive(Debug, Clone, PartialEq)]
pub enum Run {
    Text { text: String, style: RunStyle },
    Math(MathContent),
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Run::Text {
            text: text.into(),
            style: RunStyle::Plain,
        }
    }

    pub fn styled(text: impl Into<String>, style: RunStyle) -> Self {
        Run::Text {
            text: text.into(),
            style,
        }
    }
}

/// List item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Numbered,
}

/// A table cell with its math resolved into runs
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCell {
    pub runs: Vec<Run>,
    pub colspan: usize,
}

/// One output block, in document order
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { runs: Vec<Run> },
    ListItem { kind: ListKind, runs: Vec<Run> },
    Table { rows: Vec<Vec<ResolvedCell>>, columns: usize },
    Equation { content: MathContent, label: Option<String> },
}

impl Block {
    /// Paragraph holding a single plain run
    pub fn plain_paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            runs: vec![Run::plain(text)],
        }
    }
}
