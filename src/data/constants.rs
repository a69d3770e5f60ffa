//! Construct catalogue and intermediate-representation markers
//!
//! The catalogue is the fixed, versioned set of constructs the scanner and
//! extractor recognize. Markers use Unicode private-use-area sentinels so
//! they cannot collide with any legal input substring; they survive every
//! rewrite pass untouched and are resolved during reinsertion.

use phf::phf_set;

// ============================================================================
// Marker sentinels
// ============================================================================

/// Opening sentinel for all in-text markers
pub const MARK_OPEN: char = '\u{E000}';
/// Closing sentinel for all in-text markers
pub const MARK_CLOSE: char = '\u{E001}';

/// Prefix of a display-math placeholder: `\u{E000}MATHD:<n>\u{E001}`
pub const DISPLAY_MARK_PREFIX: &str = "\u{E000}MATHD:";
/// Prefix of an inline-math placeholder: `\u{E000}MATHI:<n>\u{E001}`
pub const INLINE_MARK_PREFIX: &str = "\u{E000}MATHI:";

/// Start of a raw table region (own line)
pub const TABLE_MARK: &str = "\u{E000}TABLE\u{E001}";
/// End of a raw table region (own line)
pub const TABLE_END_MARK: &str = "\u{E000}ENDTABLE\u{E001}";

/// Bulleted list item line prefix
pub const ITEM_BULLET_MARK: &str = "\u{E000}ITEM:b\u{E001}";
/// Numbered list item line prefix
pub const ITEM_NUMBER_MARK: &str = "\u{E000}ITEM:n\u{E001}";

/// Heading line prefix; the level digit and `MARK_CLOSE` follow
pub const HEADING_MARK_PREFIX: &str = "\u{E000}HEAD:";

/// Subscript span markers
pub const SUB_OPEN: &str = "\u{E000}SUB\u{E001}";
pub const SUB_CLOSE: &str = "\u{E000}/SUB\u{E001}";
/// Superscript span markers
pub const SUP_OPEN: &str = "\u{E000}SUP\u{E001}";
pub const SUP_CLOSE: &str = "\u{E000}/SUP\u{E001}";

/// Build a display-math placeholder for the given pool index
pub fn display_placeholder(index: usize) -> String {
    format!("{}{}{}", DISPLAY_MARK_PREFIX, index, MARK_CLOSE)
}

/// Build an inline-math placeholder for the given pool index
pub fn inline_placeholder(index: usize) -> String {
    format!("{}{}{}", INLINE_MARK_PREFIX, index, MARK_CLOSE)
}

/// Build a heading marker line for the given level and title
pub fn heading_marker(level: u8, title: &str) -> String {
    format!("{}{}{}{}", HEADING_MARK_PREFIX, level, MARK_CLOSE, title)
}

// ============================================================================
// Math environment catalogue
// ============================================================================

/// Equation-like environments whose `\begin…\end` wrapper must be kept as
/// part of the formula text, so the renderer can interpret multi-line
/// alignment
pub const WRAPPER_PRESERVING_ENVS: &[&str] = &[
    "align",
    "align*",
    "alignat",
    "alignat*",
    "aligned",
    "eqnarray",
    "eqnarray*",
    "cases",
    "split",
];

/// Equation-like environments whose wrapper is stripped; only the body is
/// sent to the renderer
pub const PLAIN_DISPLAY_ENVS: &[&str] = &[
    "equation",
    "equation*",
    "gather",
    "gather*",
    "multline",
    "multline*",
    "displaymath",
];

// ============================================================================
// Structural environment catalogue
// ============================================================================

/// Figure-like environments: reduced to marker/caption lines
pub const FIGURE_ENVS: &[&str] = &["figure", "figure*"];

/// Table wrapper environments: reduced to caption/label lines plus a raw
/// table region
pub const TABLE_ENVS: &[&str] = &["table", "table*"];

/// Tabular-family environments holding the actual grid
pub const TABULAR_ENVS: &[&str] = &["tabular", "tabular*", "tabularx", "longtable", "array"];

/// Bulleted list environments
pub const BULLET_LIST_ENVS: &[&str] = &["itemize"];

/// Numbered list environments
pub const NUMBER_LIST_ENVS: &[&str] = &["enumerate"];

/// Sectioning commands and their heading levels, in preamble-skip priority
/// order
pub const SECTIONING_COMMANDS: &[(&str, u8)] = &[
    ("chapter", 1),
    ("part", 1),
    ("section", 1),
    ("subsection", 2),
    ("subsubsection", 3),
];

// ============================================================================
// Inline command catalogue
// ============================================================================

/// Formatting commands that collapse to their argument text
pub static EMPHASIS_COMMANDS: phf::Set<&'static str> = phf_set! {
    "textbf",
    "textit",
    "texttt",
    "textrm",
    "textsf",
    "textsc",
    "emph",
    "text",
    "mathrm",
    "mathbf",
    "mathcal",
    "mathbb",
    "underline",
    "mbox",
    "hbox",
};

/// Cross-reference commands that become bracketed textual references
pub static REFERENCE_COMMANDS: phf::Set<&'static str> = phf_set! {
    "ref",
    "eqref",
    "autoref",
    "pageref",
    "cref",
    "Cref",
};

/// Horizontal-rule commands inside tabular bodies; discarded by the
/// tokenizer. Entries with arguments list the argument count.
pub const TABLE_RULE_COMMANDS: &[(&str, usize)] = &[
    ("hline", 0),
    ("toprule", 0),
    ("midrule", 0),
    ("bottomrule", 0),
    ("cmidrule", 1),
    ("cline", 1),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_distinct_per_class() {
        assert_ne!(display_placeholder(0), inline_placeholder(0));
        assert_ne!(display_placeholder(0), display_placeholder(1));
    }

    #[test]
    fn test_markers_use_private_use_area() {
        for marker in [
            display_placeholder(3),
            inline_placeholder(7),
            heading_marker(2, "Title"),
            TABLE_MARK.to_string(),
            ITEM_BULLET_MARK.to_string(),
        ] {
            assert!(marker.starts_with(MARK_OPEN), "marker {:?}", marker);
        }
    }

    #[test]
    fn test_env_catalogues_disjoint() {
        for env in WRAPPER_PRESERVING_ENVS {
            assert!(!PLAIN_DISPLAY_ENVS.contains(env));
        }
    }
}
