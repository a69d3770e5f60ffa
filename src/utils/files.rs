//! File input/output plumbing
//!
//! Reading the source document and deriving the output path. All failures
//! here abort the run before the pipeline starts.

use std::path::{Path, PathBuf};

use crate::utils::error::{ConversionError, ConversionResult};

/// Kind of input document, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Latex,
    Markdown,
    Bibtex,
}

impl InputKind {
    /// Detect the input kind from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tex" | "latex" => Some(InputKind::Latex),
            "md" | "markdown" => Some(InputKind::Markdown),
            "bib" => Some(InputKind::Bibtex),
            _ => None,
        }
    }
}

/// Read an input file as UTF-8, validating that its extension matches one of
/// the supported kinds
pub fn read_input(path: &Path) -> ConversionResult<(String, InputKind)> {
    let kind = InputKind::from_path(path).ok_or_else(|| {
        ConversionError::invalid(format!(
            "'{}' is not a supported input (.tex, .md, .bib)",
            path.display()
        ))
    })?;

    if !path.exists() {
        return Err(ConversionError::io(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    Ok((content, kind))
}

/// Derive the output path from the input path: same stem, `.docx` extension,
/// unless an explicit output path is given
pub fn derive_output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(p) => p.to_path_buf(),
        None => input.with_extension("docx"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_kind_detection() {
        assert_eq!(
            InputKind::from_path(Path::new("paper.tex")),
            Some(InputKind::Latex)
        );
        assert_eq!(
            InputKind::from_path(Path::new("notes.MD")),
            Some(InputKind::Markdown)
        );
        assert_eq!(
            InputKind::from_path(Path::new("refs.bib")),
            Some(InputKind::Bibtex)
        );
        assert_eq!(InputKind::from_path(Path::new("image.png")), None);
        assert_eq!(InputKind::from_path(Path::new("noextension")), None);
    }

    #[test]
    fn test_derive_output_path() {
        let out = derive_output_path(Path::new("/tmp/paper.tex"), None);
        assert_eq!(out, PathBuf::from("/tmp/paper.docx"));

        let out = derive_output_path(Path::new("paper.tex"), Some(Path::new("out.docx")));
        assert_eq!(out, PathBuf::from("out.docx"));
    }

    #[test]
    fn test_read_input_rejects_unknown_extension() {
        let err = read_input(Path::new("document.pdf")).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidInput { .. }));
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input(Path::new("/nonexistent/paper.tex")).unwrap_err();
        assert!(matches!(err, ConversionError::IoError { .. }));
    }
}
