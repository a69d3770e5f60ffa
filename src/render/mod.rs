//! External formula renderer adapter
//!
//! Converts one LaTeX formula string to one OMML markup fragment by
//! invoking the external `texmath` process. Each invocation is bounded by
//! a short timeout and may fail independently per formula; a failure is
//! logged and the formula is treated as unconvertible.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::equations::MathMode;

/// Form of a rendered fragment, as tagged by the renderer output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentForm {
    /// A standalone math paragraph (`<m:oMathPara>…</m:oMathPara>`)
    MathParagraph,
    /// A bare math expression (`<m:oMath>…</m:oMath>`)
    Expression,
}

/// One rendered OMML fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathFragment {
    pub omml: String,
    pub form: FragmentForm,
}

impl MathFragment {
    /// Tag a raw renderer output string by its root element
    pub fn classify(omml: String) -> Self {
        let form = if omml.trim_start().starts_with("<m:oMathPara") {
            FragmentForm::MathParagraph
        } else {
            FragmentForm::Expression
        };
        MathFragment { omml, form }
    }

    /// XML for standalone (display) use
    pub fn block_xml(&self) -> String {
        match self.form {
            FragmentForm::MathParagraph => self.omml.clone(),
            FragmentForm::Expression => format!("<m:oMathPara>{}</m:oMathPara>", self.omml),
        }
    }

    /// XML for in-flow (inline) use: a math-paragraph fragment is unwrapped
    /// to its inner `<m:oMath>` element
    pub fn inline_xml(&self) -> String {
        match self.form {
            FragmentForm::Expression => self.omml.clone(),
            FragmentForm::MathParagraph => {
                let start = self.omml.find("<m:oMath>");
                let end = self.omml.rfind("</m:oMath>");
                match (start, end) {
                    (Some(s), Some(e)) if e > s => {
                        self.omml[s..e + "</m:oMath>".len()].to_string()
                    }
                    _ => self.omml.clone(),
                }
            }
        }
    }
}

/// One formula in, one rendered fragment out. Implementations may fail per
/// formula; `None` means the formula is unconvertible for this run.
pub trait FormulaRenderer {
    fn render(&self, formula: &str, mode: MathMode) -> Option<MathFragment>;
}

// ============================================================================
// Delimiter cleanup
// ============================================================================

lazy_static! {
    // Null delimiters: \Bigl., \bigr., \big., etc.
    static ref NULL_DELIM_RE: Regex = Regex::new(r"\\[Bb]ig{1,2}[lrm]?\.").unwrap();
    // Size commands with the delimiter kept: \Bigl( -> (
    static ref SIZE_CMD_RE: Regex = Regex::new(r"\\[Bb]ig{1,2}[lrm]?\s*").unwrap();
}

/// Strip sizing commands the OMML converter handles poorly, keeping the
/// delimiters themselves
pub fn clean_delimiters(formula: &str) -> String {
    let cleaned = NULL_DELIM_RE.replace_all(formula, "");
    SIZE_CMD_RE.replace_all(&cleaned, "").into_owned()
}

// ============================================================================
// texmath subprocess renderer
// ============================================================================

/// Renderer backed by the `texmath` executable
pub struct TexmathRenderer {
    program: PathBuf,
    timeout: Duration,
}

impl TexmathRenderer {
    pub fn new() -> Self {
        Self {
            program: locate_texmath(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, formula: &str) -> Option<String> {
        let mut child = match Command::new(&self.program)
            .args(["--from", "tex", "--to", "omml"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                log::warn!("failed to spawn '{}': {}", self.program.display(), e);
                return None;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(formula.as_bytes()) {
                log::warn!("failed to write formula to renderer: {}", e);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            // dropping stdin closes the pipe so the renderer sees EOF
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        log::warn!(
                            "renderer timed out after {:?} for formula '{}'",
                            self.timeout,
                            preview(formula)
                        );
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    log::warn!("failed waiting for renderer: {}", e);
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
            }
        };

        if status.success() {
            let mut out = String::new();
            if let Some(mut stdout) = child.stdout.take() {
                if let Err(e) = stdout.read_to_string(&mut out) {
                    log::warn!("failed to read renderer output: {}", e);
                    return None;
                }
            }
            let out = out.trim().to_string();
            if out.is_empty() {
                None
            } else {
                Some(out)
            }
        } else {
            let mut err = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                let _ = stderr.read_to_string(&mut err);
            }
            log::warn!(
                "renderer failed for formula '{}': {}",
                preview(formula),
                err.trim()
            );
            None
        }
    }
}

impl Default for TexmathRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaRenderer for TexmathRenderer {
    fn render(&self, formula: &str, _mode: MathMode) -> Option<MathFragment> {
        let cleaned = clean_delimiters(formula);
        self.run(&cleaned).map(MathFragment::classify)
    }
}

/// Prefer `~/.local/bin/texmath` when present (the conventional cabal/stack
/// install location), otherwise rely on PATH lookup
fn locate_texmath() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        let local = PathBuf::from(home).join(".local/bin/texmath");
        if local.exists() {
            return local;
        }
    }
    PathBuf::from("texmath")
}

fn preview(formula: &str) -> String {
    let flat: String = formula
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(40)
        .collect();
    if formula.chars().count() > 40 {
        format!("{}...", flat)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_math_paragraph() {
        let frag = MathFragment::classify("<m:oMathPara><m:oMath><m:r/></m:oMath></m:oMathPara>".into());
        assert_eq!(frag.form, FragmentForm::MathParagraph);
    }

    #[test]
    fn test_classify_expression() {
        let frag = MathFragment::classify("<m:oMath><m:r/></m:oMath>".into());
        assert_eq!(frag.form, FragmentForm::Expression);
    }

    #[test]
    fn test_inline_xml_unwraps_paragraph() {
        let frag = MathFragment::classify(
            "<m:oMathPara><m:oMath><m:r><m:t>x</m:t></m:r></m:oMath></m:oMathPara>".into(),
        );
        assert_eq!(frag.inline_xml(), "<m:oMath><m:r><m:t>x</m:t></m:r></m:oMath>");
    }

    #[test]
    fn test_block_xml_wraps_expression() {
        let frag = MathFragment::classify("<m:oMath><m:r/></m:oMath>".into());
        assert!(frag.block_xml().starts_with("<m:oMathPara>"));
        assert!(frag.block_xml().ends_with("</m:oMathPara>"));
    }

    #[test]
    fn test_clean_delimiters() {
        assert_eq!(clean_delimiters(r"\Bigl( x \Bigr)"), "( x )");
        assert_eq!(clean_delimiters(r"\bigl. f \bigr|"), " f |");
        assert_eq!(clean_delimiters(r"\frac{a}{b}"), r"\frac{a}{b}");
    }

    #[test]
    fn test_missing_program_returns_none() {
        let renderer = TexmathRenderer::new()
            .with_program("/nonexistent/texmath-binary")
            .with_timeout(Duration::from_millis(100));
        assert!(renderer.render("x^2", MathMode::Inline).is_none());
    }
}
