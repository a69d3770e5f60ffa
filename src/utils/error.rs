//! Error handling for texword conversions
//!
//! This module provides a unified error type and result type for all
//! conversion operations. Only I/O-level failures are fatal to a run;
//! per-formula render failures and malformed constructs are reported as
//! warnings and recovered locally.

use std::fmt;

/// Conversion error type
#[derive(Debug, Clone)]
pub enum ConversionError {
    /// Invalid input (wrong extension, empty document, unusable content)
    InvalidInput { message: String },
    /// IO error (for file operations)
    IoError { message: String },
    /// Internal error
    InternalError { message: String },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            ConversionError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
            ConversionError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConversionError {}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Conversion warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct ConversionWarning {
    pub message: String,
    pub suggestion: Option<String>,
}

impl ConversionWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Warning: {}", self.message)?;
        if let Some(ref sug) = self.suggestion {
            write!(f, " ({})", sug)?;
        }
        Ok(())
    }
}

// Convenience constructors for errors
impl ConversionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConversionError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        ConversionError::IoError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ConversionError::InternalError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = ConversionError::invalid("not a .tex file");
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.to_string().contains("not a .tex file"));
    }

    #[test]
    fn test_io_error_from_std() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConversionError = io.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_warning_with_suggestion() {
        let warn = ConversionWarning::with_suggestion(
            "unterminated environment 'align'",
            "left in place",
        );
        let msg = warn.to_string();
        assert!(msg.contains("align"));
        assert!(msg.contains("left in place"));
    }
}
