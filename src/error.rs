//! Fatal error codes and their process exit codes.
//!
//! Fatal conditions terminate the whole operation and are rendered on stderr
//! as a structured envelope `{"error":{"code","message","details"?}}`.
//! Advisory conditions never pass through here; they travel inline in the
//! DetectionReport (`issues`) or the ConvertResult (`errors`).

use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERAL_ERROR: i32 = 1;
pub const EXIT_INVALID_ARGS: i32 = 2;
pub const EXIT_FILE_NOT_FOUND: i32 = 3;
pub const EXIT_DETECTION_FAILED: i32 = 4;
pub const EXIT_CONVERSION_FAILED: i32 = 5;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("input file not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("output directory not found: {}", path.display())]
    OutputDirNotFound { path: PathBuf },
    #[error("an input path is required")]
    InputRequired,
    #[error("an output path is required")]
    OutputRequired,
    #[error("file is not valid UTF-8")]
    EncodingNotUtf8,
    #[error("line {line} exceeds the maximum line length of {limit} bytes")]
    LineTooLong { line: usize, limit: usize },
    #[error("no candidate delimiter could be scored")]
    NoValidDelimiter,
    #[error("detection failed: {message}")]
    DetectionFailed { message: String },
    #[error("conversion failed: {message}")]
    ConversionFailed { message: String },
}

impl FatalError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::OutputDirNotFound { .. } => "OUTPUT_DIR_NOT_FOUND",
            Self::InputRequired => "INPUT_REQUIRED",
            Self::OutputRequired => "OUTPUT_REQUIRED",
            Self::EncodingNotUtf8 => "ENCODING_NOT_UTF8",
            Self::LineTooLong { .. } => "LINE_TOO_LONG",
            Self::NoValidDelimiter => "NO_VALID_DELIMITER",
            Self::DetectionFailed { .. } => "DETECTION_FAILED",
            Self::ConversionFailed { .. } => "CONVERSION_FAILED",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } => EXIT_FILE_NOT_FOUND,
            Self::OutputDirNotFound { .. } | Self::InputRequired | Self::OutputRequired => {
                EXIT_INVALID_ARGS
            }
            Self::EncodingNotUtf8
            | Self::LineTooLong { .. }
            | Self::NoValidDelimiter
            | Self::DetectionFailed { .. } => EXIT_DETECTION_FAILED,
            Self::ConversionFailed { .. } => EXIT_CONVERSION_FAILED,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::FileNotFound { path } => Some(json!({ "file": path })),
            Self::LineTooLong { line, limit } => Some(json!({ "line": line, "limit": limit })),
            _ => None,
        }
    }
}

/// Maps any error chain onto the documented exit-code table; errors that are
/// not a [`FatalError`] exit with the general code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<FatalError>()
        .map(FatalError::exit_code)
        .unwrap_or(EXIT_GENERAL_ERROR)
}

/// Prints the structured error envelope consumed by the UI to stderr.
pub fn emit_error_envelope(err: &anyhow::Error) {
    let (code, message, details) = match err.downcast_ref::<FatalError>() {
        Some(fatal) => (fatal.code(), fatal.to_string(), fatal.details()),
        None => ("GENERAL_ERROR", format!("{err:#}"), None),
    };
    let mut envelope = json!({ "error": { "code": code, "message": message } });
    if let Some(details) = details {
        envelope["error"]["details"] = details;
    }
    eprintln!("{envelope}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_documented_table() {
        assert_eq!(
            FatalError::FileNotFound {
                path: PathBuf::from("missing.csv")
            }
            .exit_code(),
            EXIT_FILE_NOT_FOUND
        );
        assert_eq!(FatalError::InputRequired.exit_code(), EXIT_INVALID_ARGS);
        assert_eq!(FatalError::OutputRequired.exit_code(), EXIT_INVALID_ARGS);
        assert_eq!(
            FatalError::EncodingNotUtf8.exit_code(),
            EXIT_DETECTION_FAILED
        );
        assert_eq!(
            FatalError::ConversionFailed {
                message: "boom".to_string()
            }
            .exit_code(),
            EXIT_CONVERSION_FAILED
        );
    }

    #[test]
    fn downcast_falls_back_to_general_error() {
        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&plain), EXIT_GENERAL_ERROR);

        let fatal: anyhow::Error = FatalError::NoValidDelimiter.into();
        assert_eq!(exit_code_for(&fatal), EXIT_DETECTION_FAILED);
    }
}
