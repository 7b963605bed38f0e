//! Public result types: the DetectionReport consumed by the preview UI and
//! the ConvertResult summarizing a DJSON conversion.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub mod issue_codes {
    pub const AMBIGUOUS_DELIMITER: &str = "AMBIGUOUS_DELIMITER";
    pub const HIGH_INVALID_RATE: &str = "HIGH_INVALID_RATE";
    pub const INVALID_JSON_LINES: &str = "INVALID_JSON_LINES";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Jsonl,
    Json,
}

impl FileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External rendering of an inferred column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "DOUBLE")]
    Double,
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    #[serde(rename = "BOOLEAN")]
    Boolean,
    #[serde(rename = "TEXT")]
    Text,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Double => "DOUBLE",
            Self::Timestamp => "TIMESTAMP",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelimiterInfo {
    /// The winning delimiter, rendered as a one-character string.
    pub codepoint: char,
    /// Mode coverage as a percentage, rounded to two decimals.
    pub coverage_pct: f64,
}

/// One preview row: column name to raw trimmed string, in column order.
pub type PreviewRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Preview {
    pub rows: usize,
    pub data: Vec<PreviewRow>,
    pub invalid_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub code: String,
    pub message: String,
}

impl Issue {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SampledMeta {
    pub lines: usize,
    pub bytes: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub format: FileFormat,
    pub encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<DelimiterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub has_header: bool,
    pub field_count: usize,
    pub trim_fields: bool,
    pub columns: Vec<Column>,
    pub preview: Preview,
    pub confidence: f64,
    pub issues: Vec<Issue>,
    pub sampled_meta: SampledMeta,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertResult {
    pub djson_path: PathBuf,
    pub rows_written: u64,
    pub bytes_written: u64,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

/// Rounds to two decimal places, the precision every reported ratio uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
