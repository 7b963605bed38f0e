//! Cell-type inference and header detection.
//!
//! Each cell is classified by an ordered ladder: Empty, Bool, Int, Float,
//! Date, Text. The first matching rule wins, so `0`/`1` read as booleans
//! before integers, and thousand-separator cleaning happens only on the
//! numeric rungs where it cannot corrupt date layouts like `Jan 02, 2006`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::{
    delimiter::{CandidateResult, split_line_fields},
    format::is_comment_line,
    report::ColumnType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredKind {
    Empty,
    Bool,
    Int,
    Float,
    Date,
    Text,
}

impl InferredKind {
    /// External rendering used in the DetectionReport's column list.
    pub fn column_type(self) -> ColumnType {
        match self {
            Self::Bool => ColumnType::Boolean,
            Self::Int => ColumnType::Int,
            Self::Float => ColumnType::Double,
            Self::Date => ColumnType::Timestamp,
            Self::Empty | Self::Text => ColumnType::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellInference {
    pub kind: InferredKind,
    pub confidence: f64,
}

impl Default for CellInference {
    fn default() -> Self {
        Self {
            kind: InferredKind::Empty,
            confidence: 0.0,
        }
    }
}

/// Classifies one cell. The value is trimmed first; trimming never changes
/// the outcome beyond that.
pub fn infer_cell_type(value: &str) -> CellInference {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_null_token(trimmed) {
        return CellInference {
            kind: InferredKind::Empty,
            confidence: 1.0,
        };
    }

    if is_bool_token(trimmed) {
        let confidence = if trimmed.eq_ignore_ascii_case("true")
            || trimmed.eq_ignore_ascii_case("false")
        {
            0.95
        } else {
            0.90
        };
        return CellInference {
            kind: InferredKind::Bool,
            confidence,
        };
    }

    if parses_as_int(trimmed) {
        return CellInference {
            kind: InferredKind::Int,
            confidence: 0.98,
        };
    }

    if parses_as_float(trimmed) {
        return CellInference {
            kind: InferredKind::Float,
            confidence: 0.93,
        };
    }

    if parse_date_value(trimmed).is_some() {
        return CellInference {
            kind: InferredKind::Date,
            confidence: 0.92,
        };
    }

    CellInference {
        kind: InferredKind::Text,
        confidence: 0.60,
    }
}

fn is_null_token(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "null" | "nil" | "na" | "n/a" | "none" | "-"
    )
}

fn is_bool_token(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "y" | "n" | "0" | "1"
    )
}

fn strip_thousands(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !matches!(ch, ',' | '_' | ' '))
        .collect()
}

fn parses_as_int(value: &str) -> bool {
    let clean = strip_thousands(value);
    if clean.contains(['.', 'e', 'E']) {
        return false;
    }
    clean.parse::<i64>().is_ok()
}

fn parses_as_float(value: &str) -> bool {
    strip_thousands(value).parse::<f64>().is_ok()
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%Y/%m/%d",
    "%Y.%m.%d",
];

/// Parses a value against the fixed date-layout ladder, returning the date
/// component. Also serves the converter's TIMESTAMP coercion.
pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    None
}

/// Aggregates per-column kinds over every structurally valid sample row whose
/// field count equals the winner's mode.
pub fn column_kinds(
    lines: &[String],
    winner: &CandidateResult,
    comment_prefixes: &[String],
) -> Vec<CellInference> {
    let mode_columns = winner.stats.mode_columns;
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); mode_columns];

    for line in lines {
        if is_comment_line(line, comment_prefixes) {
            continue;
        }
        let (fields, invalid) = split_line_fields(line, winner.delimiter);
        if invalid || fields.len() != mode_columns {
            continue;
        }
        for (column, field) in columns.iter_mut().zip(fields) {
            column.push(field);
        }
    }

    columns.iter().map(|cells| aggregate_column(cells)).collect()
}

// Ties go to whichever kind reached the running maximum first; deterministic
// for a fixed sample, order-dependent across shuffles.
fn aggregate_column(cells: &[String]) -> CellInference {
    let mut counts = [0usize; 6];
    let mut max = 0usize;
    let mut winner = CellInference::default();

    for cell in cells {
        let inference = infer_cell_type(cell);
        if inference.kind == InferredKind::Empty {
            continue;
        }
        let slot = kind_slot(inference.kind);
        counts[slot] += 1;
        if counts[slot] > max {
            max = counts[slot];
            winner = inference;
        }
    }

    winner
}

fn kind_slot(kind: InferredKind) -> usize {
    match kind {
        InferredKind::Empty => 0,
        InferredKind::Bool => 1,
        InferredKind::Int => 2,
        InferredKind::Float => 3,
        InferredKind::Date => 4,
        InferredKind::Text => 5,
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderDecision {
    pub has_header: bool,
    pub names: Vec<String>,
}

/// Compares the first valid row's kinds against the aggregated column kinds.
/// Any divergence means the row is a header; a full match means the row is
/// indistinguishable from data and must be emitted as data.
pub fn detect_header(
    lines: &[String],
    winner: &CandidateResult,
    kinds: &[CellInference],
    comment_prefixes: &[String],
) -> HeaderDecision {
    let mode_columns = winner.stats.mode_columns;
    let mut candidate: Vec<String> = Vec::new();

    for line in lines {
        if is_comment_line(line, comment_prefixes) {
            continue;
        }
        let (fields, invalid) = split_line_fields(line, winner.delimiter);
        if invalid || fields.len() != mode_columns {
            continue;
        }
        candidate = fields;
        break;
    }

    for (cell, column) in candidate.iter().zip(kinds) {
        if infer_cell_type(cell).kind != column.kind {
            return HeaderDecision {
                has_header: true,
                names: candidate,
            };
        }
    }

    HeaderDecision::default()
}
