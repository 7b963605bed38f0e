//! Detection orchestration: sample, classify, and assemble the
//! DetectionReport, plus the `detect` CLI command.

use std::{fs::File, io::BufReader, path::Path, time::Instant};

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::{Map, Value};

use crate::{
    cli::DetectArgs,
    delimiter::{self, CandidateResult, Decision},
    error::FatalError,
    format::{self, is_comment_line},
    inference,
    options::DetectionOptions,
    report::{
        Column, ColumnType, DelimiterInfo, DetectionReport, FileFormat, Issue, Preview,
        PreviewRow, SampledMeta, issue_codes, round2,
    },
    sampler::{self, Sample},
};

pub fn execute(args: &DetectArgs) -> Result<()> {
    let path = args.file.as_deref().ok_or(FatalError::InputRequired)?;
    if !path.exists() {
        return Err(FatalError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    let mut opts = DetectionOptions::default();
    if let Some(sample_bytes) = args.sample_bytes {
        opts.sample_bytes = sample_bytes;
    }
    if let Some(max_preview_rows) = args.max_preview_rows {
        opts.max_preview_rows = max_preview_rows;
    }

    let report = detect(path, &opts).map_err(wrap_detection_failure)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn wrap_detection_failure(err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<FatalError>().is_some() {
        return err;
    }
    FatalError::DetectionFailed {
        message: format!("{err:#}"),
    }
    .into()
}

/// Runs the full detection pass over a file.
pub fn detect(path: &Path, opts: &DetectionOptions) -> Result<DetectionReport> {
    let start = Instant::now();
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut reader = BufReader::with_capacity(1 << 20, file);
    let sample = sampler::sample_lines(&mut reader, opts)?;
    detect_from_sample(&sample, opts, start)
}

/// Detection over an already-collected sample. Split out so the pipeline is
/// testable without touching the filesystem.
pub fn detect_from_sample(
    sample: &Sample,
    opts: &DetectionOptions,
    start: Instant,
) -> Result<DetectionReport> {
    let detected = format::classify(&sample.lines, opts);
    info!(
        "Classified input as {detected} from {} sampled line(s)",
        sample.lines.len()
    );
    match detected {
        FileFormat::Csv => detect_csv(sample, opts, start),
        FileFormat::Json | FileFormat::Jsonl => detect_json(sample, detected, opts, start),
    }
}

fn detect_csv(sample: &Sample, opts: &DetectionOptions, start: Instant) -> Result<DetectionReport> {
    let candidates = delimiter::evaluate_candidates(
        &sample.lines,
        &opts.candidate_delimiters,
        &opts.comment_prefixes,
    );
    let decision = delimiter::decide(&candidates).ok_or(FatalError::NoValidDelimiter)?;
    let winner = decision.winner;
    debug!(
        "Delimiter {:?} won with score {:.3} over {} candidate(s)",
        winner.delimiter, winner.score, decision.candidate_count
    );

    let mut issues = Vec::new();
    if decision.is_ambiguous {
        issues.push(Issue::new(
            issue_codes::AMBIGUOUS_DELIMITER,
            "Multiple delimiters have similar scores, detection may be uncertain",
        ));
    }
    if winner.stats.invalid_rate > 0.10 {
        issues.push(Issue::new(
            issue_codes::HIGH_INVALID_RATE,
            "More than 10% of lines have invalid formatting",
        ));
    }

    let kinds = inference::column_kinds(&sample.lines, &winner, &opts.comment_prefixes);
    let header = inference::detect_header(&sample.lines, &winner, &kinds, &opts.comment_prefixes);

    let columns: Vec<Column> = (0..winner.stats.mode_columns)
        .map(|index| {
            let name = if header.has_header {
                header
                    .names
                    .get(index)
                    .map(|name| name.trim())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("col{}", index + 1))
            } else {
                format!("col{}", index + 1)
            };
            let column_type = kinds
                .get(index)
                .map(|inference| inference.kind.column_type())
                .unwrap_or(ColumnType::Text);
            Column { name, column_type }
        })
        .collect();

    let preview = build_preview(&sample.lines, &winner, &columns, header.has_header, opts);
    let comment = find_comment_prefix(&sample.lines, &opts.comment_prefixes);
    let confidence = round2(csv_confidence(&winner, &decision));

    Ok(DetectionReport {
        format: FileFormat::Csv,
        encoding: "utf-8",
        delimiter: Some(DelimiterInfo {
            codepoint: winner.delimiter,
            coverage_pct: round2(winner.stats.mode_coverage * 100.0),
        }),
        comment,
        has_header: header.has_header,
        field_count: winner.stats.mode_columns,
        trim_fields: true,
        columns,
        preview,
        confidence,
        issues,
        sampled_meta: SampledMeta {
            lines: sample.lines.len(),
            bytes: sample.bytes,
            duration_ms: crate::elapsed_ms(start),
        },
        duration_ms: crate::elapsed_ms(start),
    })
}

fn build_preview(
    lines: &[String],
    winner: &CandidateResult,
    columns: &[Column],
    has_header: bool,
    opts: &DetectionOptions,
) -> Preview {
    let mut preview = Preview::default();
    let mut skipped_header = false;

    for line in lines {
        if is_comment_line(line, &opts.comment_prefixes) {
            continue;
        }
        let (fields, invalid) = delimiter::split_line_fields(line, winner.delimiter);
        if invalid || fields.len() != winner.stats.mode_columns {
            preview.invalid_rows += 1;
            continue;
        }
        // The header is skipped only after structural validation.
        if has_header && !skipped_header {
            skipped_header = true;
            continue;
        }
        if preview.data.len() >= opts.max_preview_rows {
            break;
        }
        let mut row = PreviewRow::new();
        for (column, field) in columns.iter().zip(&fields) {
            row.insert(
                column.name.clone(),
                Value::String(field.trim().to_string()),
            );
        }
        preview.data.push(row);
    }

    preview.rows = preview.data.len();
    preview
}

fn find_comment_prefix(lines: &[String], prefixes: &[String]) -> Option<String> {
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        for prefix in prefixes {
            if trimmed.starts_with(prefix.as_str()) {
                return Some(prefix.clone());
            }
        }
    }
    None
}

fn csv_confidence(winner: &CandidateResult, decision: &Decision) -> f64 {
    let mut confidence = winner.stats.mode_coverage;
    if winner.stats.invalid_rate > 0.05 {
        confidence *= 1.0 - winner.stats.invalid_rate;
    }
    if decision.is_ambiguous {
        confidence *= 0.85;
    }
    confidence.clamp(0.0, 1.0)
}

fn detect_json(
    sample: &Sample,
    detected: FileFormat,
    opts: &DetectionOptions,
    start: Instant,
) -> Result<DetectionReport> {
    let mut valid_lines = 0usize;
    let mut invalid_lines = 0usize;
    let mut retained: Vec<Map<String, Value>> = Vec::new();

    if detected == FileFormat::Json {
        // The array usually spans many sampled lines; feed the classifier's
        // tail through the parser in one piece.
        if let Some(start_index) = sample.lines.iter().position(|line| {
            let trimmed = line.trim();
            !is_comment_line(trimmed, &opts.comment_prefixes) && trimmed.starts_with('[')
        }) {
            let joined = sample.lines[start_index..].join("\n");
            if let Ok(array) = serde_json::from_str::<Vec<Map<String, Value>>>(joined.trim()) {
                valid_lines = array.len();
                retained = array.into_iter().take(opts.max_preview_rows).collect();
            }
        }
    } else {
        for (index, line) in sample.lines.iter().enumerate() {
            let trimmed = line.trim();
            if !is_comment_line(trimmed, &opts.comment_prefixes) && trimmed.starts_with('{') {
                match serde_json::from_str::<Map<String, Value>>(trimmed) {
                    Ok(object) => {
                        valid_lines += 1;
                        if retained.len() < opts.max_preview_rows {
                            retained.push(object);
                        }
                    }
                    Err(_) => invalid_lines += 1,
                }
            }
            if index >= opts.max_preview_rows * 2 {
                break;
            }
        }
    }

    // Column order is the union of keys in first-seen order, bounded by the
    // retained preview objects.
    let mut schema: Vec<(String, ColumnType)> = Vec::new();
    for object in &retained {
        merge_schema(&mut schema, object);
    }
    let data: Vec<PreviewRow> = retained
        .iter()
        .map(|object| render_preview_row(&schema, object))
        .collect();

    let mut issues = Vec::new();
    if invalid_lines > 0 {
        issues.push(Issue::new(
            issue_codes::INVALID_JSON_LINES,
            "Some lines could not be parsed as valid JSON",
        ));
    }
    let confidence = if valid_lines == 0 {
        0.9
    } else {
        round2(valid_lines as f64 / (valid_lines + invalid_lines) as f64)
    };

    Ok(DetectionReport {
        format: detected,
        encoding: "utf-8",
        delimiter: None,
        comment: None,
        has_header: false,
        field_count: 0,
        trim_fields: false,
        columns: schema
            .into_iter()
            .map(|(name, column_type)| Column { name, column_type })
            .collect(),
        preview: Preview {
            rows: data.len(),
            data,
            invalid_rows: invalid_lines,
        },
        confidence,
        issues,
        sampled_meta: SampledMeta {
            lines: sample.lines.len(),
            bytes: sample.bytes,
            duration_ms: crate::elapsed_ms(start),
        },
        duration_ms: crate::elapsed_ms(start),
    })
}

fn merge_schema(schema: &mut Vec<(String, ColumnType)>, object: &Map<String, Value>) {
    for (key, value) in object {
        if !schema.iter().any(|(name, _)| name == key) {
            schema.push((key.clone(), json_column_type(value)));
        }
    }
}

fn json_column_type(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) => ColumnType::Boolean,
        Value::Number(number) => {
            let whole = number.is_i64()
                || number.is_u64()
                || number.as_f64().is_some_and(|float| float == float.trunc());
            if whole {
                ColumnType::Int
            } else {
                ColumnType::Double
            }
        }
        _ => ColumnType::Text,
    }
}

fn render_preview_row(schema: &[(String, ColumnType)], object: &Map<String, Value>) -> PreviewRow {
    let mut row = PreviewRow::new();
    for (name, _) in schema {
        let rendered = object.get(name).map(render_json_value).unwrap_or_default();
        row.insert(name.clone(), Value::String(rendered));
    }
    row
}

fn render_json_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
