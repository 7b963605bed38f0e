//! Streaming conversion of detected files to DJSON, plus the `convert` CLI
//! command and its NDJSON event stream.
//!
//! The converter re-opens the file and runs a producer-consumer pair: a
//! reader thread owns the input handle, parses physical lines, and produces
//! onto two bounded channels — parsed rows on one, row-level error strings on
//! the other. The writer (the calling thread) drains the row channel,
//! coercing and serializing in column order; a drainer thread collects the
//! error channel. Both channels must be drained to closure before [`convert`]
//! returns: a full error channel would otherwise block the reader forever.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::mpsc::{Receiver, SyncSender, sync_channel},
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value as JsonValue, json};

use crate::{
    cli::ConvertArgs,
    delimiter::split_line_fields,
    detect,
    error::FatalError,
    inference::parse_date_value,
    options::DetectionOptions,
    report::{Column, ColumnType, ConvertResult, DetectionReport, FileFormat},
    sampler::{LineRead, read_logical_line},
};

const ROW_CHANNEL_CAPACITY: usize = 1024;
const ERROR_CHANNEL_CAPACITY: usize = 256;

/// A typed cell, serialized untagged into the DJSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    Timestamp(String),
    Text(String),
}

/// One cell as produced by a reader: a raw string still to be coerced, or a
/// native JSON value passed through untouched.
#[derive(Debug, Clone)]
enum CellSlot {
    Raw(String),
    Native(JsonValue),
}

type Row = Vec<CellSlot>;

pub fn execute(args: &ConvertArgs) -> Result<()> {
    let start = Instant::now();
    let input = args.input.as_deref().ok_or(FatalError::InputRequired)?;
    let output = args.output.as_deref().ok_or(FatalError::OutputRequired)?;
    if !input.exists() {
        return Err(FatalError::FileNotFound {
            path: input.to_path_buf(),
        }
        .into());
    }
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(FatalError::OutputDirNotFound {
            path: parent.to_path_buf(),
        }
        .into());
    }

    emit_event(&json!({
        "type": "started",
        "input_path": input,
        "output_path": output,
    }));

    let opts = DetectionOptions::default();
    let result = convert(input, output, &opts).map_err(|err| FatalError::ConversionFailed {
        message: format!("{err:#}"),
    })?;

    emit_event(&json!({
        "type": "result",
        "djson_path": result.djson_path,
        "rows_written": result.rows_written,
        "bytes_written": result.bytes_written,
        "duration_ms": crate::elapsed_ms(start),
        "errors": result.errors,
    }));
    Ok(())
}

// Consumers are told to ignore unknown event types, so this stays a plain
// one-object-per-line stream.
fn emit_event(event: &JsonValue) {
    println!("{event}");
}

/// Detects the input and streams it to `output` as DJSON.
pub fn convert(input: &Path, output: &Path, opts: &DetectionOptions) -> Result<ConvertResult> {
    let start = Instant::now();
    let report = detect::detect(input, opts).context("detection failed")?;
    info!(
        "Converting {} input {:?} to DJSON {:?}",
        report.format, input, output
    );

    let out_file =
        File::create(output).with_context(|| format!("Creating output file {output:?}"))?;
    let mut writer = BufWriter::new(out_file);

    let (rows_written, errors) = match report.format {
        FileFormat::Csv => stream_rows(input, &report, opts, &mut writer, read_csv_rows)?,
        FileFormat::Jsonl => stream_rows(input, &report, opts, &mut writer, read_jsonl_rows)?,
        FileFormat::Json => convert_json_array(input, &report, &mut writer)?,
    };

    writer.flush().context("Flushing DJSON output")?;
    let bytes_written = writer
        .get_ref()
        .metadata()
        .context("Reading output file metadata")?
        .len();

    info!(
        "Wrote {rows_written} row(s), {bytes_written} byte(s), {} row error(s)",
        errors.len()
    );
    Ok(ConvertResult {
        djson_path: output.to_path_buf(),
        rows_written,
        bytes_written,
        duration_ms: crate::elapsed_ms(start),
        errors,
    })
}

fn stream_rows<F>(
    input: &Path,
    report: &DetectionReport,
    opts: &DetectionOptions,
    writer: &mut BufWriter<File>,
    read: F,
) -> Result<(u64, Vec<String>)>
where
    F: FnOnce(
            &Path,
            &DetectionReport,
            &DetectionOptions,
            SyncSender<Row>,
            SyncSender<String>,
        ) -> Result<()>
        + Send,
{
    let (row_tx, row_rx) = sync_channel::<Row>(ROW_CHANNEL_CAPACITY);
    let (error_tx, error_rx) = sync_channel::<String>(ERROR_CHANNEL_CAPACITY);

    thread::scope(|scope| {
        let reader = scope.spawn(move || read(input, report, opts, row_tx, error_tx));
        let drainer = scope.spawn(move || error_rx.iter().collect::<Vec<String>>());

        let write_outcome = write_rows(row_rx, &report.columns, writer);

        // The reader dropped both senders on exit, so the joins cannot hang.
        let read_outcome = reader
            .join()
            .map_err(|_| anyhow!("reader thread panicked"))?;
        let errors = drainer
            .join()
            .map_err(|_| anyhow!("error drainer thread panicked"))?;
        read_outcome?;
        let rows_written = write_outcome?;
        Ok((rows_written, errors))
    })
}

fn write_rows(
    rows: Receiver<Row>,
    columns: &[Column],
    writer: &mut BufWriter<File>,
) -> Result<u64> {
    let mut rows_written = 0u64;
    for row in rows {
        let record = DjsonRow {
            columns,
            cells: &row,
        };
        serde_json::to_writer(&mut *writer, &record)
            .with_context(|| format!("Encoding row {}", rows_written + 1))?;
        writer.write_all(b"\n").context("Writing DJSON output")?;
        rows_written += 1;
    }
    Ok(rows_written)
}

fn read_csv_rows(
    input: &Path,
    report: &DetectionReport,
    opts: &DetectionOptions,
    rows: SyncSender<Row>,
    errors: SyncSender<String>,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Opening input file {input:?}"))?;
    let mut reader = BufReader::with_capacity(1 << 20, file);
    let delimiter = report
        .delimiter
        .as_ref()
        .map(|info| info.codepoint)
        .unwrap_or(',');
    let field_count = report.columns.len();

    let mut buf = Vec::new();
    // Physical line counter: comments and the header are counted too.
    let mut line_number = 0usize;
    let mut skipped_header = false;

    loop {
        match read_logical_line(&mut reader, &mut buf, opts.max_line_bytes)? {
            LineRead::Eof => break,
            LineRead::Overflow => {
                line_number += 1;
                let message = format!(
                    "invalid line {line_number}: exceeds maximum line length of {} bytes",
                    opts.max_line_bytes
                );
                if errors.send(message).is_err() {
                    return Ok(());
                }
                continue;
            }
            LineRead::Line => line_number += 1,
        }

        let line = String::from_utf8_lossy(&buf);
        if let Some(prefix) = &report.comment
            && line.trim_start().starts_with(prefix.as_str())
        {
            continue;
        }

        let (fields, invalid) = split_line_fields(&line, delimiter);
        if invalid {
            if errors
                .send(format!("invalid line {line_number}: {line}"))
                .is_err()
            {
                return Ok(());
            }
            continue;
        }
        if fields.len() != field_count {
            let message = format!(
                "invalid line {line_number}: expected {field_count} fields, got {}",
                fields.len()
            );
            if errors.send(message).is_err() {
                return Ok(());
            }
            continue;
        }

        if report.has_header && !skipped_header {
            skipped_header = true;
            continue;
        }

        let row: Row = fields
            .into_iter()
            .map(|field| CellSlot::Raw(field.trim().to_string()))
            .collect();
        if rows.send(row).is_err() {
            // Writer stopped; its error is the operation outcome.
            return Ok(());
        }
    }
    Ok(())
}

fn read_jsonl_rows(
    input: &Path,
    report: &DetectionReport,
    opts: &DetectionOptions,
    rows: SyncSender<Row>,
    errors: SyncSender<String>,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Opening input file {input:?}"))?;
    let mut reader = BufReader::with_capacity(1 << 20, file);

    let mut buf = Vec::new();
    let mut line_number = 0usize;

    loop {
        match read_logical_line(&mut reader, &mut buf, opts.max_line_bytes)? {
            LineRead::Eof => break,
            LineRead::Overflow => {
                line_number += 1;
                let message = format!(
                    "invalid line {line_number}: exceeds maximum line length of {} bytes",
                    opts.max_line_bytes
                );
                if errors.send(message).is_err() {
                    return Ok(());
                }
                continue;
            }
            LineRead::Line => line_number += 1,
        }

        let line = String::from_utf8_lossy(&buf);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Map<String, JsonValue>>(trimmed) {
            Ok(object) => {
                let row = object_row(&report.columns, &object);
                if rows.send(row).is_err() {
                    return Ok(());
                }
            }
            Err(err) => {
                if errors
                    .send(format!("invalid line {line_number}: {err}"))
                    .is_err()
                {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

fn convert_json_array(
    input: &Path,
    report: &DetectionReport,
    writer: &mut BufWriter<File>,
) -> Result<(u64, Vec<String>)> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Reading input file {input:?}"))?;
    let array: Vec<Map<String, JsonValue>> = serde_json::from_str(text.trim())
        .context("Decoding top-level JSON array of objects")?;

    let mut rows_written = 0u64;
    for object in &array {
        let row = object_row(&report.columns, object);
        let record = DjsonRow {
            columns: &report.columns,
            cells: &row,
        };
        serde_json::to_writer(&mut *writer, &record)
            .with_context(|| format!("Encoding row {}", rows_written + 1))?;
        writer.write_all(b"\n").context("Writing DJSON output")?;
        rows_written += 1;
    }
    Ok((rows_written, Vec::new()))
}

/// Projects a JSON object onto the detected columns: string cells are coerced
/// like CSV fields, native values pass through, and absent keys render the
/// column's typed default.
fn object_row(columns: &[Column], object: &Map<String, JsonValue>) -> Row {
    columns
        .iter()
        .map(|column| match object.get(&column.name) {
            Some(JsonValue::String(text)) => CellSlot::Raw(text.clone()),
            Some(value) => CellSlot::Native(value.clone()),
            None => CellSlot::Raw(String::new()),
        })
        .collect()
}

struct DjsonRow<'a> {
    columns: &'a [Column],
    cells: &'a [CellSlot],
}

impl Serialize for DjsonRow<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            match cell {
                CellSlot::Raw(raw) => {
                    map.serialize_entry(&column.name, &coerce(raw, column.column_type))?;
                }
                CellSlot::Native(value) => {
                    map.serialize_entry(&column.name, value)?;
                }
            }
        }
        map.end()
    }
}

/// Coerces a raw field to its column type. Failures are silent and emit the
/// type's default; only structural failures reach the error channel.
pub fn coerce(raw: &str, column_type: ColumnType) -> CellValue {
    let trimmed = raw.trim();
    match column_type {
        ColumnType::Int => CellValue::Int(trimmed.parse().unwrap_or(0)),
        ColumnType::Double => CellValue::Double(trimmed.parse().unwrap_or(0.0)),
        ColumnType::Boolean => CellValue::Bool(parse_strict_bool(trimmed).unwrap_or(false)),
        ColumnType::Timestamp => CellValue::Timestamp(
            parse_date_value(trimmed)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ),
        ColumnType::Text => CellValue::Text(trimmed.to_string()),
    }
}

fn parse_strict_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
