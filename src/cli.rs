use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "qcparser",
    author,
    version,
    about = "Detect tabular file formats and convert them to DJSON",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect file format, delimiter, schema, and quality; print a JSON report
    Detect(DetectArgs),
    /// Convert a detected file into newline-delimited JSON (DJSON)
    Convert(ConvertArgs),
    /// Print the qcparser version
    Version,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Path of the file to inspect
    #[arg(long = "file")]
    pub file: Option<PathBuf>,
    /// Upper bound on bytes read during detection
    #[arg(long = "sample-bytes")]
    pub sample_bytes: Option<u64>,
    /// Upper bound on preview rows and on the lines examined for scoring
    #[arg(long = "max-preview-rows")]
    pub max_preview_rows: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input file path
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Output DJSON file path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}
