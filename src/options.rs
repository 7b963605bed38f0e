//! Caller-supplied detection options and their defaults.

pub const DEFAULT_SAMPLE_BYTES: u64 = 1 << 20;
pub const DEFAULT_MAX_PREVIEW_ROWS: usize = 50;
pub const DEFAULT_MAX_LINE_BYTES: usize = 32 << 20;

/// Knobs for the detection pass. Immutable once constructed; the detector and
/// converter take them by shared reference.
#[derive(Debug, Clone)]
pub struct DetectionOptions {
    /// Upper bound on bytes consumed while sampling.
    pub sample_bytes: u64,
    /// Upper bound on preview rows and on the lines examined for scoring.
    pub max_preview_rows: usize,
    /// Safety cap on a single logical line.
    pub max_line_bytes: usize,
    /// Single-codepoint delimiters to score, in priority order.
    pub candidate_delimiters: Vec<char>,
    /// Line-leading tokens that mark a line as a comment.
    pub comment_prefixes: Vec<String>,
    /// Fail detection when the sample is not valid UTF-8.
    pub assume_utf8: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            max_preview_rows: DEFAULT_MAX_PREVIEW_ROWS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            candidate_delimiters: vec![',', '|', '\t', ';'],
            comment_prefixes: vec!["#".to_string(), "//".to_string(), "--".to_string()],
            assume_utf8: true,
        }
    }
}

impl DetectionOptions {
    /// Raw-line budget for the sampler: twice the preview bound, so the jsonl
    /// classifier can reach its candidate threshold past interleaved comments
    /// and blanks.
    pub fn sample_line_budget(&self) -> usize {
        self.max_preview_rows.saturating_mul(2)
    }
}
