//! Delimiter inference over sampled lines.
//!
//! Every candidate delimiter gets a quote-aware walk over the sample:
//!
//! - **Line analysis**: `"` toggles quote state (doubled `""` inside quotes is
//!   an escaped literal), the candidate outside quotes splits fields, the
//!   candidate inside quotes marks the line quote-affected, and an unclosed
//!   quote at end of line marks it invalid.
//! - **Statistics**: field-count mode and coverage, population standard
//!   deviation, invalid and quote-affected rates.
//! - **Scoring**: a weighted sum favoring coverage, penalizing dispersion and
//!   invalid lines, and rewarding quote interaction.
//!
//! [`split_line_fields`] is the same walk materializing fields; the converter
//! must use it so scoring and conversion never disagree on structure.

use std::cmp::Ordering;

use itertools::Itertools;

use crate::format::is_comment_line;

/// Score gap below which the top two passing candidates are ambiguous.
pub const AMBIGUITY_EPSILON: f64 = 0.05;

const MIN_MODE_COLUMNS: usize = 2;
const MIN_MODE_COVERAGE: f64 = 0.80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineAnalysis {
    pub field_count: usize,
    pub invalid: bool,
    pub quote_affected: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelimiterStats {
    pub mode_columns: usize,
    pub mode_coverage: f64,
    pub field_count_stddev: f64,
    pub invalid_rate: f64,
    pub quote_affected_rate: f64,
    pub total_lines: usize,
    pub valid_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub coverage: f64,
    pub spread: f64,
    pub invalid: f64,
    pub quote: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            coverage: 0.65,
            spread: 0.20,
            invalid: 0.15,
            quote: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateResult {
    pub delimiter: char,
    pub stats: DelimiterStats,
    pub score: f64,
    pub passes_constraints: bool,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub winner: CandidateResult,
    pub runner_up: Option<CandidateResult>,
    pub is_ambiguous: bool,
    /// Observed score gap between winner and runner-up.
    pub ambiguity_epsilon: f64,
    pub eligible_count: usize,
    pub candidate_count: usize,
}

/// Walks a line's codepoints tracking quote state for one candidate
/// delimiter. The quote character is fixed to `"`.
pub fn analyze_line(line: &str, delimiter: char) -> LineAnalysis {
    let mut in_quote = false;
    let mut field_count = 1usize;
    let mut quote_affected = false;

    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quote && chars.peek() == Some(&'"') {
                chars.next();
                continue;
            }
            in_quote = !in_quote;
            continue;
        }
        if ch == delimiter {
            if in_quote {
                quote_affected = true;
            } else {
                field_count += 1;
            }
        }
    }

    LineAnalysis {
        field_count,
        invalid: in_quote,
        quote_affected: quote_affected && !in_quote,
    }
}

/// Splits a line into fields with the same quote rules as [`analyze_line`].
/// The boolean is true when the line ended inside an unterminated quote.
pub fn split_line_fields(line: &str, delimiter: char) -> (Vec<String>, bool) {
    let mut fields: Vec<String> = Vec::with_capacity(4);
    let mut current = String::new();
    let mut in_quotes = false;

    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
                continue;
            }
            in_quotes = !in_quotes;
            continue;
        }
        if ch == delimiter && !in_quotes {
            fields.push(std::mem::take(&mut current));
            continue;
        }
        current.push(ch);
    }
    fields.push(current);

    (fields, in_quotes)
}

fn analyze_delimiter(
    lines: &[String],
    delimiter: char,
    comment_prefixes: &[String],
) -> DelimiterStats {
    let total_lines = lines.len();
    let mut invalid = 0usize;
    let mut quote_affected = 0usize;
    let mut field_counts: Vec<usize> = Vec::with_capacity(total_lines);

    for line in lines {
        if is_comment_line(line, comment_prefixes) {
            continue;
        }
        let analysis = analyze_line(line, delimiter);
        if analysis.invalid {
            invalid += 1;
            continue;
        }
        field_counts.push(analysis.field_count);
        if analysis.quote_affected {
            quote_affected += 1;
        }
    }

    let mut stats = DelimiterStats {
        invalid_rate: ratio(invalid, total_lines),
        quote_affected_rate: ratio(quote_affected, total_lines),
        total_lines,
        valid_count: field_counts.len(),
        ..DelimiterStats::default()
    };
    if field_counts.is_empty() {
        return stats;
    }

    // Mode ties break toward the larger field count so reports are stable
    // across runs.
    let (mode_columns, mode_count) = field_counts
        .iter()
        .copied()
        .counts()
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .unwrap_or((0, 0));
    stats.mode_columns = mode_columns;
    stats.mode_coverage = mode_count as f64 / stats.valid_count as f64;

    let mean = field_counts.iter().sum::<usize>() as f64 / stats.valid_count as f64;
    let variance = field_counts
        .iter()
        .map(|&count| {
            let diff = count as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / stats.valid_count as f64;
    stats.field_count_stddev = variance.sqrt();

    stats
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn score(stats: &DelimiterStats, weights: &ScoreWeights) -> f64 {
    weights.coverage * stats.mode_coverage - weights.spread * stats.field_count_stddev
        - weights.invalid * stats.invalid_rate
        + weights.quote * stats.quote_affected_rate
}

fn meets_constraints(stats: &DelimiterStats) -> bool {
    stats.mode_columns >= MIN_MODE_COLUMNS && stats.mode_coverage >= MIN_MODE_COVERAGE
}

/// Scores every candidate delimiter against the sample.
pub fn evaluate_candidates(
    lines: &[String],
    delimiters: &[char],
    comment_prefixes: &[String],
) -> Vec<CandidateResult> {
    let weights = ScoreWeights::default();
    delimiters
        .iter()
        .map(|&delimiter| {
            let stats = analyze_delimiter(lines, delimiter, comment_prefixes);
            CandidateResult {
                delimiter,
                stats,
                score: score(&stats, &weights),
                passes_constraints: meets_constraints(&stats),
            }
        })
        .collect()
}

fn ranking(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(b.stats.mode_columns.cmp(&a.stats.mode_columns))
        .then(b.stats.mode_coverage.total_cmp(&a.stats.mode_coverage))
}

/// Picks the winner among passing candidates, falling back to the best
/// non-passing candidate with the ambiguous flag forced. Returns `None` only
/// when there were no candidates at all.
pub fn decide(candidates: &[CandidateResult]) -> Option<Decision> {
    if candidates.is_empty() {
        return None;
    }

    let mut passed: Vec<CandidateResult> = candidates
        .iter()
        .copied()
        .filter(|candidate| candidate.passes_constraints)
        .collect();

    if !passed.is_empty() {
        passed.sort_by(ranking);
        let winner = passed[0];
        let runner_up = passed.get(1).copied();
        let gap = runner_up
            .map(|runner_up| (winner.score - runner_up.score).abs())
            .unwrap_or(0.0);
        return Some(Decision {
            winner,
            runner_up,
            is_ambiguous: runner_up.is_some() && gap < AMBIGUITY_EPSILON,
            ambiguity_epsilon: gap,
            eligible_count: passed.len(),
            candidate_count: candidates.len(),
        });
    }

    let mut all = candidates.to_vec();
    all.sort_by(ranking);
    let winner = all[0];
    let runner_up = all.get(1).copied();
    let gap = runner_up
        .map(|runner_up| (winner.score - runner_up.score).abs())
        .unwrap_or(0.0);
    Some(Decision {
        winner,
        runner_up,
        is_ambiguous: true,
        ambiguity_epsilon: gap,
        eligible_count: 0,
        candidate_count: candidates.len(),
    })
}
