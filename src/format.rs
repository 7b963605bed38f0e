//! Comment classification and the csv / jsonl / json format classifier.

use serde_json::{Map, Value};

use crate::{options::DetectionOptions, report::FileFormat};

/// A line is a comment when it is blank after trimming or starts with any of
/// the configured prefixes.
pub fn is_comment_line(line: &str, prefixes: &[String]) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || prefixes.iter().any(|prefix| trimmed.starts_with(prefix.as_str()))
}

/// Classifies the sample. A leading `[` on the first non-ignored line wins
/// immediately; jsonl needs every examined non-ignored line to parse as a
/// JSON object, with `max_preview_rows` candidates short-circuiting. Files
/// mixing object lines with junk fall back to csv.
pub fn classify(lines: &[String], opts: &DetectionOptions) -> FileFormat {
    let mut non_empty = 0usize;
    let mut jsonl_candidates = 0usize;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            continue;
        }
        if is_comment_line(trimmed, &opts.comment_prefixes) {
            continue;
        }
        non_empty += 1;
        if non_empty == 1 && trimmed.starts_with('[') {
            return FileFormat::Json;
        }
        if trimmed.starts_with('{')
            && serde_json::from_str::<Map<String, Value>>(trimmed).is_ok()
        {
            jsonl_candidates += 1;
            if jsonl_candidates >= opts.max_preview_rows {
                return FileFormat::Jsonl;
            }
        }
        if non_empty >= opts.max_preview_rows {
            break;
        }
    }

    if non_empty > 0 && jsonl_candidates == non_empty {
        return FileFormat::Jsonl;
    }
    FileFormat::Csv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn comment_lines_match_configured_prefixes() {
        let prefixes = DetectionOptions::default().comment_prefixes;
        assert!(is_comment_line("# generated", &prefixes));
        assert!(is_comment_line("  // note", &prefixes));
        assert!(is_comment_line("-- sql style", &prefixes));
        assert!(is_comment_line("   ", &prefixes));
        assert!(!is_comment_line("a,b,c", &prefixes));
        assert!(!is_comment_line("-5,3", &prefixes));
    }

    #[test]
    fn leading_bracket_classifies_as_json() {
        let opts = DetectionOptions::default();
        let sample = lines(&["# header comment", "[", "  {\"id\": 1}", "]"]);
        assert_eq!(classify(&sample, &opts), FileFormat::Json);
    }

    #[test]
    fn uniform_object_lines_classify_as_jsonl() {
        let opts = DetectionOptions::default();
        let sample = lines(&["{\"id\":1,\"name\":\"A\"}", "{\"id\":2,\"name\":\"B\"}"]);
        assert_eq!(classify(&sample, &opts), FileFormat::Jsonl);
    }

    #[test]
    fn object_lines_mixed_with_junk_fall_back_to_csv() {
        let opts = DetectionOptions::default();
        let sample = lines(&["{\"id\":1}", "a,b,c", "{\"id\":2}"]);
        assert_eq!(classify(&sample, &opts), FileFormat::Csv);
    }

    #[test]
    fn plain_rows_classify_as_csv() {
        let opts = DetectionOptions::default();
        let sample = lines(&["name,age", "Alice,30", "Bob,25"]);
        assert_eq!(classify(&sample, &opts), FileFormat::Csv);
    }

    #[test]
    fn empty_array_literal_is_ignored() {
        let opts = DetectionOptions::default();
        let sample = lines(&["[]", "a,b", "1,2"]);
        assert_eq!(classify(&sample, &opts), FileFormat::Csv);
    }

    #[test]
    fn empty_sample_classifies_as_csv() {
        let opts = DetectionOptions::default();
        assert_eq!(classify(&[], &opts), FileFormat::Csv);
    }
}
