//! Bounded sampling of logical lines for detection.
//!
//! The sampler is what keeps detection O(1) in file length: it reads up to a
//! byte budget (or a derived line budget), splits on LF/CRLF across buffer
//! boundaries, strips the BOM from the first line, and validates UTF-8. The
//! converter reuses [`read_logical_line`] so both passes agree on what a line
//! is.

use std::io::{self, BufRead};

use anyhow::Result;
use encoding_rs::UTF_8;

use crate::{error::FatalError, options::DetectionOptions};

/// Sampled lines plus the content bytes consumed (newlines excluded).
#[derive(Debug, Clone)]
pub struct Sample {
    pub lines: Vec<String>,
    pub bytes: u64,
}

pub(crate) enum LineRead {
    Eof,
    Line,
    /// The line exceeded the byte cap; its content was discarded but the
    /// stream is positioned after its newline.
    Overflow,
}

/// Reads one logical line into `buf` (cleared first), handling CRLF and lines
/// that span internal buffer refills. Content longer than `max_line_bytes`
/// yields [`LineRead::Overflow`] with the remainder of the line consumed.
pub(crate) fn read_logical_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_line_bytes: usize,
) -> io::Result<LineRead> {
    buf.clear();
    let mut overflowed = false;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            if overflowed {
                return Ok(LineRead::Overflow);
            }
            if buf.is_empty() {
                return Ok(LineRead::Eof);
            }
            strip_carriage_return(buf);
            return Ok(LineRead::Line);
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            if !overflowed {
                buf.extend_from_slice(&available[..pos]);
            }
            reader.consume(pos + 1);
            if overflowed || buf.len() > max_line_bytes {
                return Ok(LineRead::Overflow);
            }
            strip_carriage_return(buf);
            return Ok(LineRead::Line);
        }
        if !overflowed {
            buf.extend_from_slice(available);
            if buf.len() > max_line_bytes {
                overflowed = true;
                buf.clear();
            }
        }
        let consumed = available.len();
        reader.consume(consumed);
    }
}

fn strip_carriage_return(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
}

/// Samples logical lines until the byte budget, the derived line budget, or
/// EOF. Fails with `LINE_TOO_LONG` or `ENCODING_NOT_UTF8` per the options.
pub fn sample_lines<R: BufRead>(reader: &mut R, opts: &DetectionOptions) -> Result<Sample> {
    let line_budget = opts.sample_line_budget();
    let mut lines: Vec<String> = Vec::new();
    let mut total: u64 = 0;
    let mut buf = Vec::new();

    while total < opts.sample_bytes && lines.len() < line_budget {
        match read_logical_line(reader, &mut buf, opts.max_line_bytes)? {
            LineRead::Eof => break,
            LineRead::Overflow => {
                return Err(FatalError::LineTooLong {
                    line: lines.len() + 1,
                    limit: opts.max_line_bytes,
                }
                .into());
            }
            LineRead::Line => {
                total += buf.len() as u64;
                lines.push(decode_utf8_line(&buf, opts.assume_utf8)?);
            }
        }
    }

    if let Some(first) = lines.first_mut()
        && let Some(stripped) = first.strip_prefix('\u{feff}')
    {
        *first = stripped.to_string();
    }

    Ok(Sample {
        lines,
        bytes: total,
    })
}

fn decode_utf8_line(bytes: &[u8], assume_utf8: bool) -> Result<String> {
    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if had_errors && assume_utf8 {
        return Err(FatalError::EncodingNotUtf8.into());
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_str(input: &str, opts: &DetectionOptions) -> Sample {
        sample_lines(&mut Cursor::new(input.as_bytes()), opts).expect("sample")
    }

    #[test]
    fn splits_lf_and_crlf_lines() {
        let opts = DetectionOptions::default();
        let sample = sample_str("a,b\r\nc,d\ne,f", &opts);
        assert_eq!(sample.lines, vec!["a,b", "c,d", "e,f"]);
        assert_eq!(sample.bytes, 9);
    }

    #[test]
    fn strips_bom_from_first_line_only() {
        let opts = DetectionOptions::default();
        let sample = sample_str("\u{feff}id,name\n\u{feff}1,x\n", &opts);
        assert_eq!(sample.lines[0], "id,name");
        assert_eq!(sample.lines[1], "\u{feff}1,x");
    }

    #[test]
    fn stops_at_byte_budget() {
        let opts = DetectionOptions {
            sample_bytes: 8,
            ..DetectionOptions::default()
        };
        let sample = sample_str("aaaa\nbbbb\ncccc\ndddd\n", &opts);
        assert_eq!(sample.lines.len(), 2);
        assert_eq!(sample.bytes, 8);
    }

    #[test]
    fn stops_at_line_budget() {
        let opts = DetectionOptions {
            max_preview_rows: 2,
            ..DetectionOptions::default()
        };
        let sample = sample_str("1\n2\n3\n4\n5\n6\n", &opts);
        assert_eq!(sample.lines.len(), 4);
    }

    #[test]
    fn over_long_line_is_fatal() {
        let opts = DetectionOptions {
            max_line_bytes: 4,
            ..DetectionOptions::default()
        };
        let err = sample_lines(&mut Cursor::new(b"abcdefgh\nij\n".as_slice()), &opts)
            .expect_err("line too long");
        let fatal = err.downcast_ref::<FatalError>().expect("fatal error");
        assert_eq!(fatal.code(), "LINE_TOO_LONG");
    }

    #[test]
    fn invalid_utf8_is_fatal_when_assumed() {
        let opts = DetectionOptions::default();
        let err = sample_lines(&mut Cursor::new(b"ok\n\xff\xfe\n".as_slice()), &opts)
            .expect_err("invalid utf-8");
        let fatal = err.downcast_ref::<FatalError>().expect("fatal error");
        assert_eq!(fatal.code(), "ENCODING_NOT_UTF8");
    }

    #[test]
    fn invalid_utf8_is_replaced_when_not_assumed() {
        let opts = DetectionOptions {
            assume_utf8: false,
            ..DetectionOptions::default()
        };
        let sample = sample_lines(&mut Cursor::new(b"a\n\xffb\n".as_slice()), &opts)
            .expect("lossy decode");
        assert_eq!(sample.lines.len(), 2);
        assert!(sample.lines[1].contains('\u{fffd}'));
    }

    #[test]
    fn final_line_without_newline_is_kept() {
        let opts = DetectionOptions::default();
        let sample = sample_str("x,y\nz,w", &opts);
        assert_eq!(sample.lines.len(), 2);
        assert_eq!(sample.lines[1], "z,w");
    }
}
