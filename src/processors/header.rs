//! Fixed-width line-header decoder for batch (COBOL) timings reports.
//!
//! Every event line in a batch timings report starts with the same
//! fixed-byte-offset column layout. Decoding is a pure, stateless
//! transform shared by both COBOL processors. Callers must gate on a
//! coarse line predicate first; the decoder does no event recognition
//! of its own, and any column that fails to slice or parse is a fatal
//! data-integrity error.

use crate::utils::error::ProcessError;

// Column byte offsets of the batch timings layout
const TIME: (usize, usize) = (0, 12);
const LINE_TAG: (usize, usize) = (14, 23);
const ELAPSED: (usize, usize) = (26, 33);
const SQL_TIME: (usize, usize) = (36, 43);
const CURSOR: (usize, usize) = (47, 53);
const RETURN_CODE: (usize, usize) = (56, 60);

/// Decoded header columns of one batch trace line
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLineHeader {
    /// Wall-clock timestamp text, as printed
    pub time: String,
    /// Source line tag of the traced program
    pub line_tag: String,
    /// Elapsed time for the event, seconds
    pub duration: f64,
    /// SQL time column, seconds (used by compile+execute lines)
    pub sql_duration: f64,
    pub cursor: i64,
    pub rc_number: i32,
}

impl BatchLineHeader {
    /// Decode the fixed-width columns of `line`.
    pub fn decode(line: &str, line_number: u64) -> Result<Self, ProcessError> {
        let time = column(line, TIME, "time", line_number)?.to_string();
        let line_tag = column(line, LINE_TAG, "line tag", line_number)?.to_string();
        let duration = parse_column(line, ELAPSED, "elapsed time", line_number)?;
        let sql_duration = parse_column(line, SQL_TIME, "SQL time", line_number)?;
        let cursor = parse_column(line, CURSOR, "cursor", line_number)?;
        let rc_number = parse_column(line, RETURN_CODE, "return code", line_number)?;

        Ok(Self {
            time,
            line_tag,
            duration,
            sql_duration,
            cursor,
            rc_number,
        })
    }
}

fn column<'a>(
    line: &'a str,
    (start, end): (usize, usize),
    name: &str,
    line_number: u64,
) -> Result<&'a str, ProcessError> {
    line.get(start..end)
        .map(str::trim)
        .ok_or_else(|| ProcessError::HeaderDecode {
            line_number,
            detail: format!("{name} column {start}..{end} out of range"),
        })
}

fn parse_column<T: std::str::FromStr>(
    line: &str,
    range: (usize, usize),
    name: &str,
    line_number: u64,
) -> Result<T, ProcessError> {
    let text = column(line, range, name, line_number)?;
    text.parse().map_err(|_| ProcessError::HeaderDecode {
        line_number,
        detail: format!("{name} column is not numeric: {text:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Build a line matching the fixed column layout
    fn batch_line(payload: &str) -> String {
        format!(
            "{:<12}  {:<9}   {:>7}   {:>7}    {:>6}   {:>4} {}",
            "12:30:01.250", "SQLRT.320", "0.123", "0.050", "2", "0", payload
        )
    }

    #[test]
    fn test_decode_valid_header() {
        let line = batch_line("COM Stmt=SELECT 1 FROM DUAL");
        let header = BatchLineHeader::decode(&line, 1).unwrap();

        assert_eq!(header.time, "12:30:01.250");
        assert_eq!(header.line_tag, "SQLRT.320");
        assert_eq!(header.duration, 0.123);
        assert_eq!(header.sql_duration, 0.050);
        assert_eq!(header.cursor, 2);
        assert_eq!(header.rc_number, 0);
    }

    #[test]
    fn test_decode_short_line_fails() {
        let err = BatchLineHeader::decode("too short", 7).unwrap_err();
        match err {
            ProcessError::HeaderDecode { line_number, .. } => assert_eq!(line_number, 7),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_non_numeric_column_fails() {
        let line = batch_line("EXE").replace("0.123", "xx.yy");
        assert!(BatchLineHeader::decode(&line, 3).is_err());
    }
}
