//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that abort a trace-processing run.
///
/// Line-local conditions (unmatched lines, in-data SQL errors) are not
/// errors; they are absorbed into the data model. Everything here is a
/// structural fault after which the result would be corrupt.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("I/O error reading trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line_number}: fixed-width header decode failed: {detail}")]
    HeaderDecode { line_number: u64, detail: String },

    #[error("line {line_number}: {event} references cursor {cursor} with no open statement")]
    CursorState {
        line_number: u64,
        cursor: i64,
        event: &'static str,
    },

    #[error("line {line_number}: statement event seen before any parsed statement; the SQL processor must be registered ahead of the execution-path processor")]
    ProcessorOrder { line_number: u64 },

    #[error("unrecognized trace format: {0}")]
    UnknownFormat(String),
}

/// Errors that can occur during report output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
