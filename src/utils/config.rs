//! Configuration and constants for the trace pipeline.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

// Return-code conventions shared by all trace formats.
// A fetch with RTNCD_OK retrieved a row; RTNCD_END is the end-of-result
// marker; anything else is a database error surfaced in the trace.
pub const RTNCD_OK: i32 = 0;
pub const RTNCD_END: i32 = 1;

/// Legacy bind type code meaning "emit the value without quotes".
/// Inherited from the TraceSQL type-code table; other codes imply quoting.
pub const UNQUOTED_BIND_TYPE: i32 = 19;

// Banner text on line one of a generic `.trc` file decides which
// processor set handles it.
pub const TRACESQL_BANNER: &str = "AE SQL/PeopleCode Trace";
pub const COBOL_BANNER: &str = "PeopleSoft Batch Timings Report";

/// Progress is reported roughly this many times per run (once per
/// percent of total lines), throttled so huge files do not flood the
/// observer.
pub const PROGRESS_STEPS: u64 = 100;
