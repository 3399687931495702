//! Run driver: format sniffing, processor dispatch, progress, cancel.
//!
//! A run reads one trace file line by line and feeds every line to the
//! format's ordered processor set. Progress is reported in whole
//! percents against a pre-counted line total, and a shared cancellation
//! token is polled between lines so a worker thread can stop a long run
//! promptly.

pub mod worker;

pub use worker::{spawn_run, RunEvent, RunHandle};

use crate::model::TraceData;
use crate::processors::{
    AetExecutionPathProcessor, AetSqlProcessor, CobolExecutionPathProcessor, CobolSqlProcessor,
    TraceProcessor, TraceSqlExecutionPathProcessor, TraceSqlProcessor,
};
use crate::utils::config::{COBOL_BANNER, PROGRESS_STEPS, TRACESQL_BANNER};
use crate::utils::error::ProcessError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Recognized trace file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceType {
    /// Application Engine trace (`.aet`)
    Aet,
    /// Generic SQL trace (`.tracesql`, or `.trc` with the AE banner)
    TraceSql,
    /// Batch timings report (`.trc` with the batch banner)
    Cobol,
}

/// Outcome of a processing run
#[derive(Debug)]
pub enum RunOutcome {
    /// Run reached end of file; completion hooks have fired
    Completed(TraceData),
    /// Run was cancelled mid-file; no completion hooks, data discarded
    Cancelled,
}

/// Shared cancel flag, cloned into the worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Determine the trace format of a file from its extension, falling
/// back to the first-line banner for the shared `.trc` extension.
///
/// # Errors
/// * `ProcessError::UnknownFormat` - extension and banner both
///   unrecognized
pub fn sniff_format(path: &Path) -> Result<TraceType, ProcessError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "aet" => Ok(TraceType::Aet),
        "tracesql" => Ok(TraceType::TraceSql),
        "trc" => {
            // .trc is ambiguous: AE server traces and batch timings
            // reports share it. The first line settles it.
            let file = File::open(path)?;
            let mut reader = BufReader::new(file);
            let mut first_line = String::new();
            reader.read_line(&mut first_line)?;

            if first_line.contains(TRACESQL_BANNER) {
                Ok(TraceType::TraceSql)
            } else if first_line.contains(COBOL_BANNER) {
                Ok(TraceType::Cobol)
            } else {
                Err(ProcessError::UnknownFormat(format!(
                    "{}: .trc file carries neither known banner",
                    path.display()
                )))
            }
        }
        other => Err(ProcessError::UnknownFormat(format!(
            "{}: unsupported extension '{other}'",
            path.display()
        ))),
    }
}

/// Build the ordered processor set for a format.
///
/// Order matters: the SQL processor must run before the path processor
/// for every format (path SQL nodes link to the last parsed statement).
pub fn processor_set(trace_type: TraceType) -> Vec<Box<dyn TraceProcessor>> {
    match trace_type {
        TraceType::Aet => vec![
            Box::new(AetSqlProcessor::new()),
            Box::new(AetExecutionPathProcessor::new()),
        ],
        TraceType::TraceSql => vec![
            Box::new(TraceSqlProcessor::new()),
            Box::new(TraceSqlExecutionPathProcessor::new()),
        ],
        TraceType::Cobol => vec![
            Box::new(CobolSqlProcessor::new()),
            Box::new(CobolExecutionPathProcessor::new()),
        ],
    }
}

/// Process a trace file, sniffing its format first.
pub fn process_file(
    path: &Path,
    cancel: &CancellationToken,
    progress: impl FnMut(u8),
) -> Result<RunOutcome, ProcessError> {
    let trace_type = sniff_format(path)?;
    process_file_as(path, trace_type, cancel, progress)
}

/// Process a trace file with a known format.
///
/// The file is scanned once up front to count lines so progress can be
/// reported in whole percents, then read again and dispatched line by
/// line to every processor in registration order. The cancel token is
/// polled before each line; a cancelled run returns without invoking
/// the completion hooks.
pub fn process_file_as(
    path: &Path,
    trace_type: TraceType,
    cancel: &CancellationToken,
    mut progress: impl FnMut(u8),
) -> Result<RunOutcome, ProcessError> {
    info!("Processing {} as {:?}", path.display(), trace_type);

    let line_count = count_lines(path)?;
    debug!("Counted {line_count} lines");

    let report_increment = (line_count / PROGRESS_STEPS).max(1);

    let mut data = TraceData::new();
    let mut processors = processor_set(trace_type);
    for processor in processors.iter_mut() {
        processor.init(&mut data);
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut line_number: u64 = 0;
    for line in reader.lines() {
        if cancel.is_requested() {
            info!("Run cancelled at line {line_number}");
            return Ok(RunOutcome::Cancelled);
        }

        let line = line?;
        line_number += 1;

        for processor in processors.iter_mut() {
            processor.process_line(&line, line_number, &mut data)?;
        }

        if line_number % report_increment == 0 {
            let percent = if line_count == 0 {
                100
            } else {
                ((line_number * 100) / line_count).min(100) as u8
            };
            progress(percent);
        }
    }

    for processor in processors.iter_mut() {
        processor.complete(&mut data);
    }
    progress(100);

    info!(
        "Run complete: {} statements, {} calls",
        data.statements.len(),
        data.calls.len()
    );

    Ok(RunOutcome::Completed(data))
}

fn count_lines(path: &Path) -> Result<u64, ProcessError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut count: u64 = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_trace(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_sniff_by_extension() {
        let aet = temp_trace(".aet", "");
        let tracesql = temp_trace(".tracesql", "");
        assert_eq!(sniff_format(aet.path()).unwrap(), TraceType::Aet);
        assert_eq!(sniff_format(tracesql.path()).unwrap(), TraceType::TraceSql);
    }

    #[test]
    fn test_sniff_trc_by_banner() {
        let online = temp_trace(".trc", "PeopleTools 8.59 - AE SQL/PeopleCode Trace\n");
        let batch = temp_trace(".trc", "PeopleSoft Batch Timings Report\n");
        assert_eq!(sniff_format(online.path()).unwrap(), TraceType::TraceSql);
        assert_eq!(sniff_format(batch.path()).unwrap(), TraceType::Cobol);
    }

    #[test]
    fn test_sniff_rejects_unknown() {
        let mystery = temp_trace(".log", "hello\n");
        let bare_trc = temp_trace(".trc", "no banner here\n");
        assert!(matches!(
            sniff_format(mystery.path()),
            Err(ProcessError::UnknownFormat(_))
        ));
        assert!(matches!(
            sniff_format(bare_trc.path()),
            Err(ProcessError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_cancelled_run_skips_completion() {
        let trace = temp_trace(
            ".tracesql",
            "1-1  11.55.51.039 Cur#1.7340.HRDMO RC=0 Dur=0.000093 COM Stmt=SELECT A FROM PS_FOO\n",
        );
        let cancel = CancellationToken::new();
        cancel.request();

        let outcome = process_file(trace.path(), &cancel, |_| {}).expect("run");
        assert!(matches!(outcome, RunOutcome::Cancelled));
    }

    #[test]
    fn test_completed_run_reports_full_progress() {
        let trace = temp_trace(
            ".tracesql",
            "1-1  11.55.51.039 Cur#1.7340.HRDMO RC=0 Dur=0.000093 COM Stmt=SELECT A FROM PS_FOO\n\
             1-2  11.55.51.040 Cur#1.7340.HRDMO RC=0 Dur=0.000455 EXE\n",
        );
        let cancel = CancellationToken::new();
        let mut last_percent = 0;

        let outcome =
            process_file(trace.path(), &cancel, |p| last_percent = p).expect("run");
        let RunOutcome::Completed(data) = outcome else {
            panic!("expected completed run");
        };

        assert_eq!(last_percent, 100);
        assert_eq!(data.statements.len(), 1);
        assert!(!data.statistics.is_empty());
    }
}
