//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Sniffs the trace file format
//! 2. Processes it on a background worker, printing progress
//! 3. Builds the report
//! 4. Writes the JSON output file
//! 5. Optionally prints a text summary

use crate::output::{build_report, write_report, Report};
use crate::pipeline::{sniff_format, spawn_run, RunEvent};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Path to the trace file
    pub input: PathBuf,

    /// Output path for JSON report
    pub output: PathBuf,

    /// Number of top statements to include in the report
    pub top_statements: usize,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::from("report.json"),
            top_statements: 20,
            print_summary: false,
        }
    }
}

/// Validate analyze arguments before starting a run
///
/// **Public** - called from main.rs ahead of execute_analyze
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    if args.top_statements == 0 {
        anyhow::bail!("top_statements must be greater than 0");
    }

    if args.top_statements > 1000 {
        anyhow::bail!("top_statements is too large (max 1000)");
    }

    Ok(())
}

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unknown trace format
/// * Processing faults (broken header, cursor state)
/// * File write errors
pub fn execute_analyze(args: AnalyzeArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Analyzing trace: {}", args.input.display());

    let trace_type = sniff_format(&args.input).context("Failed to determine trace format")?;
    info!("Detected format: {trace_type:?}");

    let handle = spawn_run(args.input.clone());

    let mut data = None;
    let mut last_printed: u8 = 0;
    for event in handle.events().iter() {
        match event {
            RunEvent::Progress(percent) => {
                // Throttle stdout to every 10 percent
                if percent >= last_printed.saturating_add(10) || percent == 100 {
                    println!("Processing... {percent}%");
                    last_printed = percent;
                }
            }
            RunEvent::Completed(result) => {
                data = Some(result);
                break;
            }
            RunEvent::Cancelled => anyhow::bail!("Run was cancelled"),
            RunEvent::Failed(error) => {
                return Err(error).context("Failed to process trace file")
            }
        }
    }
    handle.join();

    let data = data.context("Worker exited without a terminal event")?;
    debug!(
        "Run produced {} statements, {} calls",
        data.statements.len(),
        data.calls.len()
    );

    let source = args.input.display().to_string();
    let report = build_report(&data, &source, args.top_statements);

    write_report(&report, &args.output).context("Failed to write JSON report")?;

    if args.print_summary {
        print_summary(&report);
    }

    let elapsed = start_time.elapsed();
    info!("Analysis complete in {:.2}s", elapsed.as_secs_f64());
    println!("Report written to {}", args.output.display());

    Ok(())
}

/// Print a text summary of the report to stdout
///
/// **Private** - internal helper for --summary
fn print_summary(report: &Report) {
    println!();
    println!("=== Trace Summary ===");
    println!("Source:     {}", report.source_file);
    println!("Statements: {}", report.statement_count);
    println!("Calls:      {}", report.call_count);
    println!();

    for item in &report.statistics {
        println!("{:<24} {}", item.label, item.value);
    }

    if !report.top_statements.is_empty() {
        println!();
        println!("Top statements by total time:");
        for summary in &report.top_statements {
            let total = summary.exec_time + summary.fetch_time;
            let kind = summary.sql_type.as_deref().unwrap_or("OTHER");
            let mut text = summary.statement.replace('\n', " ");
            if text.len() > 60 {
                text.truncate(60);
                text.push_str("...");
            }
            println!(
                "  {:>10.6}s  {:<6} {}  {}",
                total, kind, summary.sql_id, text
            );
        }
    }
}
