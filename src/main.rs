//! PSTrace Studio CLI
//!
//! A trace analysis tool for PeopleSoft trace files.
//! Builds SQL statement models, execution call trees and summary
//! statistics from `.aet`, `.tracesql` and `.trc` traces.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use pstrace_studio::commands::{execute_analyze, validate_args, AnalyzeArgs};
use pstrace_studio::utils::config::SCHEMA_VERSION;
use std::path::PathBuf;

/// PSTrace Studio - trace analysis for PeopleSoft trace files
#[derive(Parser, Debug)]
#[command(name = "pstrace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a trace file and write a JSON report
    Analyze {
        /// Path to the trace file (.aet, .tracesql or .trc)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Number of top statements to include
        #[arg(long, default_value = "20")]
        top_statements: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            top_statements,
            summary,
        } => {
            let args = AnalyzeArgs {
                input,
                output,
                top_statements,
                print_summary: summary,
            };

            validate_args(&args)?;
            execute_analyze(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// Validate a report JSON file
///
/// **Private** - internal command implementation
fn validate_report_file(file_path: PathBuf) -> Result<()> {
    use pstrace_studio::output::read_report;

    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    println!("✓ Valid report JSON");
    println!("  Version:    {}", report.version);
    println!("  Source:     {}", report.source_file);
    println!("  Statements: {}", report.statement_count);
    println!("  Calls:      {}", report.call_count);
    println!("  Statistics: {}", report.statistics.len());

    Ok(())
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("pstrace {}", env!("CARGO_PKG_VERSION"));
    println!("Report schema version: {SCHEMA_VERSION}");
}
