//! PSTrace Studio
//!
//! SQL profiling and execution-path analysis for PeopleSoft
//! performance trace files.
//!
//! This crate provides the core implementation for the
//! `pstrace` CLI tool: per-format line processors that rebuild
//! SQL statement activity (binds, fetches, timing, errors) and
//! the execution-call tree from application-engine, generic SQL
//! and batch-timings trace logs.
//!
//! ## Getting Started
//!
//! Most users should install and use the CLI:
//!
//! ```bash
//! cargo install pstrace-studio
//! pstrace --help
//! ```

pub mod aggregator;
pub mod commands;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod processors;
pub mod utils;
