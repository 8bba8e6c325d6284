//! Command-line interface for revival-scout.
//!
//! Provides commands to run collection jobs, score a single repository,
//! inspect rate-limit quotas and list stored jobs.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
