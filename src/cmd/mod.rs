//! Subcommand implementations. Each run function returns the process exit
//! code; failure messages come from the core outcomes verbatim.

pub mod alloc;
pub mod query;
pub mod subnet;
pub mod transfer;

use chrono::{DateTime, Utc};
use warden_common::ActionOutcome;

/// Timestamp format for tables and CSV exports
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(DATE_FORMAT).to_string()
}

pub fn format_opt_time(time: &Option<DateTime<Utc>>) -> String {
    time.as_ref().map(format_time).unwrap_or_default()
}

pub fn opt_str(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Print an outcome and map it to an exit code
pub fn finish(outcome: &ActionOutcome) -> i32 {
    if outcome.success {
        println!("{}", outcome.message);
        0
    } else {
        eprintln!("error: {}", outcome.message);
        1
    }
}

/// Print accumulated per-row errors and map the outcome to an exit code
pub fn finish_batch(summary: String, errors: &[String]) -> i32 {
    println!("{summary}");
    for error in errors {
        eprintln!("  {error}");
    }
    if errors.is_empty() {
        0
    } else {
        1
    }
}
