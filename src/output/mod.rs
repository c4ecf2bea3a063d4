//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of discovery
//! and scan results. Every formatter writes into any [`io::Write`].

mod csv_format;
mod json_format;
mod plain;

pub use plain::{print_error, print_warning};

use crate::scanner::MultiScanResult;
use crate::types::Targets;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Write discovered targets in `format`.
pub fn write_targets<W: Write>(out: W, targets: &Targets, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_targets(out, targets),
        OutputFormat::Json => json_format::write_json(out, targets),
        OutputFormat::Csv => csv_format::write_targets(out, targets),
    }
}

/// Write scan results in `format`.
pub fn write_scan<W: Write>(
    out: W,
    results: &MultiScanResult,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_scan(out, results),
        OutputFormat::Json => json_format::write_json(out, results),
        OutputFormat::Csv => csv_format::write_scan(out, results),
    }
}
