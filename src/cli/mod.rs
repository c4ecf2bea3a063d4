//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `netprobe discover <hosts>` - Resolve and probe hosts
//! - `netprobe scan <hosts>` - Discover hosts, then scan their ports

mod discover;
mod scan;

pub use discover::DiscoverCommand;
pub use scan::ScanCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output::OutputFormat;
use crate::types::{PortSpec, Ports};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// netprobe - concurrent host discovery and TCP port scanning.
///
/// Hosts may be given as addresses, hostnames, CIDR blocks
/// (10.0.0.0/24) or octet ranges (10.0.1-3.1-20), separated by commas.
#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concurrent host discovery and TCP port scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use raw ICMP sockets (requires root)
    #[arg(long, global = true)]
    pub privileged: bool,

    /// Output format for results
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve hosts and probe liveness and link-layer identity
    #[command(alias = "d")]
    Discover(DiscoverCommand),

    /// Discover hosts and scan their TCP ports
    #[command(alias = "s")]
    Scan(ScanCommand),
}

impl Cli {
    /// Run the selected subcommand.
    pub async fn execute(&self) -> CliResult<()> {
        let settings = self.settings()?;
        // Keep machine-readable output free of progress noise.
        let quiet = self.quiet || settings.output_format != OutputFormat::Plain;
        match &self.command {
            Commands::Discover(cmd) => cmd.execute(&settings, quiet).await,
            Commands::Scan(cmd) => cmd.execute(&settings, quiet).await,
        }
    }

    /// Settings from disk with global flags applied on top.
    pub fn settings(&self) -> CliResult<AppSettings> {
        let mut settings = match &self.config {
            Some(path) => AppSettings::load_from(path)?,
            None => AppSettings::load()?,
        };
        if self.privileged {
            settings.privileged = true;
        }
        if let Some(format) = self.output {
            settings.output_format = format;
        }
        Ok(settings)
    }
}

/// Parse a port list, or fall back to the 100 most common ports.
pub(crate) fn parse_ports(spec: Option<&str>) -> CliResult<Ports> {
    let spec = match spec {
        Some(spec) => spec.parse()?,
        None => PortSpec::top_100(),
    };
    Ok(spec.into_ports())
}

/// A spinner on stderr, hidden when `quiet`.
pub(crate) fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Check if running with root/admin privileges.
pub(crate) fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
