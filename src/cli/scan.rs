//! Scan subcommand implementation.
//!
//! Handles the `netprobe scan <hosts>` command: discovery followed by a
//! TCP connect scan of every resolved target.

use crate::cli::{is_root, parse_ports, spinner};
use crate::config::AppSettings;
use crate::discovery::Discovery;
use crate::error::CliResult;
use crate::output;
use crate::scanner::PortScanner;
use clap::Parser;
use std::io;
use std::time::Duration;

/// Discover hosts and scan their TCP ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Hosts to scan (IP, hostname, CIDR, or octet range; comma separated)
    ///
    /// Examples:
    ///   192.168.1.1          Single IP address
    ///   example.com          Hostname
    ///   192.168.1.0/24       CIDR block
    ///   10.0.1-3.1-20        Octet ranges
    #[arg(value_name = "HOSTS")]
    pub hosts: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000"; defaults to the 100 most common)
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Connection timeout in milliseconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Rate limit in connect attempts per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let ports = parse_ports(self.ports.as_deref())?;
        if settings.privileged && !is_root() {
            output::print_warning("raw ICMP sockets usually require root/sudo privileges.");
        }

        let mut scan_options = settings.scan_options();
        if let Some(ms) = self.timeout {
            scan_options.connect_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(rate) = self.rate_limit {
            scan_options.rate_limit = rate;
        }

        let discovery = Discovery::new(settings.discovery_options());
        let pb = spinner(quiet, format!("Discovering {}", self.hosts));
        let targets = discovery
            .discover_with_fallback(&self.hosts, &ports, settings.fallback_descriptor_limit)
            .await;
        let targets = match targets {
            Ok(targets) => targets,
            Err(e) => {
                pb.finish_and_clear();
                return Err(e.into());
            }
        };

        pb.set_message(format!(
            "Scanning {} ports on {} targets",
            ports.len(),
            targets.iter().filter(|t| t.is_resolved()).count()
        ));
        let scanner =
            PortScanner::with_descriptor_limit(scan_options, settings.fallback_descriptor_limit);
        let results = scanner.scan_targets(targets).await;
        pb.finish_and_clear();

        output::write_scan(io::stdout().lock(), &results, settings.output_format)?;
        Ok(())
    }
}
