//! Discover subcommand implementation.
//!
//! Handles the `netprobe discover <hosts>` command.

use crate::cli::{is_root, parse_ports, spinner};
use crate::config::AppSettings;
use crate::discovery::Discovery;
use crate::error::CliResult;
use crate::output;
use clap::Parser;
use std::io;

/// Resolve hosts and probe their liveness.
#[derive(Parser, Debug)]
pub struct DiscoverCommand {
    /// Hosts to discover (IP, hostname, CIDR, or octet range; comma separated)
    ///
    /// Examples:
    ///   192.168.1.1          Single IP address
    ///   example.com          Hostname
    ///   192.168.1.0/24       CIDR block
    ///   10.0.1-3.1-20        Octet ranges
    #[arg(value_name = "HOSTS")]
    pub hosts: String,

    /// Ports attached to each target (defaults to the 100 most common)
    #[arg(short, long)]
    pub ports: Option<String>,
}

impl DiscoverCommand {
    /// Execute the discover command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let ports = parse_ports(self.ports.as_deref())?;
        if settings.privileged && !is_root() {
            output::print_warning("raw ICMP sockets usually require root/sudo privileges.");
        }

        let discovery = Discovery::new(settings.discovery_options());
        let pb = spinner(quiet, format!("Discovering {}", self.hosts));
        let targets = discovery
            .discover_with_fallback(&self.hosts, &ports, settings.fallback_descriptor_limit)
            .await;
        pb.finish_and_clear();
        let targets = targets?;

        output::write_targets(io::stdout().lock(), &targets, settings.output_format)?;
        Ok(())
    }
}
