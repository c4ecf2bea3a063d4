//! # netprobe - Concurrent Host Discovery and TCP Port Scanning
//!
//! netprobe expands a host specification into concrete addresses, resolves
//! and probes every address concurrently, then scans the TCP ports of each
//! resolved host with connect probes.
//!
//! ## Features
//!
//! - **Flexible Targeting**: Addresses, hostnames, CIDR blocks and octet ranges
//! - **Liveness Probing**: ICMP echo, ARP cache and active ARP requests
//! - **Bounded Concurrency**: A weighted governor sized from the descriptor limit
//! - **Typed Classification**: Connect errors classified by OS error code
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use netprobe::discovery::{Discovery, DiscoveryOptions};
//! use netprobe::scanner::{scan_targets, ScanOptions};
//! use netprobe::types::PortSpec;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ports = "22,80,443".parse::<PortSpec>().unwrap().into_ports();
//!     let discovery = Discovery::new(DiscoveryOptions::default());
//!     let targets = discovery.discover("192.168.1.0/30", &ports).await.unwrap();
//!
//!     let results = scan_targets(targets, ScanOptions::default()).await;
//!     for result in &results.resolved {
//!         println!("{}: {} open", result.target.initial, result.ports.open.len());
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, targets and their liveness state
//! - [`concurrency`] - The weighted governor and worker pool
//! - [`discovery`] - Address expansion, resolution and liveness probing
//! - [`scanner`] - TCP connect scanning and scan results
//! - [`system`] - Descriptor limit and local interface queries
//! - [`config`] - Persistent settings
//! - [`output`] - Output formatting utilities
//! - [`error`] - Error types

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod discovery;
pub mod error;
pub mod output;
pub mod scanner;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use concurrency::Governor;
pub use discovery::{Discovery, DiscoveryOptions};
pub use error::{CliError, ProbeError, TargetError};
pub use scanner::{MultiScanResult, PortResults, PortScanner, ScanOptions, ScanResult};
pub use types::{NetworkLocation, Port, PortSpec, Ports, Target, TargetStatus, Targets};
