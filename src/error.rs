//! Error types for netprobe.
//!
//! Uses `thiserror` for ergonomic error definitions.

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single TCP connect probe, classified from the socket error.
///
/// Classification uses `io::ErrorKind` and raw OS error codes, never the
/// formatted error message.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection refused")]
    Refused,

    #[error("connection timed out")]
    TimedOut,

    #[error("too many open files")]
    DescriptorsExhausted,

    #[error("connect failed: {0}")]
    Other(io::Error),
}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> Self {
        if is_descriptor_exhaustion(&err) {
            return Self::DescriptorsExhausted;
        }
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Other(err),
        }
    }
}

#[cfg(unix)]
fn is_descriptor_exhaustion(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE))
}

#[cfg(windows)]
fn is_descriptor_exhaustion(err: &io::Error) -> bool {
    // WSAEMFILE
    err.raw_os_error() == Some(10024)
}

#[cfg(not(any(unix, windows)))]
fn is_descriptor_exhaustion(_err: &io::Error) -> bool {
    false
}

/// Errors raised while expanding a host specification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid octet range '{0}'")]
    InvalidRange(String),

    #[error("CIDR block {block} holds {count} addresses (max: {max})")]
    CidrTooLarge { block: String, count: u128, max: u128 },

    #[error("empty host specification")]
    Empty,
}

/// Errors from forward or reverse name lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("no records found for {0}")]
    NotFound(String),

    #[error("lookup of {name} failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Errors from link-layer (ARP) resolution.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("ARP resolution only supports IPv4 targets, got {0}")]
    NotIpv4(IpAddr),

    #[error("interface {0} has no usable IPv4 address or MAC")]
    InterfaceUnusable(String),

    #[error("non-ethernet channel on {0}")]
    NotEthernet(String),

    #[error("failed to build ARP frame")]
    Packet,

    #[error("no ARP reply from {0}")]
    NoReply(IpAddr),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

/// Top-level error for the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] crate::types::PortError),

    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for link-layer operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
