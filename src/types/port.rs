//! Port types with parsing and preview rendering.
//!
//! A `Port` pairs a port number with its transport protocol. `Ports` keeps
//! insertion order, which drives scan dispatch and the truncated preview.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Transport protocol label of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            _ => Err(PortError::UnknownProtocol(s.to_string())),
        }
    }
}

/// A port number and its protocol. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    number: u16,
    protocol: Protocol,
}

impl Port {
    /// Create a port with an explicit protocol.
    #[inline]
    pub const fn new(number: u16, protocol: Protocol) -> Self {
        Self { number, protocol }
    }

    /// Create a TCP port.
    #[inline]
    pub const fn tcp(number: u16) -> Self {
        Self::new(number, Protocol::Tcp)
    }

    /// Get the raw port number.
    #[inline]
    pub const fn number(self) -> u16 {
        self.number
    }

    #[inline]
    pub const fn protocol(self) -> Protocol {
        self.protocol
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

/// Error type for port parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),
    #[error("empty port specification")]
    Empty,
}

/// An ordered sequence of ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ports(Vec<Port>);

impl Ports {
    /// Maximum number of ports shown by [`Ports::preview`].
    pub const PREVIEW_LIMIT: usize = 30;

    const PER_LINE: usize = 10;

    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, port: Port) {
        self.0.push(port);
    }

    pub fn extend(&mut self, other: Ports) {
        self.0.extend(other.0);
    }

    pub fn into_inner(self) -> Vec<Port> {
        self.0
    }

    /// Render at most [`Ports::PREVIEW_LIMIT`] ports, marking truncation
    /// with a trailing `...`.
    pub fn preview(&self) -> String {
        if self.0.len() <= Self::PREVIEW_LIMIT {
            return self.to_string();
        }
        let mut out = join_ports(&self.0[..Self::PREVIEW_LIMIT]);
        out.push_str("...");
        out
    }
}

/// Join ports with ", ", breaking the line after every tenth entry.
fn join_ports(ports: &[Port]) -> String {
    let mut out = String::new();
    for (i, port) in ports.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
            if i % Ports::PER_LINE == 0 {
                out.push('\n');
            }
        }
        out.push_str(&port.to_string());
    }
    out
}

impl fmt::Display for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", join_ports(&self.0))
    }
}

impl Deref for Ports {
    type Target = [Port];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Port>> for Ports {
    fn from(ports: Vec<Port>) -> Self {
        Self(ports)
    }
}

impl FromIterator<Port> for Ports {
    fn from_iter<I: IntoIterator<Item = Port>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Ports {
    type Item = Port;
    type IntoIter = std::vec::IntoIter<Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Ports {
    type Item = &'a Port;
    type IntoIter = std::slice::Iter<'a, Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A textual port specification.
///
/// Supports formats like:
/// - Single port: "80"
/// - Comma-separated: "80,443,8080"
/// - Range: "1-1000"
/// - Mixed: "22,80,443,8000-9000"
///
/// Parsing keeps the order in which ports were written and drops repeats.
#[derive(Debug, Clone, Default)]
pub struct PortSpec {
    ports: Ports,
    seen: HashSet<Port>,
}

impl PortSpec {
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub fn into_ports(self) -> Ports {
        self.ports
    }

    fn add(&mut self, port: Port) {
        if self.seen.insert(port) {
            self.ports.push(port);
        }
    }

    /// The 100 most commonly open TCP ports.
    pub fn top_100() -> Self {
        let ports = [
            7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 79, 80, 81, 88, 106, 110, 111, 113, 119, 135,
            139, 143, 144, 179, 199, 389, 427, 443, 444, 445, 465, 513, 514, 515, 543, 544, 548,
            554, 587, 631, 646, 873, 990, 993, 995, 1025, 1026, 1027, 1028, 1029, 1110, 1433, 1720,
            1723, 1755, 1900, 2000, 2001, 2049, 2121, 2717, 3000, 3128, 3306, 3389, 3986, 4899,
            5000, 5009, 5051, 5060, 5101, 5190, 5357, 5432, 5631, 5666, 5800, 5900, 6000, 6001,
            6646, 7070, 8000, 8008, 8009, 8080, 8081, 8443, 8888, 9100, 9999, 10000, 32768, 49152,
            49153, 49154, 49155, 49156, 49157,
        ];
        let mut spec = Self::default();
        for number in ports {
            spec.add(Port::tcp(number));
        }
        spec
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut spec = Self::default();

        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((start, end)) = part.split_once('-') {
                let start = parse_number(start)?;
                let end = parse_number(end)?;
                if start > end {
                    return Err(PortError::InvalidRange(start, end));
                }
                for number in start..=end {
                    spec.add(Port::tcp(number));
                }
            } else {
                spec.add(Port::tcp(parse_number(part)?));
            }
        }

        if spec.ports.is_empty() {
            return Err(PortError::Empty);
        }

        Ok(spec)
    }
}

fn parse_number(s: &str) -> Result<u16, PortError> {
    s.trim()
        .parse()
        .map_err(|_| PortError::InvalidFormat(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_display() {
        assert_eq!(Port::tcp(80).to_string(), "80/tcp");
        assert_eq!(Port::tcp(0).number(), 0);
    }

    #[test]
    fn test_ports_display_breaks_lines() {
        let ports: Ports = (1..=12).map(Port::tcp).collect();
        let rendered = ports.to_string();
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.starts_with("1/tcp, 2/tcp"));
        assert!(rendered.ends_with("11/tcp, 12/tcp"));
    }

    #[test]
    fn test_preview_truncates() {
        let short: Ports = (1..=5).map(Port::tcp).collect();
        assert!(!short.preview().ends_with("..."));

        let long: Ports = (1..=40).map(Port::tcp).collect();
        let preview = long.preview();
        assert!(preview.ends_with("30/tcp..."));
        assert!(!preview.contains("31/tcp"));
    }

    #[test]
    fn test_port_spec_parsing() {
        let spec: PortSpec = "80".parse().unwrap();
        assert_eq!(spec.ports().len(), 1);

        let spec: PortSpec = "1-100".parse().unwrap();
        assert_eq!(spec.ports().len(), 100);

        let spec: PortSpec = "22,80,443,8000-8010".parse().unwrap();
        assert_eq!(spec.ports().len(), 14);
    }

    #[test]
    fn test_port_spec_keeps_order_and_dedups() {
        let spec: PortSpec = "443,80,443,22".parse().unwrap();
        let numbers: Vec<u16> = spec.ports().iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![443, 80, 22]);
    }

    #[test]
    fn test_port_spec_errors() {
        assert_eq!("".parse::<PortSpec>().unwrap_err(), PortError::Empty);
        assert_eq!(
            "90-80".parse::<PortSpec>().unwrap_err(),
            PortError::InvalidRange(90, 80)
        );
        assert!(matches!(
            "http".parse::<PortSpec>(),
            Err(PortError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_full_range_with_repeats() {
        let spec: PortSpec = "1-65535,80,443-450".parse().unwrap();
        let ports = spec.ports();
        assert_eq!(ports.len(), 65535);
        assert_eq!(ports[0], Port::tcp(1));
        assert_eq!(ports[65534], Port::tcp(65535));
    }

    #[test]
    fn test_top_100() {
        assert_eq!(PortSpec::top_100().ports().len(), 100);
    }
}
