//! Target types: one host under discovery and scan.

use super::port::Ports;
use pnet::util::MacAddr;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

/// Liveness verdict for a target.
///
/// Variants are ordered by strength of evidence: `Unknown < OfflineFiltered
/// < Online`. Upgrades only ever move up this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Unknown = 0,
    OfflineFiltered = 1,
    Online = 2,
}

impl TargetStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            2 => Self::Online,
            1 => Self::OfflineFiltered,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "ONLINE"),
            Self::OfflineFiltered => write!(f, "OFFLINE / FILTERED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A `TargetStatus` that concurrent probes may upgrade through a shared
/// reference.
///
/// [`StatusCell::upgrade`] is an atomic max, so racing writers converge on
/// the strongest evidence regardless of completion order.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(status: TargetStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub fn get(&self) -> TargetStatus {
        TargetStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Raise the status to `status` unless it already is at least as strong.
    /// Returns the status held before the call.
    pub fn upgrade(&self, status: TargetStatus) -> TargetStatus {
        TargetStatus::from_u8(self.0.fetch_max(status as u8, Ordering::AcqRel))
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new(TargetStatus::Unknown)
    }
}

impl Clone for StatusCell {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Serialize for StatusCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// Where a target sits relative to this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkLocation {
    /// Reachable on a local segment (or the machine itself).
    Local,
    /// Only reachable through routed IP.
    Global,
    #[default]
    UnknownLocation,
}

impl fmt::Display for NetworkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "LOCAL"),
            Self::Global => write!(f, "GLOBAL"),
            Self::UnknownLocation => write!(f, "UNKNOWN"),
        }
    }
}

/// One host under investigation.
///
/// If `ip` is `None` the target failed resolution: `location` stays
/// `UnknownLocation`, `mac` stays `None`, and no probing happens.
#[derive(Debug, Clone, Serialize)]
pub struct Target {
    /// The address or hostname token this target was built from.
    pub initial: String,
    /// Display hostname; `None` when no name could be determined.
    pub hostname: Option<String>,
    pub ip: Option<IpAddr>,
    #[serde(serialize_with = "serialize_mac")]
    pub mac: Option<MacAddr>,
    pub vendor: Option<String>,
    pub status: StatusCell,
    pub location: NetworkLocation,
    pub ports: Ports,
    /// Observed ICMP round-trip times.
    #[serde(serialize_with = "serialize_rtts")]
    pub rtts: Vec<Duration>,
}

impl Target {
    /// Create an empty, unresolved target for `initial`.
    pub fn new(initial: impl Into<String>, ports: Ports) -> Self {
        Self {
            initial: initial.into(),
            hostname: None,
            ip: None,
            mac: None,
            vendor: None,
            status: StatusCell::default(),
            location: NetworkLocation::UnknownLocation,
            ports,
            rtts: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.ip.is_some()
    }

    /// Current liveness verdict.
    pub fn status(&self) -> TargetStatus {
        self.status.get()
    }

    /// Mean of the recorded round-trip times.
    pub fn avg_rtt(&self) -> Option<Duration> {
        if self.rtts.is_empty() {
            return None;
        }
        let total: Duration = self.rtts.iter().sum();
        Some(total / self.rtts.len() as u32)
    }
}

fn serialize_mac<S: Serializer>(mac: &Option<MacAddr>, serializer: S) -> Result<S::Ok, S::Error> {
    match mac {
        Some(mac) => serializer.serialize_some(&mac.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_rtts<S: Serializer>(rtts: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(rtts.iter().map(|rtt| rtt.as_secs_f64() * 1000.0))
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let na = || "N/A".to_string();
        writeln!(
            f,
            "Target: {} | IP: {} | Hostname: {}",
            self.initial,
            self.ip.map_or_else(na, |ip| ip.to_string()),
            self.hostname.clone().unwrap_or_else(na),
        )?;
        match self.avg_rtt() {
            Some(avg) => writeln!(f, "Avg Ping [{} recv]: {:?}", self.rtts.len(), avg)?,
            None => writeln!(f, "Avg Ping [0 recv]: N/A")?,
        }
        writeln!(f, "Vendor: {}", self.vendor.clone().unwrap_or_else(na))?;
        writeln!(f, "MacAddress: {}", self.mac.map_or_else(na, |m| m.to_string()))?;
        writeln!(f, "Network Location: {}", self.location)?;
        writeln!(f, "Status: {}", self.status())?;
        write!(f, "Ports:\n{}", self.ports.preview())
    }
}

/// An ordered collection of targets.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Targets(Vec<Target>);

impl Targets {
    pub fn into_inner(self) -> Vec<Target> {
        self.0
    }
}

impl Deref for Targets {
    type Target = [Target];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Target>> for Targets {
    fn from(targets: Vec<Target>) -> Self {
        Self(targets)
    }
}

impl FromIterator<Target> for Targets {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Targets {
    type Item = Target;
    type IntoIter = std::vec::IntoIter<Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
