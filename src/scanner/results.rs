//! Scan result types.

use crate::types::{Port, Ports, Target};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Outcome of one connect probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// The handshake completed.
    Open,
    /// The host answered with a reset.
    Closed,
    /// No answer before the connect timeout.
    Filtered,
    /// The probe failed in a way that says nothing about the port.
    Inconclusive,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Ports of one target partitioned by probe outcome. Each probed port is
/// in exactly one bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortResults {
    pub open: Ports,
    pub closed: Ports,
    pub filtered: Ports,
    /// Ports whose probe hit an unclassified error or ran out of retries.
    pub inconclusive: Ports,
}

impl PortResults {
    pub fn record(&mut self, port: Port, state: PortState) {
        match state {
            PortState::Open => self.open.push(port),
            PortState::Closed => self.closed.push(port),
            PortState::Filtered => self.filtered.push(port),
            PortState::Inconclusive => self.inconclusive.push(port),
        }
    }

    pub fn state_of(&self, port: Port) -> Option<PortState> {
        [
            (&self.open, PortState::Open),
            (&self.closed, PortState::Closed),
            (&self.filtered, PortState::Filtered),
            (&self.inconclusive, PortState::Inconclusive),
        ]
        .into_iter()
        .find(|(ports, _)| ports.contains(&port))
        .map(|(_, state)| state)
    }

    /// Iterate over every recorded port with its state.
    pub fn iter(&self) -> impl Iterator<Item = (Port, PortState)> + '_ {
        tagged(&self.open, PortState::Open)
            .chain(tagged(&self.closed, PortState::Closed))
            .chain(tagged(&self.filtered, PortState::Filtered))
            .chain(tagged(&self.inconclusive, PortState::Inconclusive))
    }
}

fn tagged(ports: &Ports, state: PortState) -> impl Iterator<Item = (Port, PortState)> + '_ {
    ports.iter().map(move |port| (*port, state))
}

/// Result of scanning every port of one target.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub target: Arc<Target>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ports: PortResults,
}

impl ScanResult {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Results of a batch scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultiScanResult {
    /// One result per target that had an IP address.
    pub resolved: Vec<ScanResult>,
    /// Targets that failed resolution, carried through unscanned.
    pub unresolved: Vec<Target>,
}
