//! CSV output formatting.
//!
//! Discovery writes one row per target; scans write one row per probed
//! port, plus a row with an empty port for each unresolved target.

use crate::scanner::MultiScanResult;
use crate::types::{Target, Targets};
use std::io::{self, Write};

const TARGET_HEADER: [&str; 8] = [
    "target", "ip", "hostname", "mac", "vendor", "location", "status", "avg_rtt_ms",
];

fn target_fields(target: &Target) -> [String; 8] {
    [
        target.initial.clone(),
        target.ip.map(|ip| ip.to_string()).unwrap_or_default(),
        target.hostname.clone().unwrap_or_default(),
        target.mac.map(|mac| mac.to_string()).unwrap_or_default(),
        target.vendor.clone().unwrap_or_default(),
        target.location.to_string(),
        target.status().to_string(),
        target
            .avg_rtt()
            .map(|avg| format!("{:.3}", avg.as_secs_f64() * 1000.0))
            .unwrap_or_default(),
    ]
}

/// Write discovered targets as CSV.
pub fn write_targets<W: Write>(out: W, targets: &Targets) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(TARGET_HEADER)?;
    for target in targets.iter() {
        wtr.write_record(target_fields(target))?;
    }
    wtr.flush()
}

/// Write scan results as CSV.
pub fn write_scan<W: Write>(out: W, results: &MultiScanResult) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(TARGET_HEADER.iter().chain(&["port", "protocol", "state"]))?;

    for result in &results.resolved {
        let fields = target_fields(&result.target);
        for (port, state) in result.ports.iter() {
            wtr.write_record(fields.iter().map(String::as_str).chain([
                port.number().to_string().as_str(),
                port.protocol().to_string().as_str(),
                state.to_string().as_str(),
            ]))?;
        }
    }
    for target in &results.unresolved {
        wtr.write_record(target_fields(target).iter().map(String::as_str).chain(["", "", ""]))?;
    }
    wtr.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PortResults, PortState, ScanResult};
    use crate::types::{Port, Ports};
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn test_targets_csv() {
        let targets: Targets = vec![
            Target::new("10.0.0.1", Ports::new()),
            Target::new("10.0.0.2", Ports::new()),
        ]
        .into();
        let mut buf = Vec::new();
        write_targets(&mut buf, &targets).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("target,ip,hostname"));
        assert!(lines[1].starts_with("10.0.0.1,,"));
    }

    #[test]
    fn test_scan_csv_one_row_per_port() {
        let mut target = Target::new("127.0.0.1", Ports::new());
        target.ip = Some("127.0.0.1".parse().unwrap());
        let mut ports = PortResults::default();
        ports.record(Port::tcp(80), PortState::Closed);
        ports.record(Port::tcp(443), PortState::Filtered);
        let now = Utc::now();
        let results = MultiScanResult {
            resolved: vec![ScanResult {
                target: Arc::new(target),
                started_at: now,
                finished_at: now,
                ports,
            }],
            unresolved: vec![Target::new("ghost.invalid", Ports::new())],
        };

        let mut buf = Vec::new();
        write_scan(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("port,protocol,state"));
        assert!(lines[1].ends_with("80,tcp,closed"));
        assert!(lines[2].ends_with("443,tcp,filtered"));
        assert!(lines[3].starts_with("ghost.invalid,"));
        assert!(lines[3].ends_with(",,"));
    }
}
