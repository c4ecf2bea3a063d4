//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::scanner::{MultiScanResult, ScanResult};
use crate::types::{Ports, Target, TargetStatus, Targets};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

fn status_style(status: TargetStatus) -> Style {
    match status {
        TargetStatus::Online => Style::new().green().bold(),
        TargetStatus::OfflineFiltered => Style::new().yellow(),
        TargetStatus::Unknown => Style::new().dim(),
    }
}

fn write_banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                    {}", style(title).cyan().bold())?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

fn write_target_block<W: Write>(out: &mut W, target: &Target) -> io::Result<()> {
    let na = || "N/A".to_string();
    let status = target.status();
    writeln!(
        out,
        "  {} {}",
        style("Target:").bold(),
        style(&target.initial).white().bold()
    )?;
    writeln!(
        out,
        "  {} {}",
        style("IP Address:").bold(),
        target.ip.map_or_else(na, |ip| ip.to_string())
    )?;
    writeln!(
        out,
        "  {} {}",
        style("Hostname:").bold(),
        target.hostname.clone().unwrap_or_else(na)
    )?;
    match target.avg_rtt() {
        Some(avg) => writeln!(
            out,
            "  {} {:.2}ms ({} recv)",
            style("Avg Ping:").bold(),
            avg.as_secs_f64() * 1000.0,
            target.rtts.len()
        )?,
        None => writeln!(out, "  {} N/A (0 recv)", style("Avg Ping:").bold())?,
    }
    writeln!(
        out,
        "  {} {}",
        style("MAC Address:").bold(),
        target.mac.map_or_else(na, |mac| mac.to_string())
    )?;
    writeln!(
        out,
        "  {} {}",
        style("Vendor:").bold(),
        target.vendor.clone().unwrap_or_else(na)
    )?;
    writeln!(out, "  {} {}", style("Location:").bold(), target.location)?;
    writeln!(
        out,
        "  {} {}",
        style("Status:").bold(),
        status_style(status).apply_to(status)
    )
}

fn write_port_line<W: Write>(out: &mut W, label: &str, ports: &Ports, color: Style) -> io::Result<()> {
    if ports.is_empty() {
        return Ok(());
    }
    writeln!(
        out,
        "  {:<14} {}",
        color.apply_to(label),
        ports.preview().replace('\n', "\n                 ")
    )
}

fn write_scan_result<W: Write>(out: &mut W, result: &ScanResult) -> io::Result<()> {
    write_target_block(out, &result.target)?;
    let elapsed = result.duration().num_milliseconds() as f64 / 1000.0;
    writeln!(
        out,
        "  {} {} ports scanned in {:.2}s",
        style("Statistics:").bold(),
        result.target.ports.len(),
        elapsed
    )?;
    writeln!(
        out,
        "               {} open, {} closed, {} filtered, {} inconclusive",
        style(result.ports.open.len()).green().bold(),
        style(result.ports.closed.len()).red(),
        style(result.ports.filtered.len()).yellow(),
        style(result.ports.inconclusive.len()).dim()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    write_port_line(out, "OPEN", &result.ports.open, Style::new().green().bold())?;
    write_port_line(out, "CLOSED", &result.ports.closed, Style::new().red())?;
    write_port_line(out, "FILTERED", &result.ports.filtered, Style::new().yellow())?;
    write_port_line(out, "INCONCLUSIVE", &result.ports.inconclusive, Style::new().dim())?;
    if result.ports.iter().next().is_none() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    }
    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(out)
}

/// Print discovered targets in human-readable form.
pub fn write_targets<W: Write>(mut out: W, targets: &Targets) -> io::Result<()> {
    write_banner(&mut out, "Discovery Results")?;
    if targets.is_empty() {
        writeln!(out, "  {}", style("No targets to display.").dim())?;
    }
    for target in targets.iter() {
        write_target_block(&mut out, target)?;
        writeln!(out, "  {} {}", style("Ports:").bold(), target.ports.preview())?;
        writeln!(out)?;
    }
    writeln!(out, "{}", style(RULE).cyan())
}

/// Print scan results in human-readable form.
pub fn write_scan<W: Write>(mut out: W, results: &MultiScanResult) -> io::Result<()> {
    write_banner(&mut out, "Scan Results")?;
    for result in &results.resolved {
        write_scan_result(&mut out, result)?;
    }
    if !results.unresolved.is_empty() {
        writeln!(out, "  {}", style("Unresolved:").yellow().bold())?;
        for target in &results.unresolved {
            writeln!(out, "    {}", target.initial)?;
        }
        writeln!(out)?;
    }
    writeln!(out, "{}", style(RULE).cyan())
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
