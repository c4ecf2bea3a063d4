//! Host specification expansion.
//!
//! A host specification is a comma-separated list of tokens. Each token is:
//! - a CIDR block (`192.168.1.0/24`), expanded to every address it holds,
//!   network and broadcast addresses included;
//! - a dotted pattern with dash ranges in any octet (`10.0.1-3.5`),
//!   expanded to the Cartesian product of the octet candidates;
//! - anything else (a bare IP or a hostname), passed through unchanged.
//!
//! No deduplication is done: repeated tokens produce repeated targets.

use crate::error::TargetError;
use ipnetwork::IpNetwork;

/// Expand a host specification into the addresses to probe.
///
/// Every CIDR block is expanded in full, whatever its size.
pub fn expand(spec: &str) -> Result<Vec<String>, TargetError> {
    expand_with_limit(spec, None)
}

/// Like [`expand`], rejecting any CIDR block holding more than
/// `max_block` addresses.
pub fn expand_with_limit(spec: &str, max_block: Option<u128>) -> Result<Vec<String>, TargetError> {
    let mut addresses = Vec::new();

    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(network) = parse_cidr(token) {
            let count = block_size(&network);
            if let Some(max) = max_block.filter(|max| count > *max) {
                return Err(TargetError::CidrTooLarge {
                    block: token.to_string(),
                    count,
                    max,
                });
            }
            addresses.extend(network.iter().map(|ip| ip.to_string()));
        } else if is_range_pattern(token) {
            let octets = parse_octet_ranges(token)?;
            addresses.extend(cartesian(&octets));
        } else {
            addresses.push(token.to_string());
        }
    }

    if addresses.is_empty() {
        return Err(TargetError::Empty);
    }
    Ok(addresses)
}

/// Parse `token` as a CIDR block, masked down to its network address.
fn parse_cidr(token: &str) -> Option<IpNetwork> {
    if !token.contains('/') {
        return None;
    }
    let parsed: IpNetwork = token.parse().ok()?;
    IpNetwork::new(parsed.network(), parsed.prefix()).ok()
}

fn block_size(network: &IpNetwork) -> u128 {
    let bits = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    1u128
        .checked_shl(bits - u32::from(network.prefix()))
        .unwrap_or(u128::MAX)
}

/// A dotted quad made only of digits and dashes, with at least one dash.
fn is_range_pattern(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 4
        && token.contains('-')
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit() || c == '-'))
}

fn parse_octet_ranges(token: &str) -> Result<[Vec<u8>; 4], TargetError> {
    let invalid = || TargetError::InvalidRange(token.to_string());
    let mut octets: [Vec<u8>; 4] = Default::default();

    for (slot, part) in octets.iter_mut().zip(token.split('.')) {
        *slot = match part.split_once('-') {
            Some((low, high)) => {
                let low: u8 = low.parse().map_err(|_| invalid())?;
                let high: u8 = high.parse().map_err(|_| invalid())?;
                if low > high {
                    return Err(invalid());
                }
                (low..=high).collect()
            }
            None => vec![part.parse().map_err(|_| invalid())?],
        };
    }
    Ok(octets)
}

fn cartesian(octets: &[Vec<u8>; 4]) -> Vec<String> {
    let mut out = Vec::new();
    for a in &octets[0] {
        for b in &octets[1] {
            for c in &octets[2] {
                for d in &octets[3] {
                    out.push(format!("{a}.{b}.{c}.{d}"));
                }
            }
        }
    }
    out
}
