//! Link-layer address resolution.
//!
//! Two sources, cheapest first: the operating system's ARP cache, then an
//! active ARP request broadcast on the interface whose subnet holds the
//! target. Both are blocking and are run off the async executor.

use crate::error::{LinkError, LinkResult};
use ipnetwork::IpNetwork;
use pnet::datalink::{self, Channel, NetworkInterface};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

const ETH_HDR_LEN: usize = 14;
const ARP_LEN: usize = 28;
const MIN_ETH_FRAME_NO_FCS: usize = 60;

/// Look `ip` up in the OS ARP cache.
pub fn cache_lookup(ip: IpAddr) -> Option<MacAddr> {
    let table = read_arp_table().ok()?;
    parse_arp_table(&table, ip)
}

#[cfg(target_os = "linux")]
fn read_arp_table() -> io::Result<String> {
    std::fs::read_to_string("/proc/net/arp")
}

#[cfg(not(target_os = "linux"))]
fn read_arp_table() -> io::Result<String> {
    let output = std::process::Command::new("arp").arg("-an").output()?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Find the hardware address recorded for `ip` in an ARP table dump.
///
/// Understands `/proc/net/arp`, BSD `arp -an` (`? (ip) at mac on if`) and
/// Windows `arp -a` (dash-separated MACs). All-zero entries are ignored.
pub fn parse_arp_table(table: &str, ip: IpAddr) -> Option<MacAddr> {
    let wanted = ip.to_string();
    table.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        tokens.find(|t| t.trim_matches(|c| c == '(' || c == ')') == wanted)?;
        tokens
            .filter_map(|t| t.replace('-', ":").parse::<MacAddr>().ok())
            .find(|mac| *mac != MacAddr::zero())
    })
}

/// Broadcast an ARP request for `target` on `iface` and wait up to
/// `timeout` for the matching reply.
pub fn request(iface: &NetworkInterface, target: IpAddr, timeout: Duration) -> LinkResult<MacAddr> {
    let IpAddr::V4(target_v4) = target else {
        return Err(LinkError::NotIpv4(target));
    };
    let unusable = || LinkError::InterfaceUnusable(iface.name.clone());
    let src_mac = iface
        .mac
        .filter(|mac| *mac != MacAddr::zero())
        .ok_or_else(unusable)?;
    let src_ip = iface
        .ips
        .iter()
        .find_map(|net| match net {
            IpNetwork::V4(v4) if v4.contains(target_v4) => Some(v4.ip()),
            _ => None,
        })
        .ok_or_else(unusable)?;

    let config = datalink::Config {
        read_timeout: Some(timeout),
        ..Default::default()
    };
    let (mut tx, mut rx) = match datalink::channel(iface, config)? {
        Channel::Ethernet(tx, rx) => (tx, rx),
        _ => return Err(LinkError::NotEthernet(iface.name.clone())),
    };

    let frame = build_request(src_mac, src_ip, target_v4)?;
    if let Some(sent) = tx.send_to(&frame, None) {
        sent?;
    }

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match rx.next() {
            Ok(frame) => {
                if let Some(mac) = parse_reply(frame, target_v4) {
                    return Ok(mac);
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err(LinkError::NoReply(target))
}

/// Build a broadcast Ethernet frame carrying an ARP request.
pub fn build_request(src_mac: MacAddr, src_ip: Ipv4Addr, target: Ipv4Addr) -> LinkResult<Vec<u8>> {
    let mut buffer = vec![0u8; MIN_ETH_FRAME_NO_FCS];
    {
        let mut eth = MutableEthernetPacket::new(&mut buffer).ok_or(LinkError::Packet)?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(src_mac);
        eth.set_ethertype(EtherTypes::Arp);
    }
    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..ETH_HDR_LEN + ARP_LEN])
        .ok_or(LinkError::Packet)?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(src_mac);
    arp.set_sender_proto_addr(src_ip);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(target);
    Ok(buffer)
}

/// Extract the sender MAC from an ARP reply sent by `target`.
pub fn parse_reply(frame: &[u8], target: Ipv4Addr) -> Option<MacAddr> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply || arp.get_sender_proto_addr() != target {
        return None;
    }
    Some(arp.get_sender_hw_addr()).filter(|mac| *mac != MacAddr::zero())
}
