//! Host system queries: descriptor limit and local interfaces.

use ipnetwork::IpNetwork;
use pnet::datalink::{self, NetworkInterface};
use pnet::util::MacAddr;
use std::io;
use std::net::IpAddr;

/// Soft limit on open file descriptors for this process.
#[cfg(unix)]
pub fn descriptor_limit() -> io::Result<u64> {
    use rlimit::Resource;

    let (soft, _hard) = Resource::NOFILE.get()?;
    Ok(soft)
}

#[cfg(not(unix))]
pub fn descriptor_limit() -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "descriptor limit lookup is only available on unix",
    ))
}

/// Network interfaces of this machine.
pub fn interfaces() -> Vec<NetworkInterface> {
    datalink::interfaces()
}

/// Find the interface that owns `ip`, returning its hardware address.
///
/// The outer `Option` says whether `ip` belongs to this machine; the inner
/// one carries the MAC if the interface has one (loopback does not).
pub fn local_address(interfaces: &[NetworkInterface], ip: IpAddr) -> Option<Option<MacAddr>> {
    interfaces
        .iter()
        .find(|iface| iface.ips.iter().any(|net| net.ip() == ip))
        .map(|iface| iface.mac.filter(|mac| *mac != MacAddr::zero()))
}

/// Whether `ip` falls inside a subnet configured on any interface,
/// loopback and IPv6 included.
pub fn is_on_local_subnet(interfaces: &[NetworkInterface], ip: IpAddr) -> bool {
    interfaces
        .iter()
        .flat_map(|iface| iface.ips.iter())
        .any(|net| net.contains(ip))
}

/// Find the interface an ARP request for `ip` goes out on: the first
/// non-loopback interface with an IPv4 subnet containing it.
pub fn arp_interface(interfaces: &[NetworkInterface], ip: IpAddr) -> Option<&NetworkInterface> {
    interfaces.iter().find(|iface| {
        !iface.is_loopback()
            && iface
                .ips
                .iter()
                .any(|net| matches!(net, IpNetwork::V4(_)) && net.contains(ip))
    })
}
