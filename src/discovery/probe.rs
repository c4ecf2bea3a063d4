//! Liveness and link-layer probing of a resolved target.
//!
//! Every step tolerates failure: a probe that cannot run, or gets no
//! answer, only means less evidence about the target.

use super::arp;
use super::DiscoveryOptions;
use crate::system;
use crate::types::{NetworkLocation, Target, TargetStatus};
use pnet::datalink::NetworkInterface;
use rand::random;
use socket2::Type;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const PING_PAYLOAD: [u8; 56] = [0; 56];

/// Probe liveness and link-layer identity of `target`.
///
/// Does nothing for unresolved targets.
pub async fn probe_target(target: &mut Target, options: &DiscoveryOptions) {
    let Some(ip) = target.ip else {
        return;
    };
    let interfaces = system::interfaces();

    let is_self = match system::local_address(&interfaces, ip) {
        Some(mac) => {
            target.location = NetworkLocation::Local;
            target.mac = mac;
            true
        }
        None => false,
    };

    match ping(ip, options).await {
        Ok(rtts) => {
            if !rtts.is_empty() {
                target.status.upgrade(TargetStatus::Online);
            }
            target.rtts = rtts;
        }
        Err(e) => debug!(%ip, error = %e, "ICMP probe unavailable"),
    }

    if !is_self {
        resolve_link_layer(target, ip, &interfaces, options.arp_timeout).await;
    }
}

/// Send up to `ping_count` echo requests within `ping_timeout` and return
/// the round-trip times of the replies that arrived.
pub async fn ping(ip: IpAddr, options: &DiscoveryOptions) -> io::Result<Vec<Duration>> {
    let kind = if ip.is_ipv4() { ICMP::V4 } else { ICMP::V6 };
    let sock_type = if options.privileged || cfg!(windows) {
        Type::RAW
    } else {
        Type::DGRAM
    };
    let config = Config::builder().kind(kind).sock_type_hint(sock_type).build();
    let client = Client::new(&config)?;
    let mut pinger = client.pinger(ip, PingIdentifier(random())).await;

    let mut schedule = EchoSchedule::new(
        options.ping_count,
        options.ping_timeout,
        options.ping_interval,
    );
    let mut rtts = Vec::new();
    while let Some((seq, wait)) = schedule.next_slot().await {
        pinger.timeout(wait);
        match pinger.ping(PingSequence(seq), &PING_PAYLOAD).await {
            Ok((_, rtt)) => rtts.push(rtt),
            Err(e) => debug!(%ip, seq, error = %e, "no echo reply"),
        }
    }
    Ok(rtts)
}

/// Send times and reply deadlines for one target's echo requests.
///
/// Request `n` goes out `n * interval` after the first and waits at most
/// one interval for its reply. Nothing is sent or awaited past the total
/// budget.
#[derive(Debug)]
pub struct EchoSchedule {
    count: u16,
    interval: Duration,
    start: Instant,
    deadline: Instant,
    next: u16,
}

impl EchoSchedule {
    pub fn new(count: u16, budget: Duration, interval: Duration) -> Self {
        let start = Instant::now();
        Self {
            count,
            interval,
            start,
            deadline: start + budget,
            next: 0,
        }
    }

    /// Wait for the next send time and return the sequence number with
    /// its reply timeout, or `None` once the count or budget is spent.
    pub async fn next_slot(&mut self) -> Option<(u16, Duration)> {
        if self.next >= self.count {
            return None;
        }
        let slot = self.start + self.interval.saturating_mul(u32::from(self.next));
        tokio::time::sleep_until(slot.min(self.deadline)).await;

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let wait = if self.interval.is_zero() {
            remaining
        } else {
            self.interval.min(remaining)
        };
        let seq = self.next;
        self.next += 1;
        Some((seq, wait))
    }
}

/// Find the MAC of `ip` via the ARP cache, then an active request on the
/// interface whose subnet holds it. Targets outside every interface
/// subnet (loopback and IPv6 ones count) are global and never ARPed.
async fn resolve_link_layer(
    target: &mut Target,
    ip: IpAddr,
    interfaces: &[NetworkInterface],
    arp_timeout: Duration,
) {
    let cached = tokio::task::spawn_blocking(move || arp::cache_lookup(ip))
        .await
        .ok()
        .flatten();
    if let Some(mac) = cached {
        info!(target_host = %target.initial, %mac, "found MAC address in ARP cache");
        target.location = NetworkLocation::Local;
        target.mac = Some(mac);
        return;
    }

    if !system::is_on_local_subnet(interfaces, ip) {
        target.location = NetworkLocation::Global;
        target.mac = None;
        return;
    }
    target.location = NetworkLocation::Local;

    let Some(iface) = system::arp_interface(interfaces, ip).cloned() else {
        debug!(%ip, "no interface to send an ARP request on");
        target.mac = None;
        return;
    };

    let iface_name = iface.name.clone();
    match tokio::task::spawn_blocking(move || arp::request(&iface, ip, arp_timeout)).await {
        Ok(Ok(mac)) => {
            info!(target_host = %target.initial, %mac, "found MAC address via ARP request");
            target.mac = Some(mac);
            target.status.upgrade(TargetStatus::Online);
        }
        Ok(Err(e)) => {
            debug!(%ip, interface = %iface_name, error = %e, "ARP request failed");
            target.mac = None;
        }
        Err(e) => {
            warn!(%ip, error = %e, "ARP task failed");
            target.mac = None;
        }
    }
}
