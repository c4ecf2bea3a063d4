//! Host discovery: turn a host specification into probed [`Target`]s.
//!
//! Each expanded address becomes one resolution unit that resolves the
//! name, probes liveness and link-layer identity, and looks up the vendor.
//! Units run concurrently on a bounded pool, each holding
//! [`RESOLUTION_WEIGHT`] units of the [`Governor`] while it works.

pub mod arp;
pub mod expand;
pub mod probe;
pub mod resolve;
pub mod vendor;

pub use expand::{expand, expand_with_limit};
pub use resolve::{DnsResolver, HostResolver};
pub use vendor::{OuiVendorLookup, VendorLookup};

use crate::concurrency::{fan_out, Governor};
use crate::error::TargetError;
use crate::types::{Ports, Target, Targets};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Governor weight held by one resolution unit: DNS, ICMP, ARP and
/// vendor-lookup sockets may be open at once.
pub const RESOLUTION_WEIGHT: u32 = 4;

/// Tunables for liveness and link-layer probing.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Echo requests sent per target.
    pub ping_count: u16,
    /// Total time allowed for all echo requests of one target.
    pub ping_timeout: Duration,
    /// Pause between echo requests.
    pub ping_interval: Duration,
    /// Read deadline for an active ARP request.
    pub arp_timeout: Duration,
    /// Use raw ICMP sockets.
    pub privileged: bool,
    /// Reject CIDR blocks holding more addresses than this. `None`
    /// expands blocks of any size.
    pub max_cidr_hosts: Option<u128>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            ping_count: 3,
            ping_timeout: Duration::from_secs(3),
            ping_interval: Duration::from_secs(1),
            arp_timeout: Duration::from_millis(500),
            privileged: false,
            max_cidr_hosts: None,
        }
    }
}

/// Discovery pipeline with its resolution collaborators.
#[derive(Clone)]
pub struct Discovery {
    resolver: Arc<dyn HostResolver>,
    vendors: Arc<dyn VendorLookup>,
    options: DiscoveryOptions,
}

impl Discovery {
    /// Discovery using the system DNS configuration and the bundled OUI
    /// database.
    pub fn new(options: DiscoveryOptions) -> Self {
        Self {
            resolver: Arc::new(DnsResolver::from_system()),
            vendors: Arc::new(OuiVendorLookup),
            options,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_vendor_lookup(mut self, vendors: Arc<dyn VendorLookup>) -> Self {
        self.vendors = vendors;
        self
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Build one fully probed target from an address or hostname.
    pub async fn build_target(&self, initial: impl Into<String>, ports: Ports) -> Target {
        let mut target = Target::new(initial, ports);
        if resolve::resolve_target(&mut target, self.resolver.as_ref()).await {
            probe::probe_target(&mut target, &self.options).await;
            target.vendor = vendor::vendor_for(self.vendors.as_ref(), target.mac);
        }
        debug!(
            host = %target.initial,
            status = %target.status(),
            location = %target.location,
            "target built"
        );
        target
    }

    /// Expand `spec` and build a target for every address, bounded by a
    /// governor sized from this process's descriptor limit.
    pub async fn discover(&self, spec: &str, ports: &Ports) -> Result<Targets, TargetError> {
        self.discover_with_fallback(spec, ports, Governor::FALLBACK_CAPACITY)
            .await
    }

    /// Like [`Discovery::discover`], with `fallback` as the governor
    /// capacity when the descriptor limit is unknown.
    pub async fn discover_with_fallback(
        &self,
        spec: &str,
        ports: &Ports,
        fallback: u32,
    ) -> Result<Targets, TargetError> {
        let governor = Governor::from_descriptor_limit(fallback);
        self.discover_with(spec, ports, &governor).await
    }

    /// Expand `spec` and build a target for every address under `governor`.
    ///
    /// Targets come back in the order their addresses were expanded, one
    /// per address.
    pub async fn discover_with(
        &self,
        spec: &str,
        ports: &Ports,
        governor: &Governor,
    ) -> Result<Targets, TargetError> {
        let addresses = expand_with_limit(spec, self.options.max_cidr_hosts)?;
        info!(addresses = addresses.len(), "starting discovery");

        let targets = fan_out(
            addresses,
            governor.slots(RESOLUTION_WEIGHT),
            |address| {
                let discovery = self.clone();
                let governor = governor.clone();
                let ports = ports.clone();
                async move {
                    let _permit = governor.acquire(RESOLUTION_WEIGHT).await;
                    discovery.build_target(address, ports).await
                }
            },
            // A unit that died still owes its address a target.
            |address| Target::new(address, ports.clone()),
        )
        .await;

        info!(targets = targets.len(), "discovery finished");
        Ok(targets.into())
    }
}
