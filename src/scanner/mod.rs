//! Port scan pipeline.
//!
//! Scans every port of a resolved target concurrently with TCP connect
//! probes, and batches of targets concurrently on top of that. Every probe
//! holds one unit of a [`Governor`] for the duration of its connect attempt.

pub mod rate_limiter;
pub mod results;
pub mod tcp;

pub use rate_limiter::RateLimiter;
pub use results::{MultiScanResult, PortResults, PortState, ScanResult};
pub use tcp::{ConnectProber, Connector, TcpConnector};

use crate::concurrency::{fan_out, Governor};
use crate::types::{Target, Targets};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Tunables for the connect scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Deadline for one connect attempt; also the first back-off pause.
    pub connect_timeout: Duration,
    /// Back-off rounds allowed for a port hitting descriptor exhaustion.
    pub max_retries: u32,
    /// Connect attempts per second across the scan; zero means unlimited.
    pub rate_limit: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            max_retries: 5,
            rate_limit: 0,
        }
    }
}

/// Connect scanner bound to one governor.
#[derive(Debug, Clone)]
pub struct PortScanner {
    options: ScanOptions,
    governor: Governor,
    rate_limiter: Option<RateLimiter>,
    connector: Arc<dyn Connector>,
}

impl PortScanner {
    pub fn new(options: ScanOptions, governor: Governor) -> Self {
        let rate_limiter = RateLimiter::per_second(options.rate_limit);
        Self {
            options,
            governor,
            rate_limiter,
            connector: Arc::new(TcpConnector),
        }
    }

    /// Replace the TCP stack used for connect attempts.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Scanner whose governor is sized from the descriptor limit.
    pub fn with_descriptor_limit(options: ScanOptions, fallback: u32) -> Self {
        Self::new(options, Governor::from_descriptor_limit(fallback))
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    /// Probe every port of `target` and collect the outcomes.
    ///
    /// An unresolved target yields empty results without any probing.
    pub async fn scan_target(&self, target: impl Into<Arc<Target>>) -> ScanResult {
        let target = target.into();
        let started_at = Utc::now();
        let mut ports = PortResults::default();

        if let Some(ip) = target.ip {
            let prober = ConnectProber::new(
                ip,
                self.options.connect_timeout,
                self.options.max_retries,
                self.governor.clone(),
            )
            .with_rate_limiter(self.rate_limiter.clone())
            .with_connector(Arc::clone(&self.connector));

            let outcomes = fan_out(
                target.ports.iter().copied(),
                self.governor.slots(tcp::PROBE_WEIGHT),
                |port| {
                    let prober = prober.clone();
                    let target = Arc::clone(&target);
                    async move { (port, prober.scan_port(port, &target.status).await) }
                },
                |port| (port, PortState::Inconclusive),
            )
            .await;

            for (port, state) in outcomes {
                ports.record(port, state);
            }
        } else {
            debug!(host = %target.initial, "skipping scan of unresolved target");
        }

        let finished_at = Utc::now();
        debug!(
            host = %target.initial,
            open = ports.open.len(),
            closed = ports.closed.len(),
            filtered = ports.filtered.len(),
            inconclusive = ports.inconclusive.len(),
            "target scanned"
        );
        ScanResult {
            target,
            started_at,
            finished_at,
            ports,
        }
    }

    /// Scan a batch of targets. Resolved targets are scanned concurrently;
    /// unresolved ones are carried through unscanned. Both lists keep the
    /// order of `targets`.
    pub async fn scan_targets(&self, targets: Targets) -> MultiScanResult {
        let (resolved, unresolved): (Vec<Target>, Vec<Target>) =
            targets.into_iter().partition(Target::is_resolved);
        let resolved: Vec<Arc<Target>> = resolved.into_iter().map(Arc::new).collect();
        info!(
            resolved = resolved.len(),
            unresolved = unresolved.len(),
            "starting scan"
        );

        // Target units hold no weight themselves; only their probes do.
        let workers = self.governor.capacity() as usize;
        let resolved = fan_out(
            resolved,
            workers,
            |target| {
                let scanner = self.clone();
                async move { scanner.scan_target(target).await }
            },
            |target| {
                let now = Utc::now();
                ScanResult {
                    target,
                    started_at: now,
                    finished_at: now,
                    ports: PortResults::default(),
                }
            },
        )
        .await;

        info!(results = resolved.len(), "scan finished");
        MultiScanResult {
            resolved,
            unresolved,
        }
    }
}

/// Scan one target under a fresh governor sized from the descriptor limit.
pub async fn scan_target(target: Target, options: ScanOptions) -> ScanResult {
    PortScanner::with_descriptor_limit(options, Governor::FALLBACK_CAPACITY)
        .scan_target(target)
        .await
}

/// Scan a batch of targets under a fresh governor sized from the
/// descriptor limit.
pub async fn scan_targets(targets: Targets, options: ScanOptions) -> MultiScanResult {
    PortScanner::with_descriptor_limit(options, Governor::FALLBACK_CAPACITY)
        .scan_targets(targets)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::types::{Port, Ports, TargetStatus};
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::net::TcpListener;

    /// Refuses even ports and lets odd ones time out.
    #[derive(Debug)]
    struct SplitConnector;

    #[async_trait]
    impl Connector for SplitConnector {
        async fn connect(&self, addr: SocketAddr, deadline: Duration) -> Result<(), ProbeError> {
            if addr.port() % 2 == 0 {
                tokio::task::yield_now().await;
                Err(ProbeError::Refused)
            } else {
                tokio::time::sleep(deadline).await;
                Err(ProbeError::TimedOut)
            }
        }
    }

    fn quick_options() -> ScanOptions {
        ScanOptions {
            connect_timeout: Duration::from_millis(500),
            max_retries: 1,
            rate_limit: 0,
        }
    }

    fn loopback_target(ports: Ports) -> Target {
        let mut target = Target::new("127.0.0.1", ports);
        target.ip = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
        target
    }

    async fn closed_port() -> Port {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Port::tcp(port)
    }

    #[tokio::test]
    async fn test_scan_target_partitions_ports() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let open = Port::tcp(listener.local_addr().unwrap().port());
        let closed = closed_port().await;

        let scanner = PortScanner::new(quick_options(), Governor::new(16));
        let result = scanner
            .scan_target(loopback_target(vec![open, closed].into()))
            .await;

        assert_eq!(result.ports.state_of(open), Some(PortState::Open));
        assert_eq!(result.ports.state_of(closed), Some(PortState::Closed));
        assert_eq!(result.target.status(), TargetStatus::Online);
        assert!(result.finished_at >= result.started_at);
        assert_eq!(scanner.governor().in_use(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_refusals_and_timeouts_mixed_leave_target_online() {
        let ports: Ports = (1000..1040).map(Port::tcp).collect();
        let options = ScanOptions {
            connect_timeout: Duration::from_millis(20),
            ..quick_options()
        };
        let scanner =
            PortScanner::new(options, Governor::new(6)).with_connector(Arc::new(SplitConnector));
        let result = scanner.scan_target(loopback_target(ports)).await;

        assert_eq!(result.ports.closed.len(), 20);
        assert_eq!(result.ports.filtered.len(), 20);
        assert!(result.ports.open.is_empty());
        assert_eq!(result.target.status(), TargetStatus::Online);
        assert_eq!(scanner.governor().in_use(), 0);
    }

    #[tokio::test]
    async fn test_all_timeouts_leave_target_filtered() {
        let ports: Ports = (1..=9).step_by(2).map(Port::tcp).collect();
        let options = ScanOptions {
            connect_timeout: Duration::from_millis(10),
            ..quick_options()
        };
        let result = PortScanner::new(options, Governor::new(4))
            .with_connector(Arc::new(SplitConnector))
            .scan_target(loopback_target(ports))
            .await;

        assert_eq!(result.ports.filtered.len(), 5);
        assert_eq!(result.target.status(), TargetStatus::OfflineFiltered);
    }

    /// Panics on port 13, refuses everything else.
    #[derive(Debug)]
    struct FragileConnector;

    #[async_trait]
    impl Connector for FragileConnector {
        async fn connect(&self, addr: SocketAddr, _deadline: Duration) -> Result<(), ProbeError> {
            if addr.port() == 13 {
                panic!("connector blew up");
            }
            Err(ProbeError::Refused)
        }
    }

    #[tokio::test]
    async fn test_panicked_port_is_inconclusive() {
        let ports: Ports = (10..16).map(Port::tcp).collect();
        let result = PortScanner::new(quick_options(), Governor::new(4))
            .with_connector(Arc::new(FragileConnector))
            .scan_target(loopback_target(ports))
            .await;

        assert_eq!(result.ports.iter().count(), 6);
        assert_eq!(result.ports.state_of(Port::tcp(13)), Some(PortState::Inconclusive));
        assert_eq!(result.ports.closed.len(), 5);
    }

    #[tokio::test]
    async fn test_each_port_lands_in_one_bucket() {
        let mut ports = Ports::new();
        for _ in 0..8 {
            ports.push(closed_port().await);
        }
        let scanner = PortScanner::new(quick_options(), Governor::new(3));
        let result = scanner.scan_target(loopback_target(ports.clone())).await;

        assert_eq!(result.ports.iter().count(), ports.len());
        for port in &ports {
            assert!(result.ports.state_of(*port).is_some());
        }
    }

    #[tokio::test]
    async fn test_unresolved_targets_are_carried_through() {
        let port = closed_port().await;
        let targets: Targets = vec![
            Target::new("gone.invalid", vec![port].into()),
            loopback_target(vec![port].into()),
            Target::new("also-gone.invalid", vec![port].into()),
        ]
        .into();

        let scanner = PortScanner::new(quick_options(), Governor::new(8));
        let results = scanner.scan_targets(targets).await;

        assert_eq!(results.resolved.len(), 1);
        assert_eq!(results.unresolved.len(), 2);
        assert_eq!(results.unresolved[0].initial, "gone.invalid");
        assert_eq!(results.unresolved[1].initial, "also-gone.invalid");
        assert!(results.resolved.iter().all(|r| r.target.is_resolved()));
    }

    #[tokio::test]
    async fn test_batch_keeps_target_order() {
        let port = closed_port().await;
        let targets: Targets = (0..5)
            .map(|i| {
                let mut target = loopback_target(vec![port].into());
                target.initial = format!("host-{i}");
                target
            })
            .collect();

        let results = PortScanner::new(quick_options(), Governor::new(2))
            .scan_targets(targets)
            .await;
        let order: Vec<&str> = results
            .resolved
            .iter()
            .map(|r| r.target.initial.as_str())
            .collect();
        assert_eq!(order, vec!["host-0", "host-1", "host-2", "host-3", "host-4"]);
    }

    #[tokio::test]
    async fn test_unresolved_target_scans_nothing() {
        let target = Target::new("nowhere.invalid", vec![Port::tcp(80)].into());
        let result = PortScanner::new(quick_options(), Governor::new(4))
            .scan_target(target)
            .await;
        assert_eq!(result.ports.iter().count(), 0);
    }

    #[tokio::test]
    async fn test_loopback_port_80_end_to_end() {
        let target = loopback_target(vec![Port::tcp(80)].into());
        let result = scan_target(target, quick_options()).await;

        if result.ports.open.is_empty() {
            let state = result.ports.state_of(Port::tcp(80));
            assert!(matches!(
                state,
                Some(PortState::Closed) | Some(PortState::Filtered)
            ));
        }
        assert_ne!(result.target.status(), TargetStatus::Unknown);
    }

    #[tokio::test]
    async fn test_discover_then_scan_loopback() {
        use crate::discovery::resolve::tests::StaticResolver;
        use crate::discovery::vendor::tests::NoVendors;
        use crate::discovery::{Discovery, DiscoveryOptions};

        let discovery = Discovery::new(DiscoveryOptions {
            ping_count: 1,
            ping_timeout: Duration::from_millis(200),
            ping_interval: Duration::from_millis(10),
            arp_timeout: Duration::from_millis(50),
            privileged: false,
            max_cidr_hosts: None,
        })
        .with_resolver(Arc::new(StaticResolver::default()))
        .with_vendor_lookup(Arc::new(NoVendors));

        let port = closed_port().await;
        let targets = discovery
            .discover("127.0.0.1", &vec![port].into())
            .await
            .unwrap();
        let results = scan_targets(targets, quick_options()).await;

        assert_eq!(results.resolved.len(), 1);
        assert!(results.unresolved.is_empty());
        let result = &results.resolved[0];
        assert_eq!(result.ports.state_of(port), Some(PortState::Closed));
        assert_eq!(result.target.status(), TargetStatus::Online);
    }
}
