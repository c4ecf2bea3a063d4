//! TCP connect probing.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API. Each probe completes the full handshake, so no elevated
//! privileges are needed.

use super::rate_limiter::RateLimiter;
use super::results::PortState;
use crate::concurrency::Governor;
use crate::error::ProbeError;
use crate::types::{Port, StatusCell, TargetStatus};
use async_trait::async_trait;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Governor weight held by one connect attempt.
pub const PROBE_WEIGHT: u32 = 1;

/// Opens one TCP connection and reports how it went.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Complete a handshake with `addr` within `deadline`. The connection
    /// is closed before returning.
    async fn connect(&self, addr: SocketAddr, deadline: Duration) -> Result<(), ProbeError>;
}

/// [`Connector`] using the operating system's TCP stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: SocketAddr, deadline: Duration) -> Result<(), ProbeError> {
        match timeout(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(ProbeError::from(e)),
            Err(_) => Err(ProbeError::TimedOut),
        }
    }
}

/// TCP connect prober for one target address.
///
/// Every attempt holds [`PROBE_WEIGHT`] of the governor while its socket
/// may be open.
#[derive(Debug, Clone)]
pub struct ConnectProber {
    ip: IpAddr,
    timeout: Duration,
    max_retries: u32,
    governor: Governor,
    rate_limiter: Option<RateLimiter>,
    connector: Arc<dyn Connector>,
}

impl ConnectProber {
    pub fn new(ip: IpAddr, timeout: Duration, max_retries: u32, governor: Governor) -> Self {
        Self {
            ip,
            timeout,
            max_retries,
            governor,
            rate_limiter: None,
            connector: Arc::new(TcpConnector),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Option<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Probe `port` and fold the evidence into `status`.
    ///
    /// Descriptor exhaustion gives the weight back, pauses, and tries again
    /// with the pause doubling each time. Once `max_retries` pauses have
    /// passed the port is reported as inconclusive.
    pub async fn scan_port(&self, port: Port, status: &StatusCell) -> PortState {
        let addr = SocketAddr::new(self.ip, port.number());
        let mut pause = self.timeout;
        let mut retries = 0;

        loop {
            if let Some(limiter) = &self.rate_limiter {
                limiter.wait().await;
            }

            let permit = self.governor.acquire(PROBE_WEIGHT).await;
            let outcome = self.connector.connect(addr, self.timeout).await;

            match outcome {
                Ok(()) => {
                    status.upgrade(TargetStatus::Online);
                    trace!(%addr, "open");
                    return PortState::Open;
                }
                Err(ProbeError::Refused) => {
                    status.upgrade(TargetStatus::Online);
                    return PortState::Closed;
                }
                Err(ProbeError::TimedOut) => {
                    status.upgrade(TargetStatus::OfflineFiltered);
                    return PortState::Filtered;
                }
                Err(ProbeError::DescriptorsExhausted) => {
                    drop(permit);
                    if retries >= self.max_retries {
                        warn!(%addr, retries, "descriptors still exhausted, giving up on port");
                        return PortState::Inconclusive;
                    }
                    retries += 1;
                    warn!(
                        %addr,
                        retry = retries,
                        pause_ms = pause.as_millis() as u64,
                        "too many open files, backing off"
                    );
                    tokio::time::sleep(pause).await;
                    pause = pause.saturating_mul(2);
                }
                Err(ProbeError::Other(e)) => {
                    debug!(%addr, error = %e, kind = ?e.kind(), "unclassified connect error");
                    return PortState::Inconclusive;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    /// Fails every connect with the same OS error and records when each
    /// attempt was made.
    #[derive(Debug)]
    struct ScriptedConnector {
        error: fn() -> io::Error,
        attempts: Mutex<Vec<Instant>>,
    }

    impl ScriptedConnector {
        fn new(error: fn() -> io::Error) -> Arc<Self> {
            Arc::new(Self {
                error,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _addr: SocketAddr, _deadline: Duration) -> Result<(), ProbeError> {
            self.attempts.lock().unwrap().push(Instant::now());
            Err(ProbeError::from((self.error)()))
        }
    }

    fn scripted_prober(
        connector: Arc<ScriptedConnector>,
        max_retries: u32,
        governor: Governor,
    ) -> ConnectProber {
        ConnectProber::new(
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            Duration::from_millis(100),
            max_retries,
            governor,
        )
        .with_connector(connector)
    }

    #[cfg(unix)]
    fn emfile() -> io::Error {
        io::Error::from_raw_os_error(libc::EMFILE)
    }

    fn loopback_prober(timeout: Duration) -> ConnectProber {
        ConnectProber::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            timeout,
            2,
            Governor::new(8),
        )
    }

    #[tokio::test]
    async fn test_listening_port_is_open() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = Port::tcp(listener.local_addr().unwrap().port());
        let status = StatusCell::default();

        let state = loopback_prober(Duration::from_secs(1))
            .scan_port(port, &status)
            .await;
        assert_eq!(state, PortState::Open);
        assert_eq!(status.get(), TargetStatus::Online);
    }

    #[tokio::test]
    async fn test_refused_port_is_closed_and_proves_liveness() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = Port::tcp(listener.local_addr().unwrap().port());
        drop(listener);
        let status = StatusCell::default();

        let state = loopback_prober(Duration::from_secs(1))
            .scan_port(port, &status)
            .await;
        assert_eq!(state, PortState::Closed);
        assert_eq!(status.get(), TargetStatus::Online);
    }

    #[tokio::test]
    async fn test_refusal_beats_earlier_timeout() {
        let status = StatusCell::default();
        status.upgrade(TargetStatus::OfflineFiltered);

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = Port::tcp(listener.local_addr().unwrap().port());
        drop(listener);

        loopback_prober(Duration::from_secs(1))
            .scan_port(port, &status)
            .await;
        assert_eq!(status.get(), TargetStatus::Online);
    }

    #[tokio::test]
    async fn test_permit_released_after_scan() {
        let governor = Governor::new(4);
        let prober = ConnectProber::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Duration::from_secs(1),
            0,
            governor.clone(),
        );
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = Port::tcp(listener.local_addr().unwrap().port());

        prober.scan_port(port, &StatusCell::default()).await;
        assert_eq!(governor.in_use(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_filtered() {
        let connector = ScriptedConnector::new(|| io::Error::from(io::ErrorKind::TimedOut));
        let status = StatusCell::default();
        let state = scripted_prober(connector.clone(), 3, Governor::new(4))
            .scan_port(Port::tcp(443), &status)
            .await;

        assert_eq!(state, PortState::Filtered);
        assert_eq!(status.get(), TargetStatus::OfflineFiltered);
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_never_downgrades_online() {
        let connector = ScriptedConnector::new(|| io::Error::from(io::ErrorKind::TimedOut));
        let status = StatusCell::default();
        status.upgrade(TargetStatus::Online);
        scripted_prober(connector, 0, Governor::new(4))
            .scan_port(Port::tcp(443), &status)
            .await;
        assert_eq!(status.get(), TargetStatus::Online);
    }

    #[tokio::test]
    async fn test_unclassified_error_is_inconclusive() {
        let connector =
            ScriptedConnector::new(|| io::Error::from(io::ErrorKind::PermissionDenied));
        let status = StatusCell::default();
        let state = scripted_prober(connector.clone(), 3, Governor::new(4))
            .scan_port(Port::tcp(25), &status)
            .await;

        assert_eq!(state, PortState::Inconclusive);
        assert_eq!(status.get(), TargetStatus::Unknown);
        assert_eq!(connector.attempts().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_backs_off_then_gives_up() {
        let connector = ScriptedConnector::new(emfile);
        let status = StatusCell::default();
        let state = scripted_prober(connector.clone(), 3, Governor::new(4))
            .scan_port(Port::tcp(8080), &status)
            .await;

        assert_eq!(state, PortState::Inconclusive);
        assert_eq!(status.get(), TargetStatus::Unknown);

        // One first try plus one per retry, with the pause doubling from
        // the connect timeout.
        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 4);
        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        let expected = [100, 200, 400].map(Duration::from_millis);
        for (gap, expected) in gaps.iter().zip(expected) {
            assert!(*gap >= expected, "gap {gap:?} shorter than {expected:?}");
            assert!(*gap < expected + Duration::from_millis(20), "gap {gap:?}");
        }
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_releases_weight_while_paused() {
        let governor = Governor::new(4);
        let connector = ScriptedConnector::new(emfile);
        let prober = scripted_prober(connector.clone(), 2, governor.clone());

        let task = tokio::spawn(async move {
            prober.scan_port(Port::tcp(8080), &StatusCell::default()).await
        });
        while connector.attempts().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(governor.in_use(), 0);

        assert_eq!(task.await.unwrap(), PortState::Inconclusive);
        assert_eq!(connector.attempts().len(), 3);
        assert_eq!(governor.in_use(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_retries_gives_up_at_once() {
        let connector = ScriptedConnector::new(emfile);
        let state = scripted_prober(connector.clone(), 0, Governor::new(4))
            .scan_port(Port::tcp(8080), &StatusCell::default())
            .await;
        assert_eq!(state, PortState::Inconclusive);
        assert_eq!(connector.attempts().len(), 1);
    }
}
