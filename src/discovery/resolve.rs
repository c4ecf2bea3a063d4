//! Name resolution for targets.
//!
//! Literal IPs are taken as given and reverse-resolved for a display
//! name. Hostnames are forward-resolved (first address wins); failure to
//! do so leaves the target unresolved.

use crate::error::DnsError;
use crate::types::{Target, TargetStatus};
use async_trait::async_trait;
use std::net::IpAddr;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Forward and reverse DNS lookups.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to its first address.
    async fn lookup_ip(&self, host: &str) -> Result<IpAddr, DnsError>;

    /// Resolve `ip` to its first PTR name.
    async fn reverse_lookup(&self, ip: IpAddr) -> Result<String, DnsError>;
}

/// [`HostResolver`] backed by `trust-dns-resolver`.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
}

impl DnsResolver {
    /// Use the system resolver configuration, or public defaults if it
    /// cannot be read.
    pub fn from_system() -> Self {
        let inner = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!(error = %e, "system resolver config unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { inner }
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn lookup_ip(&self, host: &str) -> Result<IpAddr, DnsError> {
        let response = self.inner.lookup_ip(host).await.map_err(|e| DnsError::Failed {
            name: host.to_string(),
            reason: e.to_string(),
        })?;
        response
            .iter()
            .next()
            .ok_or_else(|| DnsError::NotFound(host.to_string()))
    }

    async fn reverse_lookup(&self, ip: IpAddr) -> Result<String, DnsError> {
        let response = self.inner.reverse_lookup(ip).await.map_err(|e| DnsError::Failed {
            name: ip.to_string(),
            reason: e.to_string(),
        })?;
        response
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .ok_or_else(|| DnsError::NotFound(ip.to_string()))
    }
}

/// Fill in the identity fields of `target`. Returns whether it resolved.
pub async fn resolve_target(target: &mut Target, resolver: &dyn HostResolver) -> bool {
    if let Ok(ip) = target.initial.parse::<IpAddr>() {
        target.ip = Some(ip);
        target.hostname = resolver.reverse_lookup(ip).await.ok();
        return true;
    }

    match resolver.lookup_ip(&target.initial).await {
        Ok(ip) => {
            target.ip = Some(ip);
            target.hostname = Some(
                resolver
                    .reverse_lookup(ip)
                    .await
                    .unwrap_or_else(|_| target.initial.clone()),
            );
            true
        }
        Err(e) => {
            debug!(host = %target.initial, error = %e, "resolution failed");
            target.ip = None;
            target.status.upgrade(TargetStatus::OfflineFiltered);
            false
        }
    }
}
