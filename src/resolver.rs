//! Hostname resolution
//!
//! Each call is a fresh lookup; address order is whatever the system
//! resolver returns.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::metrics;

/// Hostname to network addresses.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolve `hostname` to its addresses. Non-existent hostnames and
    /// transient DNS failures are both errors.
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolver backed by the system resolver via the runtime.
pub struct DnsResolver;

impl DnsResolver {
    /// Create a resolver.
    pub fn new() -> Self {
        Self
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, ResolveError> {
        metrics::RESOLVER_RESOLVES_TOTAL.inc();

        match tokio::net::lookup_host((hostname, 0u16)).await {
            Ok(addrs) => Ok(addrs.map(|addr| addr.ip()).collect()),
            Err(e) => {
                metrics::RESOLVER_RESOLVE_FAILURES_TOTAL.inc();
                Err(ResolveError::Lookup {
                    hostname: hostname.to_string(),
                    source: e,
                })
            }
        }
    }
}
