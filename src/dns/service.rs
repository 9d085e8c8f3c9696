//! Name resolution service
//!
//! The engine only needs two things from DNS: the first IPv4 address of a
//! target, and a best-effort PTR name for each responding hop. Both sit
//! behind the [`Resolver`] trait so hosts embedding the engine (and tests)
//! can supply their own.

use super::cache::RdnsCache;
use super::reverse::{
    create_default_resolver, create_system_resolver, resolve_ipv4, reverse_dns_lookup, DnsError,
};
use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::trace;

/// Forward and reverse resolution used by the probing engine
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a host name or literal to its first IPv4 address
    async fn resolve_ipv4(&self, target: &str) -> Result<Ipv4Addr, DnsError>;

    /// Best-effort reverse lookup; any failure yields `None`
    async fn reverse(&self, ip: Ipv4Addr) -> Option<String>;
}

/// hickory-backed resolver with a reverse DNS cache
///
/// Targets are resolved through the host's DNS configuration; PTR lookups
/// for hops go to public name servers.
///
/// # Examples
///
/// ```no_run
/// use netpath::dns::{HickoryResolver, Resolver};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let resolver = HickoryResolver::new();
///
///     let ip = resolver.resolve_ipv4("example.com").await?;
///     println!("{} -> {:?}", ip, resolver.reverse(ip).await);
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct HickoryResolver {
    cache: RdnsCache,
    forward: Arc<OnceCell<TokioResolver>>,
    reverse: Arc<OnceCell<TokioResolver>>,
}

impl HickoryResolver {
    /// Create a resolver with the default cache TTL (1 hour)
    pub fn new() -> Self {
        Self::with_cache(RdnsCache::with_default_ttl())
    }

    /// Create a resolver using the given reverse DNS cache
    pub fn with_cache(cache: RdnsCache) -> Self {
        Self {
            cache,
            forward: Arc::new(OnceCell::new()),
            reverse: Arc::new(OnceCell::new()),
        }
    }

    /// Reverse DNS cache shared by clones of this resolver
    pub fn cache(&self) -> &RdnsCache {
        &self.cache
    }

    async fn forward(&self) -> &TokioResolver {
        self.forward
            .get_or_init(|| async { create_system_resolver() })
            .await
    }

    async fn reverse_resolver(&self) -> &TokioResolver {
        self.reverse
            .get_or_init(|| async { create_default_resolver() })
            .await
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for HickoryResolver {
    async fn resolve_ipv4(&self, target: &str) -> Result<Ipv4Addr, DnsError> {
        resolve_ipv4(target, self.forward().await).await
    }

    async fn reverse(&self, ip: Ipv4Addr) -> Option<String> {
        if let Some(cached) = self.cache.get(&ip) {
            return cached;
        }

        let hostname = match reverse_dns_lookup(ip, self.reverse_resolver().await).await {
            Ok(name) => Some(name),
            Err(e) => {
                trace!(%ip, error = %e, "Reverse lookup failed");
                None
            }
        };
        self.cache.insert(ip, hostname.clone());
        hostname
    }
}
