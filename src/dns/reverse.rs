//! Reverse and forward DNS lookups over hickory

use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, Ipv4Addr};
use tracing::warn;

/// Error type for DNS operations
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    ResolutionError(String),

    /// The name has no IPv4 address
    #[error("no IPv4 address found for {0}")]
    NoIpv4Address(String),

    /// No PTR record found
    #[error("No PTR record found")]
    NotFound,
}

/// Perform reverse DNS lookup for an IPv4 address
///
/// Returns the first PTR name with any trailing dot removed.
pub async fn reverse_dns_lookup(
    ip: Ipv4Addr,
    resolver: &TokioResolver,
) -> Result<String, DnsError> {
    let lookup = resolver
        .reverse_lookup(IpAddr::V4(ip))
        .await
        .map_err(|e| DnsError::ResolutionError(e.to_string()))?;

    lookup
        .iter()
        .next()
        .map(|name| {
            let name_str = name.to_string();
            name_str
                .strip_suffix('.')
                .map(str::to_string)
                .unwrap_or(name_str)
        })
        .filter(|name| !name.is_empty())
        .ok_or(DnsError::NotFound)
}

/// Resolve a host name or address literal to its first IPv4 address
pub async fn resolve_ipv4(host: &str, resolver: &TokioResolver) -> Result<Ipv4Addr, DnsError> {
    let host = host.trim();
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => return Ok(ip),
        Ok(IpAddr::V6(_)) => return Err(DnsError::NoIpv4Address(host.to_string())),
        Err(_) => {}
    }

    let lookup = resolver
        .ipv4_lookup(host)
        .await
        .map_err(|e| DnsError::ResolutionError(format!("{host}: {e}")))?;

    lookup
        .iter()
        .next()
        .map(|a| a.0)
        .ok_or_else(|| DnsError::NoIpv4Address(host.to_string()))
}

/// Create a resolver following the host's own DNS configuration
///
/// Used for target names, so internal and search-domain names resolve the
/// way they do for the rest of the system. Falls back to the public
/// resolver when the system configuration cannot be read.
pub fn create_system_resolver() -> TokioResolver {
    match TokioResolver::builder_tokio() {
        Ok(builder) => builder.build(),
        Err(e) => {
            warn!(error = %e, "Cannot read system DNS configuration, using public resolvers");
            create_default_resolver()
        }
    }
}

/// Create a default DNS resolver backed by public name servers
///
/// Good enough for best-effort PTR lookups of routers on the internet.
pub fn create_default_resolver() -> TokioResolver {
    TokioResolver::builder_with_config(
        ResolverConfig::cloudflare(),
        TokioConnectionProvider::default(),
    )
    .build()
}
