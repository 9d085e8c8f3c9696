//! Service container for the netpath library
//!
//! Bundles the external collaborators the probing engine depends on: name
//! resolution and raw ICMP socket access. The tracer and the session manager
//! share one container, so every session benefits from the same reverse DNS
//! cache.

use crate::dns::{HickoryResolver, Resolver};
use crate::socket::{RawIcmpTransportFactory, TransportFactory};
use std::sync::Arc;

/// Container for all services used by the probing engine
///
/// Services are thread-safe internally, so no outer locking is needed.
///
/// # Examples
///
/// ```no_run
/// use netpath::services::Services;
/// use netpath::traceroute::PathTracer;
/// use netpath::ProbeConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tracer = PathTracer::new(Services::new());
///     let result = tracer.probe_once("example.com", &ProbeConfig::default()).await?;
///     println!("{} hops, completed: {}", result.total_hops, result.completed);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Services {
    /// Forward and reverse DNS
    pub resolver: Arc<dyn Resolver>,
    /// Source of raw ICMP transports
    pub transports: Arc<dyn TransportFactory>,
}

impl Services {
    /// Create services backed by hickory DNS and raw ICMP sockets
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(HickoryResolver::new()),
            transports: Arc::new(RawIcmpTransportFactory::new()),
        }
    }

    /// Create services from custom implementations
    ///
    /// Hosts that already own a resolver, and tests that script replies,
    /// plug in here.
    pub fn with_components(
        resolver: Arc<dyn Resolver>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            resolver,
            transports,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
