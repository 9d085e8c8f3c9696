//! netpath - hop-by-hop ICMP path diagnostics
//!
//! This library probes the network path to a target one TTL at a time and
//! reports per-hop latency, jitter, loss, health and a best-effort guess at
//! each device. It offers one-shot traces and continuously re-probed
//! monitoring sessions.
//!
//! Raw ICMP sockets need elevated privileges (Administrator on Windows,
//! root or CAP_NET_RAW elsewhere). Missing privileges are reported as
//! [`TracerouteError::InsufficientPermissions`], never as a network timeout.
//!
//! # Examples
//!
//! ```no_run
//! use netpath::{ManagerConfig, PathSessionManager, ProbeConfig, Services};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = PathSessionManager::new(Services::new(), ManagerConfig::default());
//!
//!     // One cycle, no session
//!     let result = manager.probe_once("example.com", ProbeConfig::default()).await?;
//!     for hop in &result.hops {
//!         println!("{:>2} {:?} {}", hop.index, hop.ip, hop.status);
//!     }
//!
//!     // Continuous monitoring
//!     manager.start("example.com", ProbeConfig::default()).await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dns;
pub mod services;
pub mod session;
pub mod socket;
pub mod traceroute;

// Re-export core types for library users
pub use config::{ManagerConfig, ProbeConfig, ProbeConfigBuilder};
pub use services::Services;
pub use session::{PathSessionManager, Session, SessionError, SessionStatus};
pub use socket::{IcmpTransport, ProbeReply, ReplyKind, TransportError, TransportFactory};
pub use traceroute::{
    DeviceType, Hop, HopStatus, PathResult, PathTracer, TraceFailure, TraceRouteResult,
    TracerouteError, Traceroute,
};
