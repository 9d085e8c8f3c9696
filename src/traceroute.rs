//! Hop-by-hop path probing
//!
//! Two modes share the same TTL loop:
//! - [`PathTracer`] runs NetPath cycles producing a [`PathResult`] with
//!   per-hop statistics, health, bottleneck flags and device inference.
//! - [`Traceroute`] runs a one-shot trace producing the lighter
//!   [`TraceRouteResult`].

pub mod device;
pub mod engine;
pub mod error;
pub mod hop;
pub mod oneshot;
pub mod result;
pub mod stats;
pub mod types;

pub use device::infer_device;
pub use engine::PathTracer;
pub use error::TracerouteError;
pub use hop::{HopProber, HopSamples};
pub use oneshot::{TraceFailure, TraceHop, TraceRouteResult, Traceroute};
pub use result::PathResult;
pub use stats::LatencyStats;
pub use types::{DeviceInfo, DeviceType, Hop, HopStatus};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
