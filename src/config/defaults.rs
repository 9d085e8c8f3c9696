//! Compile-time defaults for probing and session management
//!
//! Caller-supplied configuration is never rejected: any zero field is
//! replaced with the matching constant from this module before use.

use std::time::Duration;

/// Default maximum number of hops (TTL ceiling)
pub const DEFAULT_MAX_HOPS: u32 = 30;
/// Default per-probe timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
/// Default number of echo requests sent for each TTL
pub const DEFAULT_PROBES_PER_HOP: u32 = 3;
/// Default number of cycles retained per monitoring session (one hour at 1/min)
pub const DEFAULT_HISTORY_SIZE: usize = 60;

/// Default interval between cycles of a monitoring session in seconds
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 60;
/// Default maximum number of tracked monitoring sessions
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Highest TTL that fits the IPv4 header field
pub const MAX_TTL: u32 = 255;
/// Upper bound on probes per hop; keeps `ttl * 100 + index` within a u16 sequence
pub const MAX_PROBES_PER_HOP: u32 = 99;

/// Number of latency slots reported per hop by the one-shot traceroute
pub const ONE_SHOT_PROBES_PER_HOP: u32 = 3;

/// Time-to-live of cached reverse DNS answers
pub const RDNS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default interval between monitoring cycles
pub fn probe_interval() -> Duration {
    Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS)
}
