//! Configuration types for path probing and monitoring sessions

pub mod defaults;

use defaults::{
    DEFAULT_HISTORY_SIZE, DEFAULT_MAX_HOPS, DEFAULT_MAX_SESSIONS, DEFAULT_PROBES_PER_HOP,
    DEFAULT_TIMEOUT_MS, MAX_PROBES_PER_HOP, MAX_TTL,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-cycle probing configuration
///
/// Fields are signed because callers (typically an HTTP handler decoding
/// JSON) may supply partial or nonsensical values. Nothing here is ever
/// rejected: [`ProbeConfig::normalized`] swaps every zero or negative field
/// for its default.
///
/// # Examples
///
/// ```
/// use netpath::ProbeConfig;
///
/// let config = ProbeConfig {
///     max_hops: 0,
///     timeout_ms: -5,
///     probes_per_hop: 0,
///     history_size: 10,
/// }
/// .normalized();
///
/// assert_eq!(config.max_hops, 30);
/// assert_eq!(config.timeout_ms, 3000);
/// assert_eq!(config.probes_per_hop, 3);
/// assert_eq!(config.history_size, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Maximum TTL to probe (default: 30)
    pub max_hops: i64,
    /// Per-probe reply timeout in milliseconds (default: 3000)
    #[serde(alias = "timeout")]
    pub timeout_ms: i64,
    /// Echo requests sent per TTL (default: 3)
    pub probes_per_hop: i64,
    /// Cycles retained by a monitoring session (default: 60)
    pub history_size: i64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS as i64,
            timeout_ms: DEFAULT_TIMEOUT_MS as i64,
            probes_per_hop: DEFAULT_PROBES_PER_HOP as i64,
            history_size: DEFAULT_HISTORY_SIZE as i64,
        }
    }
}

impl ProbeConfig {
    /// Create a new ProbeConfig builder
    pub fn builder() -> ProbeConfigBuilder {
        ProbeConfigBuilder::new()
    }

    /// A config with every field unset, to be filled by [`normalized`](Self::normalized)
    pub fn unset() -> Self {
        Self {
            max_hops: 0,
            timeout_ms: 0,
            probes_per_hop: 0,
            history_size: 0,
        }
    }

    /// Replace zero or negative fields with defaults and clamp to field widths
    pub fn normalized(self) -> Self {
        fn or_default(value: i64, default: i64) -> i64 {
            if value <= 0 {
                default
            } else {
                value
            }
        }

        Self {
            max_hops: or_default(self.max_hops, DEFAULT_MAX_HOPS as i64).min(MAX_TTL as i64),
            timeout_ms: or_default(self.timeout_ms, DEFAULT_TIMEOUT_MS as i64),
            probes_per_hop: or_default(self.probes_per_hop, DEFAULT_PROBES_PER_HOP as i64)
                .min(MAX_PROBES_PER_HOP as i64),
            history_size: or_default(self.history_size, DEFAULT_HISTORY_SIZE as i64),
        }
    }

    /// Highest TTL probed, after normalization
    pub fn ttl_limit(&self) -> u8 {
        self.normalized().max_hops as u8
    }

    /// Per-probe timeout, after normalization
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.normalized().timeout_ms as u64)
    }

    /// Probes per hop, after normalization
    pub fn probe_count(&self) -> u32 {
        self.normalized().probes_per_hop as u32
    }

    /// History capacity, after normalization
    pub fn history_limit(&self) -> usize {
        self.normalized().history_size as usize
    }
}

/// Builder for ProbeConfig
///
/// Starts from an unset config, so anything not specified takes its default.
#[derive(Debug, Clone)]
pub struct ProbeConfigBuilder {
    config: ProbeConfig,
}

impl ProbeConfigBuilder {
    /// Create a new builder with every field unset
    pub fn new() -> Self {
        Self {
            config: ProbeConfig::unset(),
        }
    }

    /// Set the maximum number of hops
    pub fn max_hops(mut self, hops: i64) -> Self {
        self.config.max_hops = hops;
        self
    }

    /// Set the per-probe timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        self
    }

    /// Set the per-probe timeout in milliseconds
    pub fn timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Set the number of probes per hop
    pub fn probes_per_hop(mut self, probes: i64) -> Self {
        self.config.probes_per_hop = probes;
        self
    }

    /// Set the number of cycles retained by a session
    pub fn history_size(mut self, size: i64) -> Self {
        self.config.history_size = size;
        self
    }

    /// Build the normalized configuration
    pub fn build(self) -> ProbeConfig {
        self.config.normalized()
    }
}

impl Default for ProbeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of the session manager itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Maximum number of tracked sessions, running or stopped (default: 10)
    pub max_sessions: usize,
    /// Interval between cycles of each session (default: 60s)
    pub probe_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            probe_interval: defaults::probe_interval(),
        }
    }
}

impl ManagerConfig {
    /// Set the session capacity; zero keeps the default
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        if max_sessions > 0 {
            self.max_sessions = max_sessions;
        }
        self
    }

    /// Set the probe interval; zero keeps the default
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.probe_interval = interval;
        }
        self
    }
}
