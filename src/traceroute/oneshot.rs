//! One-shot traceroute
//!
//! A lighter cousin of the NetPath cycle: three probes per hop reported as
//! discrete latency slots, no device inference and no health
//! classification. Nothing is retained between runs.

use super::error::TracerouteError;
use super::hop::{HopProber, HopSamples};
use super::unix_millis;
use crate::config::defaults::ONE_SHOT_PROBES_PER_HOP;
use crate::config::ProbeConfig;
use crate::services::Services;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Address text of the synthetic hop reported when raw sockets are refused
pub const PRIVILEGE_HOP_LABEL: &str = "Requires Administrator privileges for ICMP";

/// Latency slot value for a lost probe
pub const LOST_PROBE: f64 = -1.0;

/// One hop of a one-shot trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHop {
    /// TTL (1-based)
    pub hop: u8,
    /// First address that answered, empty when none did
    pub ip: String,
    /// Reverse DNS name of `ip`
    pub hostname: Option<String>,
    /// RTT of the first probe in ms, -1 if lost
    pub latency1: f64,
    /// RTT of the second probe in ms, -1 if lost
    pub latency2: f64,
    /// RTT of the third probe in ms, -1 if lost
    pub latency3: f64,
    /// Mean RTT of the answered probes, 0 when none answered
    pub avg_latency: f64,
    /// Number of lost probes
    pub loss: u32,
    /// True when no probe was answered
    pub timeout: bool,
}

impl TraceHop {
    fn from_samples(samples: &HopSamples) -> Self {
        let slot = |i: usize| samples.slots.get(i).copied().flatten().unwrap_or(LOST_PROBE);
        let latencies = samples.latencies();
        let avg_latency = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        Self {
            hop: samples.ttl,
            ip: samples.responder.map(|ip| ip.to_string()).unwrap_or_default(),
            hostname: samples.hostname.clone(),
            latency1: slot(0),
            latency2: slot(1),
            latency3: slot(2),
            avg_latency,
            loss: samples.sent() - samples.received(),
            timeout: samples.received() == 0,
        }
    }

    fn privilege_required() -> Self {
        Self {
            hop: 1,
            ip: PRIVILEGE_HOP_LABEL.to_string(),
            hostname: None,
            latency1: LOST_PROBE,
            latency2: LOST_PROBE,
            latency3: LOST_PROBE,
            avg_latency: 0.0,
            loss: ONE_SHOT_PROBES_PER_HOP,
            timeout: true,
        }
    }
}

/// Result of a one-shot trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRouteResult {
    /// Target as given by the caller
    pub target: String,
    /// Resolved target address
    pub target_ip: Ipv4Addr,
    /// Hops in increasing TTL order
    pub hops: Vec<TraceHop>,
    /// Highest TTL probed
    pub total_hops: u8,
    /// True when the target itself answered
    pub completed: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,
    /// Start time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

/// A one-shot trace that failed, with whatever was gathered before it did
#[derive(Debug, Error)]
#[error("trace failed")]
pub struct TraceFailure {
    /// What went wrong
    #[source]
    pub error: TracerouteError,
    /// Hops gathered before the failure, if the target was resolved
    pub partial: Option<TraceRouteResult>,
}

impl TraceFailure {
    fn bare(error: TracerouteError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// One-shot traceroute runner
///
/// # Examples
///
/// ```no_run
/// # async fn example() {
/// use netpath::traceroute::Traceroute;
/// use netpath::Services;
///
/// match Traceroute::new(Services::new()).run("example.com").await {
///     Ok(result) => println!("{} hops", result.total_hops),
///     Err(failure) if failure.error.is_permission_error() => {
///         eprintln!("{}", failure.error);
///     }
///     Err(failure) => eprintln!("{:?}", failure.partial),
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Traceroute {
    services: Services,
    prober: HopProber,
    config: ProbeConfig,
}

impl Traceroute {
    /// Create a runner with default max hops and timeout
    pub fn new(services: Services) -> Self {
        Self::with_config(services, ProbeConfig::default())
    }

    /// Create a runner using `config`'s max hops and timeout
    ///
    /// The number of probes per hop is fixed at three.
    pub fn with_config(services: Services, config: ProbeConfig) -> Self {
        let prober = HopProber::new(services.resolver.clone());
        Self {
            services,
            prober,
            config: config.normalized(),
        }
    }

    /// Trace the path to `target`
    pub async fn run(&self, target: &str) -> Result<TraceRouteResult, TraceFailure> {
        self.execute(target, None).await
    }

    /// Trace the path to `target`, giving up after `limit`
    ///
    /// On expiry the failure carries [`TracerouteError::DeadlineExceeded`]
    /// and the hops gathered so far.
    pub async fn run_within(
        &self,
        target: &str,
        limit: Duration,
    ) -> Result<TraceRouteResult, TraceFailure> {
        self.execute(target, Some(limit)).await
    }

    async fn execute(
        &self,
        target: &str,
        limit: Option<Duration>,
    ) -> Result<TraceRouteResult, TraceFailure> {
        let started = Instant::now();
        let deadline = limit.map(|l| started + l);
        let exceeded = || TracerouteError::DeadlineExceeded {
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let resolve = self.services.resolver.resolve_ipv4(target);
        let target_ip = match deadline {
            Some(d) => match tokio::time::timeout_at(d, resolve).await {
                Ok(resolved) => resolved,
                Err(_) => return Err(TraceFailure::bare(exceeded())),
            },
            None => resolve.await,
        }
        .map_err(|e| TraceFailure::bare(e.into()))?;

        let mut result = TraceRouteResult {
            target: target.to_string(),
            target_ip,
            hops: Vec::new(),
            total_hops: 0,
            completed: false,
            duration_ms: 0.0,
            timestamp_ms: unix_millis(),
        };

        let mut transport = match self.services.transports.open() {
            Ok(transport) => transport,
            Err(e) if e.is_permission_denied() => {
                warn!(target, error = %e, "Raw ICMP socket refused");
                result.hops.push(TraceHop::privilege_required());
                result.total_hops = 1;
                result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                return Err(TraceFailure {
                    error: TracerouteError::insufficient_permissions(),
                    partial: Some(result),
                });
            }
            Err(e) => return Err(TraceFailure::bare(e.into())),
        };

        for ttl in 1..=self.config.ttl_limit() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                return Err(TraceFailure {
                    error: exceeded(),
                    partial: Some(result),
                });
            }

            let samples = self
                .prober
                .collect(
                    transport.as_mut(),
                    target_ip,
                    ttl,
                    ONE_SHOT_PROBES_PER_HOP,
                    &self.config,
                    deadline,
                )
                .await;
            let reached = samples.responder == Some(target_ip);
            result.hops.push(TraceHop::from_samples(&samples));
            result.total_hops = ttl;

            if reached {
                result.completed = true;
                break;
            }
        }

        result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            target,
            %target_ip,
            hops = result.total_hops,
            completed = result.completed,
            "Traceroute finished"
        );
        Ok(result)
    }
}
