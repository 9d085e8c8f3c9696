//! NetPath probing cycle
//!
//! [`PathTracer`] walks TTL 1..=max_hops over a single transport, one hop at
//! a time, and stops as soon as the target itself answers. Along the way it
//! flags latency jumps between consecutive hops and collects problem hops.

use super::error::TracerouteError;
use super::hop::HopProber;
use super::result::PathResult;
use super::stats::{is_bottleneck, packet_loss_pct};
use super::unix_millis;
use crate::config::ProbeConfig;
use crate::services::Services;
use crate::socket::IcmpTransport;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Runs NetPath probing cycles
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use netpath::traceroute::PathTracer;
/// use netpath::{ProbeConfig, Services};
/// use std::time::Duration;
///
/// let tracer = PathTracer::new(Services::new());
/// let config = ProbeConfig::builder().max_hops(20).timeout_ms(1000).build();
///
/// // Give up after ten seconds but keep whatever hops were gathered
/// let result = tracer
///     .probe_once_within("example.com", &config, Duration::from_secs(10))
///     .await?;
/// if result.interrupted {
///     println!("partial path: {} hops", result.hop_count());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PathTracer {
    services: Services,
    prober: HopProber,
}

impl PathTracer {
    /// Create a tracer using the given collaborators
    pub fn new(services: Services) -> Self {
        let prober = HopProber::new(services.resolver.clone());
        Self { services, prober }
    }

    /// Collaborators used by this tracer
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Run one cycle towards an already resolved target
    ///
    /// Never fails: per-probe problems become lost packets. When `deadline`
    /// passes before the target answers, the hops gathered so far are
    /// returned with `interrupted` set.
    pub async fn trace(
        &self,
        transport: &mut dyn IcmpTransport,
        target_ip: Ipv4Addr,
        config: &ProbeConfig,
        deadline: Option<Instant>,
    ) -> PathResult {
        let config = config.normalized();
        let started = Instant::now();
        let mut result = PathResult::new(target_ip, unix_millis());

        let mut previous_avg = 0.0;
        let mut sent = 0u32;
        let mut received = 0u32;

        for ttl in 1..=config.ttl_limit() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let mut hop = self
                .prober
                .probe(transport, target_ip, ttl, &config, deadline)
                .await;
            result.total_hops = ttl;

            if is_bottleneck(previous_avg, hop.avg_latency) {
                debug!(
                    %target_ip,
                    ttl,
                    previous_ms = previous_avg,
                    current_ms = hop.avg_latency,
                    "Latency jump"
                );
                hop.is_bottleneck = true;
                result.flag_problem(ttl);
            }
            if hop.status.is_problem() {
                result.flag_problem(ttl);
            }
            previous_avg = hop.avg_latency;
            sent += hop.packets_sent;
            received += hop.packets_received;

            let reached = hop.is_destination(target_ip);
            if reached {
                result.completed = true;
                result.total_latency_ms = hop.avg_latency;
            }
            result.hops.push(hop);
            if reached {
                break;
            }
        }

        result.interrupted =
            !result.completed && deadline.is_some_and(|d| Instant::now() >= d);
        result.overall_packet_loss_pct = packet_loss_pct(sent, received);
        result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            %target_ip,
            hops = result.total_hops,
            completed = result.completed,
            interrupted = result.interrupted,
            loss_pct = result.overall_packet_loss_pct,
            duration_ms = result.duration_ms,
            "Probe cycle finished"
        );
        result
    }

    /// Resolve `target`, open a fresh transport and run one cycle
    ///
    /// Independent of any monitoring session.
    pub async fn probe_once(
        &self,
        target: &str,
        config: &ProbeConfig,
    ) -> Result<PathResult, TracerouteError> {
        let target_ip = self.services.resolver.resolve_ipv4(target).await?;
        let mut transport = self.services.transports.open()?;
        Ok(self
            .trace(transport.as_mut(), target_ip, config, None)
            .await)
    }

    /// Like [`probe_once`](Self::probe_once), bounded by a wall-clock limit
    ///
    /// If the limit expires mid-cycle the partial result is returned with
    /// `interrupted` set. Running out of time while still resolving the
    /// target yields [`TracerouteError::DeadlineExceeded`].
    pub async fn probe_once_within(
        &self,
        target: &str,
        config: &ProbeConfig,
        limit: Duration,
    ) -> Result<PathResult, TracerouteError> {
        let started = Instant::now();
        let deadline = started + limit;

        let target_ip =
            match tokio::time::timeout_at(deadline, self.services.resolver.resolve_ipv4(target))
                .await
            {
                Ok(resolved) => resolved?,
                Err(_) => {
                    return Err(TracerouteError::DeadlineExceeded {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    })
                }
            };

        let mut transport = self.services.transports.open()?;
        Ok(self
            .trace(transport.as_mut(), target_ip, config, Some(deadline))
            .await)
    }
}
