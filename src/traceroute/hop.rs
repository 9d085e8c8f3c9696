//! Per-TTL probing
//!
//! [`HopProber`] sends the configured number of echo requests for one TTL,
//! one after another over a single transport, and turns the replies into a
//! [`Hop`]. Probe failures of any kind count as lost packets.

use super::device::infer_device;
use super::stats::{classify, packet_loss_pct, LatencyStats};
use super::types::Hop;
use crate::config::ProbeConfig;
use crate::dns::Resolver;
use crate::socket::{IcmpTransport, TransportError};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Sequence number of a probe: unique per (ttl, probe index) within a cycle
pub fn probe_sequence(ttl: u8, probe_index: u32) -> u16 {
    u16::from(ttl) * 100 + probe_index as u16
}

/// Raw outcome of probing one TTL, before statistics
#[derive(Debug, Clone, PartialEq)]
pub struct HopSamples {
    /// TTL probed
    pub ttl: u8,
    /// First address that answered
    pub responder: Option<Ipv4Addr>,
    /// Reverse DNS name of `responder`
    pub hostname: Option<String>,
    /// One slot per probe sent: the RTT in milliseconds, or `None` if lost
    pub slots: Vec<Option<f64>>,
}

impl HopSamples {
    /// Number of probes sent
    pub fn sent(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of probes answered
    pub fn received(&self) -> u32 {
        self.slots.iter().filter(|s| s.is_some()).count() as u32
    }

    /// RTTs of the answered probes, in send order
    pub fn latencies(&self) -> Vec<f64> {
        self.slots.iter().flatten().copied().collect()
    }
}

/// Probes one TTL at a time
#[derive(Clone)]
pub struct HopProber {
    resolver: Arc<dyn Resolver>,
}

impl HopProber {
    /// Create a prober that resolves responder names with `resolver`
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Send `probes` echo requests at `ttl` and collect the replies
    ///
    /// Each probe waits at most `config`'s timeout, and never past
    /// `deadline`. Probes whose turn comes after `deadline` are not sent but
    /// still count as lost.
    pub async fn collect(
        &self,
        transport: &mut dyn IcmpTransport,
        target: Ipv4Addr,
        ttl: u8,
        probes: u32,
        config: &ProbeConfig,
        deadline: Option<Instant>,
    ) -> HopSamples {
        let timeout = config.probe_timeout();
        let mut slots = Vec::with_capacity(probes as usize);
        let mut responder = None;

        for index in 0..probes {
            let now = Instant::now();
            let mut probe_deadline = now + timeout;
            if let Some(limit) = deadline {
                if now >= limit {
                    slots.push(None);
                    continue;
                }
                probe_deadline = probe_deadline.min(limit);
            }

            let sequence = probe_sequence(ttl, index);
            match transport.send(target, ttl, sequence, probe_deadline).await {
                Ok(reply) => {
                    responder.get_or_insert(reply.responder);
                    slots.push(Some(reply.rtt_ms()));
                }
                Err(TransportError::Timeout) => slots.push(None),
                Err(e) => {
                    debug!(%target, ttl, sequence, error = %e, "Probe failed");
                    slots.push(None);
                }
            }
        }

        let hostname = match responder {
            Some(ip) => self.resolver.reverse(ip).await,
            None => None,
        };

        HopSamples {
            ttl,
            responder,
            hostname,
            slots,
        }
    }

    /// Probe one TTL and produce the full hop record
    pub async fn probe(
        &self,
        transport: &mut dyn IcmpTransport,
        target: Ipv4Addr,
        ttl: u8,
        config: &ProbeConfig,
        deadline: Option<Instant>,
    ) -> Hop {
        let samples = self
            .collect(transport, target, ttl, config.probe_count(), config, deadline)
            .await;
        let hop = build_hop(samples);
        debug!(
            %target,
            ttl,
            ip = ?hop.ip,
            avg_ms = hop.avg_latency,
            loss_pct = hop.packet_loss_pct,
            status = %hop.status,
            "Hop probed"
        );
        hop
    }
}

impl std::fmt::Debug for HopProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HopProber").finish_non_exhaustive()
    }
}

/// Compute statistics, health and device inference for collected samples
pub fn build_hop(samples: HopSamples) -> Hop {
    let latencies = samples.latencies();
    let sent = samples.sent();
    let received = samples.received();
    let stats = LatencyStats::from_samples(&latencies);
    let loss = packet_loss_pct(sent, received);
    let device = infer_device(samples.hostname.as_deref(), samples.responder, samples.ttl);

    Hop {
        index: samples.ttl,
        ip: samples.responder,
        hostname: samples.hostname,
        device_type: device.device_type,
        device_vendor: device.vendor,
        device_name: Some(device.name),
        location: device.location,
        latencies,
        avg_latency: stats.avg,
        min_latency: stats.min,
        max_latency: stats.max,
        jitter: stats.jitter,
        packets_sent: sent,
        packets_received: received,
        packet_loss_pct: loss,
        status: classify(received, loss, &stats),
        timeout: received == 0,
        is_bottleneck: false,
    }
}
