//! Result of one NetPath probing cycle

use crate::traceroute::types::Hop;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Result of one probing cycle towards a target
///
/// Immutable once produced. `completed` is true only when some hop answered
/// from the target address itself; running out of TTLs is a valid outcome,
/// not an error.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use netpath::traceroute::PathTracer;
/// use netpath::{ProbeConfig, Services};
///
/// let tracer = PathTracer::new(Services::new());
/// let result = tracer.probe_once("example.com", &ProbeConfig::default()).await?;
///
/// println!("Reached destination: {}", result.completed);
/// for hop in result.responding_hops() {
///     println!("{:>2} {:?} {:.1} ms {}", hop.index, hop.ip, hop.avg_latency, hop.status);
/// }
/// if let Some(worst) = result.worst_hop() {
///     println!("Worst hop: {}", worst.index);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    /// When the cycle started, in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Wall-clock duration of the TTL loop
    pub duration_ms: f64,
    /// Resolved target address
    pub target_ip: Ipv4Addr,
    /// Highest TTL probed
    pub total_hops: u8,
    /// True when the target itself answered
    pub completed: bool,
    /// Hops in increasing TTL order
    pub hops: Vec<Hop>,
    /// Lost probes over sent probes across all hops, in percent
    pub overall_packet_loss_pct: f64,
    /// Average latency of the destination hop, 0 when not reached
    pub total_latency_ms: f64,
    /// True when any hop is a warning, critical or a bottleneck
    pub has_problems: bool,
    /// TTLs of problem hops, without duplicates, in TTL order
    pub problem_hops: Vec<u8>,
    /// True when an external time limit cut the cycle short
    #[serde(default)]
    pub interrupted: bool,
}

impl PathResult {
    /// Empty result for a cycle starting now
    pub(crate) fn new(target_ip: Ipv4Addr, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            duration_ms: 0.0,
            target_ip,
            total_hops: 0,
            completed: false,
            hops: Vec::new(),
            overall_packet_loss_pct: 0.0,
            total_latency_ms: 0.0,
            has_problems: false,
            problem_hops: Vec::new(),
            interrupted: false,
        }
    }

    /// Number of hops probed
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// The hop that answered from the target address, if reached
    pub fn destination_hop(&self) -> Option<&Hop> {
        self.hops.iter().find(|h| h.is_destination(self.target_ip))
    }

    /// Hops where at least one probe was answered
    pub fn responding_hops(&self) -> impl Iterator<Item = &Hop> {
        self.hops.iter().filter(|h| h.responded())
    }

    /// Hops flagged as bottlenecks
    pub fn bottlenecks(&self) -> impl Iterator<Item = &Hop> {
        self.hops.iter().filter(|h| h.is_bottleneck)
    }

    /// Responding hop in the worst health, earliest on ties
    pub fn worst_hop(&self) -> Option<&Hop> {
        self.responding_hops()
            .fold(None, |worst: Option<&Hop>, hop| match worst {
                Some(w) if w.status.severity() >= hop.status.severity() => Some(w),
                _ => Some(hop),
            })
    }

    /// Record a problem hop once
    pub(crate) fn flag_problem(&mut self, ttl: u8) {
        self.has_problems = true;
        if !self.problem_hops.contains(&ttl) {
            self.problem_hops.push(ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traceroute::{DeviceType, HopStatus};

    fn hop(index: u8, ip: Option<Ipv4Addr>, status: HopStatus, bottleneck: bool) -> Hop {
        let received = if status == HopStatus::Timeout { 0 } else { 3 };
        Hop {
            index,
            ip,
            hostname: None,
            device_type: DeviceType::Router,
            device_vendor: None,
            device_name: None,
            location: None,
            latencies: vec![],
            avg_latency: 0.0,
            min_latency: 0.0,
            max_latency: 0.0,
            jitter: 0.0,
            packets_sent: 3,
            packets_received: received,
            packet_loss_pct: 0.0,
            status,
            timeout: received == 0,
            is_bottleneck: bottleneck,
        }
    }

    fn sample() -> PathResult {
        let target = Ipv4Addr::new(203, 0, 113, 50);
        let mut result = PathResult::new(target, 0);
        result.hops = vec![
            hop(1, Some(Ipv4Addr::new(192, 168, 1, 1)), HopStatus::Healthy, false),
            hop(2, None, HopStatus::Timeout, false),
            hop(3, Some(Ipv4Addr::new(198, 51, 100, 1)), HopStatus::Warning, true),
            hop(4, Some(Ipv4Addr::new(198, 51, 100, 9)), HopStatus::Warning, false),
            hop(5, Some(target), HopStatus::Slow, false),
        ];
        result
    }

    #[test]
    fn test_helpers() {
        let result = sample();
        assert_eq!(result.hop_count(), 5);
        assert_eq!(result.destination_hop().map(|h| h.index), Some(5));
        assert_eq!(result.responding_hops().count(), 4);
        assert_eq!(
            result.bottlenecks().map(|h| h.index).collect::<Vec<_>>(),
            vec![3]
        );
        assert_eq!(result.worst_hop().map(|h| h.index), Some(3));
    }

    #[test]
    fn test_flag_problem_deduplicates() {
        let mut result = sample();
        result.flag_problem(3);
        result.flag_problem(3);
        result.flag_problem(4);
        assert!(result.has_problems);
        assert_eq!(result.problem_hops, vec![3, 4]);
    }

    #[test]
    fn test_no_destination_when_unreached() {
        let mut result = sample();
        result.hops.pop();
        assert!(result.destination_hop().is_none());
    }

    #[test]
    fn test_serializes_with_snake_case_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["target_ip"], "203.0.113.50");
        assert_eq!(json["hops"][1]["status"], "timeout");
        assert_eq!(json["interrupted"], false);
    }
}
