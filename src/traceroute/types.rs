//! Core types for path probing

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Health classification of a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopStatus {
    /// Responding with low latency, jitter and loss
    Healthy,
    /// Noticeable latency or jitter
    Slow,
    /// High latency, high jitter or some loss
    Warning,
    /// More than half of the probes lost
    Critical,
    /// No probe answered
    Timeout,
}

impl HopStatus {
    /// Whether the status counts as a problem for the path
    pub fn is_problem(self) -> bool {
        matches!(self, HopStatus::Warning | HopStatus::Critical)
    }

    /// Rank of responding statuses, worst highest; timeouts rank lowest
    pub fn severity(self) -> u8 {
        match self {
            HopStatus::Timeout => 0,
            HopStatus::Healthy => 1,
            HopStatus::Slow => 2,
            HopStatus::Warning => 3,
            HopStatus::Critical => 4,
        }
    }
}

impl std::fmt::Display for HopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HopStatus::Healthy => write!(f, "healthy"),
            HopStatus::Slow => write!(f, "slow"),
            HopStatus::Warning => write!(f, "warning"),
            HopStatus::Critical => write!(f, "critical"),
            HopStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Best-effort guess at what kind of device answered at a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    /// Router
    Router,
    /// Switch
    Switch,
    /// Firewall or UTM appliance
    Firewall,
    /// Load balancer or reverse proxy
    LoadBalancer,
    /// Gateway / NAT device
    Gateway,
    /// Server
    Server,
    /// Cloud provider or CDN edge
    Cloud,
    /// Internet service provider equipment
    Isp,
    /// Nothing could be inferred
    Unknown,
}

impl DeviceType {
    /// Label used when synthesizing a device name from an address
    pub fn label(self) -> &'static str {
        match self {
            DeviceType::Router => "Router",
            DeviceType::Switch => "Switch",
            DeviceType::Firewall => "Firewall",
            DeviceType::LoadBalancer => "Load Balancer",
            DeviceType::Gateway => "Gateway",
            DeviceType::Server => "Server",
            DeviceType::Cloud => "Cloud Node",
            DeviceType::Isp => "ISP",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Router => write!(f, "router"),
            DeviceType::Switch => write!(f, "switch"),
            DeviceType::Firewall => write!(f, "firewall"),
            DeviceType::LoadBalancer => write!(f, "load-balancer"),
            DeviceType::Gateway => write!(f, "gateway"),
            DeviceType::Server => write!(f, "server"),
            DeviceType::Cloud => write!(f, "cloud"),
            DeviceType::Isp => write!(f, "isp"),
            DeviceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of device inference for one hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Inferred device type
    pub device_type: DeviceType,
    /// Vendor, when the hostname names one
    pub vendor: Option<String>,
    /// Display name
    pub name: String,
    /// Location, when the hostname carries a city/airport code
    pub location: Option<String>,
}

/// One TTL level of a network path
///
/// Immutable once produced by the hop prober; the engine only sets the
/// bottleneck flag before handing it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// TTL at which this hop was probed (1-based)
    pub index: u8,
    /// First address that answered at this TTL
    pub ip: Option<Ipv4Addr>,
    /// Reverse DNS name of `ip`
    pub hostname: Option<String>,
    /// Inferred device type
    pub device_type: DeviceType,
    /// Inferred vendor
    pub device_vendor: Option<String>,
    /// Inferred display name
    pub device_name: Option<String>,
    /// Inferred location
    pub location: Option<String>,
    /// Round-trip time of every answered probe in milliseconds, in send order
    pub latencies: Vec<f64>,
    /// Mean of `latencies`
    pub avg_latency: f64,
    /// Minimum of `latencies`
    pub min_latency: f64,
    /// Maximum of `latencies`
    pub max_latency: f64,
    /// Population standard deviation of `latencies` (range below two samples)
    pub jitter: f64,
    /// Probes sent at this TTL
    pub packets_sent: u32,
    /// Probes answered at this TTL
    pub packets_received: u32,
    /// Percentage of probes lost
    pub packet_loss_pct: f64,
    /// Health classification
    pub status: HopStatus,
    /// True when no probe was answered
    pub timeout: bool,
    /// True when latency jumps by more than the bottleneck threshold over the previous hop
    pub is_bottleneck: bool,
}

impl Hop {
    /// Check if this hop is the destination
    pub fn is_destination(&self, target: Ipv4Addr) -> bool {
        self.ip == Some(target)
    }

    /// Check if anything answered at this TTL
    pub fn responded(&self) -> bool {
        self.packets_received > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HopStatus::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(HopStatus::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_problem_statuses() {
        assert!(HopStatus::Warning.is_problem());
        assert!(HopStatus::Critical.is_problem());
        assert!(!HopStatus::Slow.is_problem());
        assert!(!HopStatus::Healthy.is_problem());
        assert!(!HopStatus::Timeout.is_problem());
    }

    #[test]
    fn test_severity_order() {
        assert!(HopStatus::Critical.severity() > HopStatus::Warning.severity());
        assert!(HopStatus::Warning.severity() > HopStatus::Slow.severity());
        assert!(HopStatus::Slow.severity() > HopStatus::Healthy.severity());
        assert!(HopStatus::Healthy.severity() > HopStatus::Timeout.severity());
    }

    #[test]
    fn test_device_type_serialization() {
        assert_eq!(
            serde_json::to_string(&DeviceType::LoadBalancer).unwrap(),
            "\"load-balancer\""
        );
        assert_eq!(DeviceType::LoadBalancer.to_string(), "load-balancer");
        assert_eq!(DeviceType::Cloud.label(), "Cloud Node");
    }
}
