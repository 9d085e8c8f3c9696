//! Best-effort device inference from reverse DNS names
//!
//! Router hostnames tend to encode role, vendor and site
//! (`cr1.lhr2.example.net`, `ae-3.fw.fortinet.nyc.isp.com`). The tables
//! below are scanned in order and the first hit wins; reordering them changes
//! the classification of ambiguous names.

use super::types::{DeviceInfo, DeviceType};
use std::net::Ipv4Addr;

/// Hostname substrings identifying a vendor, in match order
const VENDOR_PATTERNS: &[(&str, &str)] = &[
    ("cisco", "Cisco"),
    ("csco", "Cisco"),
    ("juniper", "Juniper"),
    ("jnpr", "Juniper"),
    ("huawei", "Huawei"),
    ("arista", "Arista"),
    ("mikrotik", "MikroTik"),
    ("ubnt", "Ubiquiti"),
    ("ubiquiti", "Ubiquiti"),
    ("fortinet", "Fortinet"),
    ("fortigate", "Fortinet"),
    ("paloalto", "Palo Alto"),
    ("checkpoint", "Check Point"),
    ("sonicwall", "SonicWall"),
    ("watchguard", "WatchGuard"),
    ("netgear", "Netgear"),
    ("hp", "HP"),
    ("hpe", "HPE"),
    ("dell", "Dell"),
    ("brocade", "Brocade"),
    ("extreme", "Extreme Networks"),
    ("f5", "F5"),
    ("a10", "A10 Networks"),
    ("citrix", "Citrix"),
    ("vmware", "VMware"),
];

/// Keyword groups identifying a device role, in match order
const TYPE_PATTERNS: &[(DeviceType, &[&str])] = &[
    (
        DeviceType::Router,
        &[
            "rtr", "router", "cr", "br", "ar", "er", "pe", "ce", "edge", "core", "backbone",
        ],
    ),
    (
        DeviceType::Switch,
        &[
            "sw", "switch", "csw", "asw", "dsw", "tor", "leaf", "spine", "access",
        ],
    ),
    (
        DeviceType::Firewall,
        &[
            "fw",
            "firewall",
            "asa",
            "pix",
            "fortigate",
            "paloalto",
            "checkpoint",
            "utm",
        ],
    ),
    (
        DeviceType::LoadBalancer,
        &[
            "lb",
            "loadbalancer",
            "f5",
            "netscaler",
            "a10",
            "haproxy",
            "nginx",
        ],
    ),
    (
        DeviceType::Gateway,
        &["gw", "gateway", "nat", "cgn", "cgnat"],
    ),
    (
        DeviceType::Server,
        &[
            "srv", "server", "web", "app", "db", "api", "www", "mail", "dns", "ntp",
        ],
    ),
    (
        DeviceType::Cloud,
        &[
            "aws",
            "azure",
            "gcp",
            "google",
            "amazon",
            "microsoft",
            "cloudflare",
            "akamai",
            "fastly",
            "cloudfront",
        ],
    ),
    (
        DeviceType::Isp,
        &[
            "isp", "dsl", "cable", "fiber", "fios", "comcast", "spectrum", "att", "verizon",
            "cox", "xfinity",
        ],
    ),
];

/// City and airport codes, in match order
const LOCATION_PATTERNS: &[(&str, &str)] = &[
    ("nyc", "New York, US"),
    ("lax", "Los Angeles, US"),
    ("sfo", "San Francisco, US"),
    ("sjc", "San Jose, US"),
    ("sea", "Seattle, US"),
    ("dal", "Dallas, US"),
    ("dfw", "Dallas, US"),
    ("chi", "Chicago, US"),
    ("ord", "Chicago, US"),
    ("atl", "Atlanta, US"),
    ("mia", "Miami, US"),
    ("bos", "Boston, US"),
    ("iad", "Washington DC, US"),
    ("dca", "Washington DC, US"),
    ("phx", "Phoenix, US"),
    ("den", "Denver, US"),
    ("lon", "London, UK"),
    ("lhr", "London, UK"),
    ("ams", "Amsterdam, NL"),
    ("fra", "Frankfurt, DE"),
    ("par", "Paris, FR"),
    ("cdg", "Paris, FR"),
    ("mad", "Madrid, ES"),
    ("mil", "Milan, IT"),
    ("ber", "Berlin, DE"),
    ("zrh", "Zurich, CH"),
    ("sin", "Singapore, SG"),
    ("hkg", "Hong Kong, HK"),
    ("tyo", "Tokyo, JP"),
    ("nrt", "Tokyo, JP"),
    ("syd", "Sydney, AU"),
    ("mel", "Melbourne, AU"),
    ("bom", "Mumbai, IN"),
    ("del", "Delhi, IN"),
    ("icn", "Seoul, KR"),
    ("gru", "Sao Paulo, BR"),
    ("eze", "Buenos Aires, AR"),
];

/// Infer device type, vendor, location and display name for a hop
///
/// Never fails: missing information yields generic labels.
///
/// # Examples
///
/// ```
/// use netpath::traceroute::{infer_device, DeviceType};
/// use std::net::Ipv4Addr;
///
/// let info = infer_device(Some("rtr1.lhr.example.net"), Some(Ipv4Addr::new(192, 0, 2, 1)), 4);
/// assert_eq!(info.device_type, DeviceType::Router);
/// assert_eq!(info.location.as_deref(), Some("London, UK"));
/// assert_eq!(info.name, "Rtr1");
/// ```
pub fn infer_device(hostname: Option<&str>, ip: Option<Ipv4Addr>, ttl: u8) -> DeviceInfo {
    if ttl == 1 {
        return DeviceInfo {
            device_type: DeviceType::Gateway,
            vendor: None,
            name: "Local Gateway".to_string(),
            location: None,
        };
    }

    let hostname = hostname.map(str::trim).filter(|h| !h.is_empty());
    if hostname.is_none() && ip.is_none() {
        return DeviceInfo {
            device_type: DeviceType::Unknown,
            vendor: None,
            name: "* * *".to_string(),
            location: None,
        };
    }

    let lower = hostname.map(str::to_ascii_lowercase).unwrap_or_default();

    let vendor = first_match(&lower, VENDOR_PATTERNS).map(str::to_string);
    let location = first_match(&lower, LOCATION_PATTERNS).map(str::to_string);
    let mut device_type = TYPE_PATTERNS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(t, _)| *t)
        .unwrap_or(DeviceType::Unknown);

    let mut name = hostname.map(short_name).unwrap_or_default();

    if device_type == DeviceType::Unknown {
        let (fallback_type, fallback_name) = ttl_band(ttl);
        device_type = fallback_type;
        name = fallback_name;
    }

    if name.is_empty() {
        let addr = ip.map(|ip| ip.to_string()).unwrap_or_default();
        name = format!("{} {}", device_type.label(), addr).trim().to_string();
    }

    DeviceInfo {
        device_type,
        vendor,
        name,
        location,
    }
}

fn first_match<'a>(haystack: &str, table: &[(&str, &'a str)]) -> Option<&'a str> {
    table
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, value)| *value)
}

/// Guess for hops whose hostname says nothing about their role
fn ttl_band(ttl: u8) -> (DeviceType, String) {
    match ttl {
        0..=3 => (DeviceType::Router, format!("Router (Hop {ttl})")),
        4..=6 => (DeviceType::Isp, format!("ISP Router (Hop {ttl})")),
        _ => (DeviceType::Router, format!("Internet Router (Hop {ttl})")),
    }
}

/// First DNS label with its first character upper-cased
fn short_name(hostname: &str) -> String {
    let label = hostname
        .trim_end_matches('.')
        .split('.')
        .next()
        .unwrap_or_default();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
