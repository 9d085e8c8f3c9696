//! DNS functionality: target resolution and reverse lookups

pub mod cache;
pub mod reverse;
pub mod service;

pub use cache::RdnsCache;
pub use reverse::{
    create_default_resolver, create_system_resolver, resolve_ipv4, reverse_dns_lookup, DnsError,
};
pub use service::{HickoryResolver, Resolver};
