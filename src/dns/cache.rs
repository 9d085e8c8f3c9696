//! Reverse DNS lookup caching
//!
//! Monitoring sessions re-probe the same routers every interval, so PTR
//! answers (including "no PTR record") are cached per address.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Cache entry with timestamp
#[derive(Debug, Clone)]
struct CacheEntry {
    hostname: Option<String>,
    inserted_at: Instant,
}

/// Thread-safe cache for reverse DNS lookups
#[derive(Debug, Clone)]
pub struct RdnsCache {
    cache: Arc<Mutex<HashMap<Ipv4Addr, CacheEntry>>>,
    ttl: Duration,
}

impl RdnsCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Create a new cache with the default TTL (1 hour)
    pub fn with_default_ttl() -> Self {
        Self::new(crate::config::defaults::RDNS_CACHE_TTL)
    }

    /// Look up an address in the cache
    ///
    /// The outer `Option` tells whether the address is cached at all; the
    /// inner one is the cached answer, `None` meaning no PTR record.
    pub fn get(&self, ip: &Ipv4Addr) -> Option<Option<String>> {
        let mut cache = self.cache.lock().expect("mutex poisoned");

        if let Some(entry) = cache.get(ip) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.hostname.clone());
            }
            cache.remove(ip);
        }
        None
    }

    /// Record the answer for an address
    ///
    /// Expired entries of other addresses are dropped at the same time, so
    /// routers that disappear from the path do not linger.
    pub fn insert(&self, ip: Ipv4Addr, hostname: Option<String>) {
        let mut cache = self.cache.lock().expect("mutex poisoned");
        let ttl = self.ttl;
        cache.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        cache.insert(
            ip,
            CacheEntry {
                hostname,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.lock().expect("mutex poisoned").len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().expect("mutex poisoned").is_empty()
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.cache.lock().expect("mutex poisoned").clear();
    }

}

impl Default for RdnsCache {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}
