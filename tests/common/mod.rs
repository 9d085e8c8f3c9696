//! Scripted collaborators for integration tests

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use netpath::dns::{DnsError, Resolver};
use netpath::{IcmpTransport, ProbeReply, ReplyKind, Services, TransportError, TransportFactory};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Reply script per TTL: one entry per probe index, `None` meaning lost
#[derive(Debug, Clone, Default)]
pub struct Path {
    hops: HashMap<u8, Vec<Option<(Ipv4Addr, f64)>>>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every probe at `ttl` answered by `ip` after `ms`
    pub fn hop(mut self, ttl: u8, ip: Ipv4Addr, ms: &[f64]) -> Self {
        self.hops
            .insert(ttl, ms.iter().map(|&m| Some((ip, m))).collect());
        self
    }

    /// Explicit per-probe script for `ttl`
    pub fn probes(mut self, ttl: u8, script: Vec<Option<(Ipv4Addr, f64)>>) -> Self {
        self.hops.insert(ttl, script);
        self
    }

    fn reply(&self, ttl: u8, probe_index: usize) -> Option<(Ipv4Addr, f64)> {
        self.hops
            .get(&ttl)
            .and_then(|script| script.get(probe_index).copied().flatten())
    }
}

/// What a transport does when asked to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer from the script immediately
    Scripted,
    /// Never answer; wait out each probe's deadline
    Silent,
    /// Panic on the first send
    Panic,
}

pub struct ScriptedTransport {
    path: Arc<Path>,
    behavior: Behavior,
}

#[async_trait]
impl IcmpTransport for ScriptedTransport {
    async fn send(
        &mut self,
        target: Ipv4Addr,
        ttl: u8,
        sequence: u16,
        deadline: Instant,
    ) -> Result<ProbeReply, TransportError> {
        match self.behavior {
            Behavior::Panic => panic!("transport exploded"),
            Behavior::Silent => {
                tokio::time::sleep_until(deadline).await;
                Err(TransportError::Timeout)
            }
            Behavior::Scripted => {
                let probe_index = usize::from(sequence % 100);
                match self.path.reply(ttl, probe_index) {
                    Some((ip, ms)) => Ok(ProbeReply {
                        responder: ip,
                        rtt: Duration::from_secs_f64(ms / 1000.0),
                        kind: if ip == target {
                            ReplyKind::EchoReply
                        } else {
                            ReplyKind::TimeExceeded
                        },
                    }),
                    None => Err(TransportError::Timeout),
                }
            }
        }
    }
}

/// Factory handing out scripted transports, counting how many were opened
pub struct ScriptedFactory {
    path: Arc<Path>,
    behavior: Behavior,
    deny: bool,
    opened: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new(path: Path) -> Self {
        Self {
            path: Arc::new(path),
            behavior: Behavior::Scripted,
            deny: false,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Refuse to open sockets, as an unprivileged process would see
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(Path::new())
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl TransportFactory for ScriptedFactory {
    fn open(&self) -> Result<Box<dyn IcmpTransport>, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(TransportError::PermissionDenied(
                "Operation not permitted".to_string(),
            ));
        }
        Ok(Box::new(ScriptedTransport {
            path: self.path.clone(),
            behavior: self.behavior,
        }))
    }
}

/// Resolver backed by fixed tables
#[derive(Debug, Default)]
pub struct StaticResolver {
    names: HashMap<String, Ipv4Addr>,
    ptr: HashMap<Ipv4Addr, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, name: &str, ip: Ipv4Addr) -> Self {
        self.names.insert(name.to_string(), ip);
        self
    }

    pub fn ptr(mut self, ip: Ipv4Addr, name: &str) -> Self {
        self.ptr.insert(ip, name.to_string());
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve_ipv4(&self, target: &str) -> Result<Ipv4Addr, DnsError> {
        if let Ok(ip) = target.parse::<Ipv4Addr>() {
            return Ok(ip);
        }
        self.names
            .get(target)
            .copied()
            .ok_or_else(|| DnsError::NoIpv4Address(target.to_string()))
    }

    async fn reverse(&self, ip: Ipv4Addr) -> Option<String> {
        self.ptr.get(&ip).cloned()
    }
}

pub fn services(resolver: StaticResolver, factory: Arc<ScriptedFactory>) -> Services {
    Services::with_components(Arc::new(resolver), factory)
}

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}
