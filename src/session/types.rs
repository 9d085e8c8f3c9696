//! Monitoring session records

use super::history::BoundedHistory;
use crate::config::ProbeConfig;
use crate::traceroute::{unix_millis, PathResult};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Disambiguates sessions created for the same target within one second
static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Probe loop active
    Running,
    /// Probe loop stopped; history retained
    Stopped,
}

/// A continuously re-probed target
///
/// Values handed out by the session manager are snapshots: later cycles do
/// not change them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Generated identifier, `probe_<target>_<unix seconds>_<sequence>`
    pub id: String,
    /// Target as given by the caller
    pub target: String,
    /// Address resolved when the session was started
    pub target_ip: Ipv4Addr,
    /// Lifecycle state
    pub status: SessionStatus,
    /// Effective (normalized) probe configuration
    pub config: ProbeConfig,
    /// Seconds between cycles
    pub interval_seconds: u64,
    /// Creation time in milliseconds since the Unix epoch
    pub started_at_ms: u64,
    /// Completion time of the latest recorded cycle
    pub last_probe_at_ms: Option<u64>,
    /// Number of recorded cycles
    pub probe_count: u64,
    /// Number of cycles that failed before producing a result
    pub failed_cycles: u64,
    /// Latest recorded cycle
    pub current_result: Option<PathResult>,
    /// Recent cycles, oldest first
    pub history: BoundedHistory<PathResult>,
    /// Message of the latest failed cycle, cleared by the next success
    pub last_error: Option<String>,
}

impl Session {
    pub(crate) fn new(
        target: &str,
        target_ip: Ipv4Addr,
        config: ProbeConfig,
        interval_seconds: u64,
    ) -> Self {
        let config = config.normalized();
        let started_at_ms = unix_millis();
        Self {
            id: format!(
                "probe_{}_{}_{}",
                target,
                started_at_ms / 1000,
                SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
            ),
            target: target.to_string(),
            target_ip,
            status: SessionStatus::Running,
            history: BoundedHistory::new(config.history_limit()),
            config,
            interval_seconds,
            started_at_ms,
            last_probe_at_ms: None,
            probe_count: 0,
            failed_cycles: 0,
            current_result: None,
            last_error: None,
        }
    }

    /// True while the probe loop is active
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Cycles attempted so far, successful or not
    pub fn cycles_run(&self) -> u64 {
        self.probe_count + self.failed_cycles
    }

    pub(crate) fn record(&mut self, result: PathResult) {
        self.history.push(result);
        self.current_result = self.history.latest().cloned();
        self.probe_count += 1;
        self.last_probe_at_ms = Some(unix_millis());
        self.last_error = None;
    }

    pub(crate) fn record_failure(&mut self, message: String) {
        self.failed_cycles += 1;
        self.last_error = Some(message);
    }

    /// Re-arm a stopped session with a new configuration, keeping its history
    pub(crate) fn resume(
        &mut self,
        target_ip: Ipv4Addr,
        config: ProbeConfig,
        interval_seconds: u64,
    ) {
        self.config = config.normalized();
        self.history.set_capacity(self.config.history_limit());
        self.target_ip = target_ip;
        self.interval_seconds = interval_seconds;
        self.status = SessionStatus::Running;
    }
}
