//! Registry of monitoring sessions and their probe loops
//!
//! Each running session owns one worker task. The worker waits on a timer
//! tick or its cancellation token; those are the only points where a stop
//! takes effect, so a cycle that has started always runs to completion.
//! Cycles run in their own task so a panic is recorded on the session
//! instead of ending the loop.

use super::types::{Session, SessionStatus};
use super::SessionError;
use crate::config::{ManagerConfig, ProbeConfig};
use crate::services::Services;
use crate::traceroute::{PathResult, PathTracer, TracerouteError};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

struct Entry {
    session: Session,
    cancel: CancellationToken,
    /// Loop allowed to record into this entry; unique across the manager
    generation: u64,
}

struct Inner {
    tracer: PathTracer,
    config: ManagerConfig,
    sessions: RwLock<HashMap<String, Entry>>,
    shutdown: CancellationToken,
    workers: TaskTracker,
    generations: AtomicU64,
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }
}

/// Owns every monitoring session, keyed by target
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use netpath::{ManagerConfig, PathSessionManager, ProbeConfig, Services};
///
/// let manager = PathSessionManager::new(Services::new(), ManagerConfig::default());
///
/// let session = manager.start("example.com", ProbeConfig::default()).await?;
/// println!("started {}", session.id);
///
/// // Later: read the latest snapshot
/// let session = manager.get("example.com").await?;
/// println!("{} cycles recorded", session.probe_count);
///
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct PathSessionManager {
    inner: Arc<Inner>,
}

impl PathSessionManager {
    /// Create a manager using `services` for every session
    pub fn new(services: Services, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                tracer: PathTracer::new(services),
                config,
                sessions: RwLock::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                workers: TaskTracker::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Manager configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Start monitoring `target`
    ///
    /// Returns the existing session unchanged if one is already running for
    /// `target`. A stopped session is resumed in place: same id, history
    /// kept. The first cycle starts immediately, then one per interval.
    pub async fn start(&self, target: &str, config: ProbeConfig) -> Result<Session, SessionError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SessionError::ShutDown);
        }

        {
            let sessions = self.inner.sessions.read().await;
            match sessions.get(target) {
                Some(entry) if entry.session.is_running() => return Ok(entry.session.clone()),
                Some(_) => {}
                None => self.check_capacity(sessions.len())?,
            }
        }

        // Resolve without holding the lock
        let target_ip = self
            .inner
            .tracer
            .services()
            .resolver
            .resolve_ipv4(target)
            .await
            .map_err(TracerouteError::from)?;

        let interval = self.inner.config.probe_interval;
        let mut sessions = self.inner.sessions.write().await;

        let (session, cancel, generation) = match sessions.get_mut(target) {
            Some(entry) if entry.session.is_running() => return Ok(entry.session.clone()),
            Some(entry) => {
                entry.session.resume(target_ip, config, interval.as_secs());
                entry.cancel = self.inner.shutdown.child_token();
                entry.generation = self.inner.next_generation();
                info!(target, session_id = %entry.session.id, %target_ip, "Session resumed");
                (entry.session.clone(), entry.cancel.clone(), entry.generation)
            }
            None => {
                self.check_capacity(sessions.len())?;
                let session = Session::new(target, target_ip, config, interval.as_secs());
                let cancel = self.inner.shutdown.child_token();
                let generation = self.inner.next_generation();
                info!(target, session_id = %session.id, %target_ip, "Session started");
                sessions.insert(
                    target.to_string(),
                    Entry {
                        session: session.clone(),
                        cancel: cancel.clone(),
                        generation,
                    },
                );
                (session, cancel, generation)
            }
        };
        drop(sessions);

        self.inner.workers.spawn(run_session(
            self.inner.clone(),
            target.to_string(),
            target_ip,
            session.config,
            interval,
            generation,
            cancel,
        ));

        Ok(session)
    }

    /// Stop the probe loop of `target`, keeping its history
    pub async fn stop(&self, target: &str) -> Result<(), SessionError> {
        let mut sessions = self.inner.sessions.write().await;
        let entry = sessions
            .get_mut(target)
            .ok_or_else(|| SessionError::NotFound(target.to_string()))?;
        entry.cancel.cancel();
        entry.session.status = SessionStatus::Stopped;
        info!(target, session_id = %entry.session.id, "Session stopped");
        Ok(())
    }

    /// Stop and forget the session of `target`
    pub async fn delete(&self, target: &str) -> Result<(), SessionError> {
        let entry = self
            .inner
            .sessions
            .write()
            .await
            .remove(target)
            .ok_or_else(|| SessionError::NotFound(target.to_string()))?;
        entry.cancel.cancel();
        info!(target, session_id = %entry.session.id, "Session deleted");
        Ok(())
    }

    /// Snapshot of the session of `target`
    pub async fn get(&self, target: &str) -> Result<Session, SessionError> {
        self.inner
            .sessions
            .read()
            .await
            .get(target)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SessionError::NotFound(target.to_string()))
    }

    /// Snapshots of every session, oldest first
    pub async fn list_all(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self
            .inner
            .sessions
            .read()
            .await
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        all.sort_by(|a, b| {
            a.started_at_ms
                .cmp(&b.started_at_ms)
                .then_with(|| a.target.cmp(&b.target))
        });
        all
    }

    /// Run a single cycle towards `target`, unrelated to any session
    pub async fn probe_once(
        &self,
        target: &str,
        config: ProbeConfig,
    ) -> Result<PathResult, SessionError> {
        let tracer = self.inner.tracer.clone();
        let target = target.to_string();
        match tokio::spawn(async move { tracer.probe_once(&target, &config).await }).await {
            Ok(outcome) => Ok(outcome?),
            Err(e) => Err(SessionError::CycleAborted(e.to_string())),
        }
    }

    /// Cancel every session and wait for all probe loops to exit
    ///
    /// Cycles already in flight are allowed to finish. Sessions remain
    /// readable afterwards, all marked stopped.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.workers.close();
        self.inner.workers.wait().await;

        let mut sessions = self.inner.sessions.write().await;
        for entry in sessions.values_mut() {
            entry.session.status = SessionStatus::Stopped;
        }
        info!(sessions = sessions.len(), "Session manager shut down");
    }

    fn check_capacity(&self, tracked: usize) -> Result<(), SessionError> {
        let limit = self.inner.config.max_sessions;
        if tracked >= limit {
            warn!(limit, "Session limit reached");
            return Err(SessionError::CapacityExceeded { limit });
        }
        Ok(())
    }
}

impl Default for PathSessionManager {
    fn default() -> Self {
        Self::new(Services::new(), ManagerConfig::default())
    }
}

impl Drop for PathSessionManager {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl std::fmt::Debug for PathSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSessionManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Probe loop of one session generation
async fn run_session(
    inner: Arc<Inner>,
    target: String,
    target_ip: Ipv4Addr,
    config: ProbeConfig,
    interval: Duration,
    generation: u64,
    cancel: CancellationToken,
) {
    // The first tick completes immediately
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let tracer = inner.tracer.clone();
        let outcome =
            tokio::spawn(async move { run_cycle(&tracer, target_ip, &config).await }).await;
        record_outcome(&inner, &target, generation, outcome).await;
    }

    debug!(target, generation, "Probe loop exited");
}

async fn run_cycle(
    tracer: &PathTracer,
    target_ip: Ipv4Addr,
    config: &ProbeConfig,
) -> Result<PathResult, TracerouteError> {
    let mut transport = tracer.services().transports.open()?;
    Ok(tracer.trace(transport.as_mut(), target_ip, config, None).await)
}

async fn record_outcome(
    inner: &Inner,
    target: &str,
    generation: u64,
    outcome: Result<Result<PathResult, TracerouteError>, JoinError>,
) {
    let mut sessions = inner.sessions.write().await;
    let Some(entry) = sessions.get_mut(target) else {
        debug!(target, "Dropping result of deleted session");
        return;
    };
    if entry.generation != generation {
        debug!(target, generation, "Dropping result of a superseded probe loop");
        return;
    }

    match outcome {
        Ok(Ok(result)) => entry.session.record(result),
        Ok(Err(e)) => {
            warn!(target, session_id = %entry.session.id, error = %e, "Probe cycle failed");
            entry.session.record_failure(e.to_string());
        }
        Err(e) => {
            warn!(target, session_id = %entry.session.id, error = %e, "Probe cycle panicked");
            entry.session.record_failure(format!("probe cycle aborted: {e}"));
        }
    }
}
