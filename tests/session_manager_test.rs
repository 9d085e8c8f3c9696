//! Session lifecycle, capacity and history retention
//!
//! These run on a paused clock so minute-long probe intervals elapse
//! instantly.

#![allow(clippy::unwrap_used)]

mod common;

use common::{ip, services, Behavior, Path, ScriptedFactory, StaticResolver};
use netpath::{
    ManagerConfig, PathSessionManager, ProbeConfig, SessionError, SessionStatus, TracerouteError,
};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(60);

fn reachable_path() -> Path {
    Path::new()
        .hop(1, ip(192, 168, 1, 1), &[1.0, 1.0, 1.0])
        .hop(2, ip(203, 0, 113, 1), &[10.0, 11.0, 12.0])
        .hop(3, ip(203, 0, 113, 2), &[10.0, 11.0, 12.0])
}

fn manager_with(factory: Arc<ScriptedFactory>, max_sessions: usize) -> PathSessionManager {
    let resolver = StaticResolver::new()
        .host("a.example", ip(203, 0, 113, 2))
        .host("b.example", ip(203, 0, 113, 2))
        .host("c.example", ip(203, 0, 113, 2));
    PathSessionManager::new(
        services(resolver, factory),
        ManagerConfig::default()
            .with_max_sessions(max_sessions)
            .with_probe_interval(INTERVAL),
    )
}

/// Let `n` intervals pass, plus a little slack for the cycle itself
async fn intervals(n: u32) {
    tokio::time::sleep(INTERVAL * n + Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_runs_first_cycle_immediately() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory.clone(), 10);

    let session = manager.start("a.example", ProbeConfig::default()).await.unwrap();
    assert_eq!(session.status, SessionStatus::Running);
    assert!(session.id.starts_with("probe_a.example_"));
    assert_eq!(session.target_ip, ip(203, 0, 113, 2));
    assert_eq!(session.interval_seconds, 60);

    intervals(0).await;
    let session = manager.get("a.example").await.unwrap();
    assert_eq!(session.probe_count, 1);
    assert!(session.current_result.as_ref().unwrap().completed);
    assert!(session.last_probe_at_ms.is_some());
    assert_eq!(factory.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory.clone(), 10);

    let first = manager.start("a.example", ProbeConfig::default()).await.unwrap();
    let second = manager.start("a.example", ProbeConfig::default()).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(manager.list_all().await.len(), 1);

    intervals(2).await;
    // One loop: the immediate cycle plus one per interval
    assert_eq!(factory.opened(), 3);
    assert_eq!(manager.get("a.example").await.unwrap().probe_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unset_config_is_normalized() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory, 10);

    let session = manager.start("a.example", ProbeConfig::unset()).await.unwrap();
    assert_eq!(session.config.max_hops, 30);
    assert_eq!(session.config.timeout_ms, 3000);
    assert_eq!(session.config.probes_per_hop, 3);
    assert_eq!(session.config.history_size, 60);
}

#[tokio::test(start_paused = true)]
async fn test_history_is_a_sliding_window() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory, 10);
    let config = ProbeConfig::builder().history_size(3).build();

    manager.start("a.example", config).await.unwrap();
    for expected in 1..=6u64 {
        let session = manager.get("a.example").await.unwrap();
        assert!(session.history.len() <= 3);
        intervals(if expected == 1 { 0 } else { 1 }).await;
    }

    let session = manager.get("a.example").await.unwrap();
    assert!(session.probe_count >= 6);
    assert_eq!(session.history.len(), 3);
    assert_eq!(session.history.latest(), session.current_result.as_ref());
}

#[tokio::test(start_paused = true)]
async fn test_capacity_is_enforced_without_side_effects() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory, 2);

    manager.start("a.example", ProbeConfig::default()).await.unwrap();
    manager.start("b.example", ProbeConfig::default()).await.unwrap();

    let err = manager
        .start("c.example", ProbeConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CapacityExceeded { limit: 2 }));

    let targets: Vec<String> = manager
        .list_all()
        .await
        .into_iter()
        .map(|s| s.target)
        .collect();
    assert_eq!(targets.len(), 2);
    assert!(!targets.contains(&"c.example".to_string()));

    // Already tracked targets are still accepted at capacity
    assert!(manager.start("a.example", ProbeConfig::default()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_targets_are_not_found() {
    let manager = manager_with(Arc::new(ScriptedFactory::new(Path::new())), 10);

    assert!(matches!(
        manager.stop("missing.example").await,
        Err(SessionError::NotFound(ref t)) if t == "missing.example"
    ));
    assert!(matches!(
        manager.delete("missing.example").await,
        Err(SessionError::NotFound(_))
    ));
    assert!(matches!(
        manager.get("missing.example").await,
        Err(SessionError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_target_creates_nothing() {
    let manager = manager_with(Arc::new(ScriptedFactory::new(Path::new())), 10);

    let err = manager
        .start("nowhere.invalid", ProbeConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Trace(TracerouteError::ResolutionError(_))
    ));
    assert!(manager.list_all().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_keeps_history_and_halts_probing() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory.clone(), 10);

    let started = manager.start("a.example", ProbeConfig::default()).await.unwrap();
    intervals(1).await;
    manager.stop("a.example").await.unwrap();

    let stopped = manager.get("a.example").await.unwrap();
    assert_eq!(stopped.status, SessionStatus::Stopped);
    assert_eq!(stopped.probe_count, 2);
    assert_eq!(stopped.history.len(), 2);

    intervals(3).await;
    assert_eq!(manager.get("a.example").await.unwrap().probe_count, 2);
    assert_eq!(factory.opened(), 2);

    // Starting again resumes the same session
    let resumed = manager.start("a.example", ProbeConfig::default()).await.unwrap();
    assert_eq!(resumed.id, started.id);
    assert_eq!(resumed.status, SessionStatus::Running);
    intervals(0).await;
    let resumed = manager.get("a.example").await.unwrap();
    assert_eq!(resumed.probe_count, 3);
    assert_eq!(resumed.history.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_discards_session() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory.clone(), 1);

    manager.start("a.example", ProbeConfig::default()).await.unwrap();
    intervals(1).await;
    manager.delete("a.example").await.unwrap();

    assert!(matches!(
        manager.get("a.example").await,
        Err(SessionError::NotFound(_))
    ));
    let opened = factory.opened();
    intervals(2).await;
    assert_eq!(factory.opened(), opened);

    // The freed slot can be reused, starting from scratch
    let fresh = manager.start("b.example", ProbeConfig::default()).await.unwrap();
    assert_eq!(fresh.probe_count, 0);
    assert!(fresh.history.is_empty());
}

/// Two silent hops of one probe each: every cycle takes two seconds
fn slow_cycle_manager() -> (Arc<ScriptedFactory>, PathSessionManager, ProbeConfig) {
    let factory = Arc::new(ScriptedFactory::new(Path::new()).with_behavior(Behavior::Silent));
    let manager = manager_with(factory.clone(), 10);
    let config = ProbeConfig::builder()
        .max_hops(2)
        .probes_per_hop(1)
        .timeout_ms(1000)
        .build();
    (factory, manager, config)
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_deleted_session_cycle_does_not_leak_into_replacement() {
    let (_factory, manager, config) = slow_cycle_manager();

    let old = manager.start("a.example", config).await.unwrap();
    sleep_ms(500).await;
    manager.delete("a.example").await.unwrap();
    sleep_ms(100).await;

    let fresh = manager.start("a.example", config).await.unwrap();
    assert_ne!(fresh.id, old.id);

    // The deleted loop's cycle ends at 2.0s, the new one cannot before 2.6s
    sleep_ms(1500).await;
    let session = manager.get("a.example").await.unwrap();
    assert_eq!(session.probe_count, 0);
    assert!(session.history.is_empty());

    sleep_ms(600).await;
    let session = manager.get("a.example").await.unwrap();
    assert_eq!(session.probe_count, 1);
    assert_eq!(session.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_in_flight_at_stop_is_still_recorded() {
    let (factory, manager, config) = slow_cycle_manager();

    manager.start("a.example", config).await.unwrap();
    sleep_ms(500).await;
    manager.stop("a.example").await.unwrap();

    sleep_ms(1600).await;
    let session = manager.get("a.example").await.unwrap();
    assert_eq!(session.status, SessionStatus::Stopped);
    assert_eq!(session.probe_count, 1);

    intervals(2).await;
    assert_eq!(manager.get("a.example").await.unwrap().probe_count, 1);
    assert_eq!(factory.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_during_in_flight_cycle_keeps_one_loop() {
    let (factory, manager, config) = slow_cycle_manager();

    let first = manager.start("a.example", config).await.unwrap();
    sleep_ms(500).await;
    manager.stop("a.example").await.unwrap();
    sleep_ms(100).await;

    let resumed = manager.start("a.example", config).await.unwrap();
    assert_eq!(resumed.id, first.id);

    // Only the resumed loop may record
    sleep_ms(1500).await;
    assert_eq!(manager.get("a.example").await.unwrap().probe_count, 0);

    sleep_ms(600).await;
    let session = manager.get("a.example").await.unwrap();
    assert_eq!(session.probe_count, 1);
    assert!(session.is_running());
    assert_eq!(factory.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycles_do_not_end_the_loop() {
    let factory = Arc::new(ScriptedFactory::denied());
    let manager = manager_with(factory.clone(), 10);

    manager.start("a.example", ProbeConfig::default()).await.unwrap();
    intervals(2).await;

    let session = manager.get("a.example").await.unwrap();
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.probe_count, 0);
    assert_eq!(session.failed_cycles, 3);
    assert_eq!(session.cycles_run(), 3);
    assert!(session
        .last_error
        .as_deref()
        .unwrap()
        .contains("Insufficient permissions"));
    assert_eq!(factory.opened(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_cycle_is_isolated() {
    let crashing = Arc::new(ScriptedFactory::new(reachable_path()).with_behavior(Behavior::Panic));
    let manager = manager_with(crashing.clone(), 10);

    manager.start("a.example", ProbeConfig::default()).await.unwrap();
    intervals(1).await;

    let session = manager.get("a.example").await.unwrap();
    assert!(session.is_running());
    assert!(session.last_error.as_deref().unwrap().contains("aborted"));
    assert_eq!(crashing.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_probe_once_is_independent_of_sessions() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory, 10);

    let result = manager
        .probe_once("a.example", ProbeConfig::default())
        .await
        .unwrap();
    assert!(result.completed);
    assert_eq!(result.total_hops, 3);
    assert!(manager.list_all().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let factory = Arc::new(ScriptedFactory::new(reachable_path()));
    let manager = manager_with(factory.clone(), 10);

    manager.start("a.example", ProbeConfig::default()).await.unwrap();
    manager.start("b.example", ProbeConfig::default()).await.unwrap();
    intervals(0).await;

    manager.shutdown().await;
    assert!(manager
        .list_all()
        .await
        .iter()
        .all(|s| s.status == SessionStatus::Stopped));

    let opened = factory.opened();
    intervals(2).await;
    assert_eq!(factory.opened(), opened);

    assert!(matches!(
        manager.start("c.example", ProbeConfig::default()).await,
        Err(SessionError::ShutDown)
    ));
}
