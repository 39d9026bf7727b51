//! Tests for the maintenance scheduler and its tasks, driven by a manual clock.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use steward::agents::{Agent, AgentStatus, SpawnOptions};
use steward::clock::{Clock, ManualClock};
use steward::config::StewardConfig;
use steward::context::StewardContext;
use steward::maintenance::{GarbageDetector, MaintenanceScheduler, MaintenanceTask};

fn context() -> (Arc<StewardContext>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let ctx = Arc::new(StewardContext::in_memory(
        StewardConfig::default(),
        clock.clone(),
    ));
    (ctx, clock)
}

fn spawn_active(ctx: &StewardContext, id: &str) {
    ctx.agents
        .spawn(SpawnOptions {
            id: Some(id.into()),
            name: id.into(),
            ..Default::default()
        })
        .unwrap();
    ctx.agents.mark_active(id).unwrap();
}

fn status(ctx: &StewardContext, id: &str) -> AgentStatus {
    ctx.agents.get_agent(id).unwrap().unwrap().status
}

struct NamedGarbage(&'static str);

impl GarbageDetector for NamedGarbage {
    fn is_garbage(&self, agent: &Agent) -> bool {
        agent.name == self.0
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[test]
fn nothing_runs_before_first_interval() {
    let (ctx, clock) = context();
    let mut scheduler = MaintenanceScheduler::new(ctx).unwrap();
    clock.advance(Duration::seconds(29));
    assert!(scheduler.run_due(clock.now()).is_empty());
}

#[test]
fn due_tasks_run_in_fixed_order_and_reschedule() {
    let (ctx, clock) = context();
    let mut scheduler = MaintenanceScheduler::new(ctx).unwrap();

    clock.advance(Duration::seconds(600));
    let now = clock.now();
    let ran: Vec<MaintenanceTask> = scheduler.run_due(now).into_iter().map(|r| r.task).collect();
    assert_eq!(ran, MaintenanceTask::ALL.to_vec());

    assert_eq!(
        scheduler.next_due(MaintenanceTask::ActivityCheck),
        Some(now + Duration::seconds(30))
    );
    assert_eq!(
        scheduler.next_due(MaintenanceTask::GarbageCleanup),
        Some(now + Duration::seconds(600))
    );

    // Only the 30s task is due again after another 30s.
    clock.advance(Duration::seconds(30));
    let ran: Vec<MaintenanceTask> = scheduler
        .run_due(clock.now())
        .into_iter()
        .map(|r| r.task)
        .collect();
    assert_eq!(ran, vec![MaintenanceTask::ActivityCheck]);
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[test]
fn active_agent_goes_idle_then_stale() {
    let (ctx, clock) = context();
    spawn_active(&ctx, "a1");
    let mut scheduler = MaintenanceScheduler::new(ctx.clone()).unwrap();

    clock.advance(Duration::seconds(150));
    scheduler.run_due(clock.now());
    assert_eq!(status(&ctx, "a1"), AgentStatus::Idle);

    clock.advance(Duration::seconds(1800));
    scheduler.run_due(clock.now());
    assert_eq!(status(&ctx, "a1"), AgentStatus::Terminated);
}

#[test]
fn recent_activity_keeps_agent_active() {
    let (ctx, clock) = context();
    spawn_active(&ctx, "a1");
    let mut scheduler = MaintenanceScheduler::new(ctx.clone()).unwrap();

    clock.advance(Duration::seconds(100));
    ctx.agents.mark_active("a1").unwrap();
    clock.advance(Duration::seconds(50));
    scheduler.run_due(clock.now());
    assert_eq!(status(&ctx, "a1"), AgentStatus::Active);
}

#[test]
fn garbage_cleanup_deletes_flagged_agents() {
    let (ctx, clock) = context();
    spawn_active(&ctx, "keep");
    spawn_active(&ctx, "junk");
    ctx.agents.map_session("s-junk", "junk");
    let mut scheduler =
        MaintenanceScheduler::with_detector(ctx.clone(), Box::new(NamedGarbage("junk")));

    clock.advance(Duration::seconds(600));
    let reports = scheduler.run_due(clock.now());
    let garbage = reports
        .iter()
        .find(|r| r.task == MaintenanceTask::GarbageCleanup)
        .unwrap();
    assert_eq!(garbage.affected, vec!["junk".to_string()]);
    assert!(ctx.agents.get_agent("junk").unwrap().is_none());
    assert!(ctx.agents.get_agent("keep").unwrap().is_some());
    assert!(ctx.agents.agent_for_session("s-junk").is_none());
}

#[test]
fn session_map_validation_drops_dead_entries() {
    let (ctx, clock) = context();
    spawn_active(&ctx, "live");
    spawn_active(&ctx, "done");
    ctx.agents.complete("done", 0).unwrap();
    ctx.agents.map_session("s-live", "live");
    ctx.agents.map_session("s-done", "done");
    ctx.agents.map_session("s-ghost", "ghost");
    let mut scheduler = MaintenanceScheduler::new(ctx.clone()).unwrap();

    clock.advance(Duration::seconds(60));
    scheduler.run_due(clock.now());
    assert_eq!(
        ctx.agents.session_map_snapshot(),
        vec![("s-live".to_string(), "live".to_string())]
    );
}

#[test]
fn startup_sweep_terminates_leftovers() {
    let (ctx, clock) = context();
    spawn_active(&ctx, "old");
    spawn_active(&ctx, "finished");
    ctx.agents.complete("finished", 0).unwrap();
    ctx.agents.map_session("s-old", "old");
    ctx.agents.map_session("s-fin", "finished");
    clock.advance(Duration::seconds(3600));
    spawn_active(&ctx, "new");

    let scheduler = MaintenanceScheduler::new(ctx.clone()).unwrap();
    let report = scheduler.startup_sweep().unwrap();
    assert_eq!(report.terminated, vec!["old".to_string()]);
    // Termination already purged s-old; validation catches the finished agent.
    assert_eq!(report.unmapped_sessions, vec!["s-fin".to_string()]);
    assert!(ctx.agents.agent_for_session("s-old").is_none());
    assert_eq!(status(&ctx, "new"), AgentStatus::Active);
    assert_eq!(status(&ctx, "finished"), AgentStatus::Completed);
}

#[test]
fn tasks_are_idempotent() {
    let (ctx, clock) = context();
    spawn_active(&ctx, "a1");
    let mut scheduler = MaintenanceScheduler::new(ctx.clone()).unwrap();

    clock.advance(Duration::seconds(600));
    let first = scheduler.run_due(clock.now());
    assert!(first.iter().any(|r| !r.affected.is_empty()));

    clock.advance(Duration::seconds(600));
    let second = scheduler.run_due(clock.now());
    assert!(second.iter().all(|r| r.affected.is_empty()));
}

#[test]
fn huge_intervals_are_clamped_instead_of_overflowing() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let mut config = StewardConfig::default();
    config.maintenance.activity_check_interval_secs = u64::MAX;
    config.maintenance.stale_threshold_secs = u64::MAX;
    let ctx = Arc::new(StewardContext::in_memory(config, clock.clone()));
    spawn_active(&ctx, "a1");

    let mut scheduler = MaintenanceScheduler::new(ctx.clone()).unwrap();
    let due = scheduler.next_due(MaintenanceTask::ActivityCheck).unwrap();
    assert!(due > clock.now() + Duration::days(365));

    clock.advance(Duration::seconds(600));
    scheduler.run_due(clock.now());
    scheduler.startup_sweep().unwrap();
    assert_eq!(status(&ctx, "a1"), AgentStatus::Active);
}
