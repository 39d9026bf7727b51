//! Tests for agent lifecycle, the session map and tree queries.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use steward::agents::{Agent, AgentRegistry, AgentStatus, SpawnOptions};
use steward::clock::ManualClock;
use steward::notify::{Notification, NotificationBus, NotificationKind};
use steward::storage::{MemoryStore, Store};

struct Fixture {
    registry: AgentRegistry,
    store: Arc<MemoryStore>,
    bus: NotificationBus,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::new());
    let bus = NotificationBus::new();
    let registry = AgentRegistry::new(store.clone(), bus.clone(), clock.clone());
    Fixture {
        registry,
        store,
        bus,
        clock,
    }
}

fn spawn(registry: &AgentRegistry, id: &str, parent: Option<&str>) -> Agent {
    registry
        .spawn(SpawnOptions {
            id: Some(id.into()),
            name: id.into(),
            cwd: "/repo".into(),
            parent_id: parent.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notification>) -> Vec<NotificationKind> {
    std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.kind).collect()
}

fn ids(agents: &[Agent]) -> Vec<&str> {
    agents.iter().map(|a| a.id.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn spawn_starts_in_spawning_without_pid() {
    let f = fixture();
    let agent = spawn(&f.registry, "a1", None);
    assert_eq!(agent.status, AgentStatus::Spawning);
    assert!(agent.pid.is_none());
    assert_eq!(agent.session_path, "a1");
    assert_eq!(f.store.get_agent("a1").unwrap().unwrap(), agent);
}

#[test]
fn spawn_without_id_generates_one() {
    let f = fixture();
    let agent = f
        .registry
        .spawn(SpawnOptions {
            name: "anon".into(),
            ..Default::default()
        })
        .unwrap();
    assert!(!agent.id.is_empty());
    assert!(f.registry.get_agent(&agent.id).unwrap().is_some());
}

#[test]
fn lifecycle_transitions() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    f.registry.set_pid("a1", 4242).unwrap();
    assert_eq!(
        f.registry.mark_ready("a1").unwrap().unwrap().status,
        AgentStatus::Ready
    );
    assert_eq!(
        f.registry.mark_active("a1").unwrap().unwrap().status,
        AgentStatus::Active
    );
    assert_eq!(
        f.registry.mark_idle("a1").unwrap().unwrap().status,
        AgentStatus::Idle
    );
    let done = f.registry.complete("a1", 0).unwrap().unwrap();
    assert_eq!(done.status, AgentStatus::Completed);
    assert_eq!(done.exit_code, Some(0));
    assert_eq!(done.pid, Some(4242));
}

#[test]
fn nonzero_exit_is_error() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    let agent = f.registry.complete("a1", 3).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Error);
    assert_eq!(agent.exit_code, Some(3));
}

#[test]
fn error_records_message() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    let agent = f.registry.error("a1", "boom").unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Error);
    assert_eq!(agent.error_message.as_deref(), Some("boom"));
}

#[test]
fn mark_active_twice_emits_once() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    let mut rx = f.bus.subscribe();

    f.registry.mark_active("a1").unwrap();
    f.registry.mark_active("a1").unwrap();

    let active: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|k| *k == NotificationKind::AgentActive)
        .collect();
    assert_eq!(active.len(), 1);
}

#[test]
fn mark_active_again_after_idle_emits_again() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    let mut rx = f.bus.subscribe();

    f.registry.mark_active("a1").unwrap();
    f.registry.mark_idle("a1").unwrap();
    f.registry.mark_active("a1").unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            NotificationKind::AgentActive,
            NotificationKind::AgentIdle,
            NotificationKind::AgentActive
        ]
    );
}

#[test]
fn activity_stamp_moves_with_activity_only() {
    let f = fixture();
    let spawned = spawn(&f.registry, "a1", None);

    f.clock.advance(Duration::seconds(10));
    let active = f.registry.mark_active("a1").unwrap().unwrap();
    assert_eq!(active.last_activity, spawned.last_activity + Duration::seconds(10));

    f.clock.advance(Duration::seconds(10));
    let idle = f.registry.mark_idle("a1").unwrap().unwrap();
    assert_eq!(idle.last_activity, active.last_activity);
}

#[test]
fn first_prompt_is_kept() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    f.registry.record_initial_prompt("a1", "first").unwrap();
    f.registry.record_initial_prompt("a1", "second").unwrap();
    assert_eq!(
        f.registry.get_agent("a1").unwrap().unwrap().initial_prompt.as_deref(),
        Some("first")
    );
}

#[test]
fn unknown_agent_is_none() {
    let f = fixture();
    assert!(f.registry.mark_active("ghost").unwrap().is_none());
    assert!(f.registry.terminate_agent("ghost").unwrap().is_none());
    assert!(f.registry.complete("ghost", 0).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Session map
// ---------------------------------------------------------------------------

#[test]
fn terminate_purges_every_mapped_session() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    spawn(&f.registry, "a2", None);
    f.registry.map_session("s1", "a1");
    f.registry.map_session("s2", "a1");
    f.registry.map_session("s3", "a1");
    f.registry.map_session("s4", "a2");

    let agent = f.registry.terminate_agent("a1").unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Terminated);
    assert_eq!(
        f.registry.session_map_snapshot(),
        vec![("s4".to_string(), "a2".to_string())]
    );
}

#[test]
fn resolve_known_agent_prefers_session_map() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    f.registry.map_session("s1", "a1");

    assert_eq!(f.registry.resolve_known_agent("s1").unwrap().as_deref(), Some("a1"));
    assert_eq!(f.registry.resolve_known_agent("a1").unwrap().as_deref(), Some("a1"));
    assert!(f.registry.resolve_known_agent("s9").unwrap().is_none());
}

#[test]
fn remove_agent_drops_record_and_mappings() {
    let f = fixture();
    spawn(&f.registry, "a1", None);
    f.registry.map_session("s1", "a1");
    assert!(f.registry.remove_agent("a1").unwrap());
    assert!(f.registry.get_agent("a1").unwrap().is_none());
    assert!(f.registry.agent_for_session("s1").is_none());
}

// ---------------------------------------------------------------------------
// Tree queries
// ---------------------------------------------------------------------------

#[test]
fn children_ancestors_descendants() {
    let f = fixture();
    spawn(&f.registry, "root", None);
    spawn(&f.registry, "a", Some("root"));
    spawn(&f.registry, "b", Some("root"));
    spawn(&f.registry, "a1", Some("a"));

    assert_eq!(ids(&f.registry.children("root").unwrap()), vec!["a", "b"]);
    assert_eq!(ids(&f.registry.ancestors("a1").unwrap()), vec!["a", "root"]);
    assert_eq!(
        ids(&f.registry.descendants("root").unwrap()),
        vec!["a", "a1", "b"]
    );
}

#[test]
fn forest_includes_orphans_as_roots() {
    let f = fixture();
    spawn(&f.registry, "root", None);
    spawn(&f.registry, "child", Some("root"));
    spawn(&f.registry, "orphan", Some("gone"));

    let forest = f.registry.forest().unwrap();
    let roots: Vec<&str> = forest.iter().map(|n| n.agent.id.as_str()).collect();
    assert_eq!(roots, vec!["root", "orphan"]);
    assert_eq!(forest[0].children.len(), 1);
    assert_eq!(forest[0].children[0].agent.id, "child");
}

#[test]
fn cyclic_parents_terminate() {
    let f = fixture();
    spawn(&f.registry, "x", Some("y"));
    spawn(&f.registry, "y", Some("x"));

    assert_eq!(ids(&f.registry.ancestors("x").unwrap()), vec!["y"]);
    assert_eq!(ids(&f.registry.descendants("x").unwrap()), vec!["y"]);
    // Neither is a root, so the cycle does not appear in the forest.
    assert!(f.registry.forest().unwrap().is_empty());
}
