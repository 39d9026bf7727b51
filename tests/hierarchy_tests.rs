//! Tests for the per-directory delegation stacks and parent inference.

use std::sync::Arc;

use steward::agents::{AgentRegistry, SpawnOptions};
use steward::clock::ManualClock;
use steward::hierarchy::{ParentStrategy, SessionHierarchyTracker, SubagentSignal};
use steward::notify::NotificationBus;
use steward::storage::MemoryStore;

fn registry() -> AgentRegistry {
    AgentRegistry::new(
        Arc::new(MemoryStore::new()),
        NotificationBus::new(),
        Arc::new(ManualClock::default()),
    )
}

fn spawn(registry: &AgentRegistry, id: &str) {
    registry
        .spawn(SpawnOptions {
            id: Some(id.into()),
            name: id.into(),
            ..Default::default()
        })
        .unwrap();
}

fn signal(subagent_id: &str) -> SubagentSignal {
    SubagentSignal {
        subagent_id: subagent_id.into(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

#[test]
fn stack_is_per_directory() {
    let tracker = SessionHierarchyTracker::new();
    tracker.push("/a", "s1");
    tracker.push("/a", "s2");
    tracker.push("/b", "s3");

    assert_eq!(tracker.peek("/a").as_deref(), Some("s2"));
    assert_eq!(tracker.peek("/b").as_deref(), Some("s3"));
    assert_eq!(tracker.depth("/a"), 2);

    assert_eq!(tracker.pop("/a").as_deref(), Some("s2"));
    assert_eq!(tracker.peek("/a").as_deref(), Some("s1"));
    assert_eq!(tracker.pop("/a").as_deref(), Some("s1"));
    assert!(tracker.pop("/a").is_none());
    assert_eq!(tracker.depth("/a"), 0);
}

#[test]
fn pop_session_removes_out_of_order() {
    let tracker = SessionHierarchyTracker::new();
    tracker.push("/a", "s1");
    tracker.push("/a", "s2");

    assert!(tracker.pop_session("/a", "s1"));
    assert_eq!(tracker.peek("/a").as_deref(), Some("s2"));
    assert!(!tracker.pop_session("/a", "s1"));
}

#[test]
fn clear_session_spans_directories() {
    let tracker = SessionHierarchyTracker::new();
    tracker.push("/a", "s1");
    tracker.push("/b", "s1");
    tracker.push("/b", "s2");

    tracker.clear_session("s1");
    assert!(tracker.peek("/a").is_none());
    assert_eq!(tracker.peek("/b").as_deref(), Some("s2"));
}

// ---------------------------------------------------------------------------
// Parent inference
// ---------------------------------------------------------------------------

#[test]
fn explicit_hint_wins() {
    let registry = registry();
    spawn(&registry, "hinted");
    spawn(&registry, "stacked");
    let tracker = SessionHierarchyTracker::new();
    tracker.push("/repo", "stacked");

    let resolution = tracker
        .resolve_parent(
            &registry,
            &SubagentSignal {
                subagent_id: "sub".into(),
                cwd: Some("/repo".into()),
                parent_hint: Some("hinted".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(resolution.parent_id.as_deref(), Some("hinted"));
    assert_eq!(resolution.strategy, Some(ParentStrategy::ExplicitHint));
}

#[test]
fn hint_resolves_through_session_map() {
    let registry = registry();
    spawn(&registry, "agent-1");
    registry.map_session("session-1", "agent-1");
    let tracker = SessionHierarchyTracker::new();

    let resolution = tracker
        .resolve_parent(
            &registry,
            &SubagentSignal {
                subagent_id: "sub".into(),
                parent_hint: Some("session-1".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(resolution.parent_id.as_deref(), Some("agent-1"));
}

#[test]
fn unknown_hint_falls_back_to_stack() {
    let registry = registry();
    spawn(&registry, "parent");
    let tracker = SessionHierarchyTracker::new();
    tracker.push("/repo", "parent");

    let resolution = tracker
        .resolve_parent(
            &registry,
            &SubagentSignal {
                subagent_id: "sub".into(),
                cwd: Some("/repo".into()),
                parent_hint: Some("nobody".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(resolution.parent_id.as_deref(), Some("parent"));
    assert_eq!(resolution.strategy, Some(ParentStrategy::HierarchyStack));
}

#[test]
fn event_session_used_when_stack_empty() {
    let registry = registry();
    spawn(&registry, "s1");
    let tracker = SessionHierarchyTracker::new();

    let resolution = tracker
        .resolve_parent(
            &registry,
            &SubagentSignal {
                subagent_id: "sub".into(),
                session_id: Some("s1".into()),
                cwd: Some("/repo".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(resolution.parent_id.as_deref(), Some("s1"));
    assert_eq!(resolution.strategy, Some(ParentStrategy::EventSession));
}

#[test]
fn id_prefix_is_last_resort() {
    let registry = registry();
    spawn(&registry, "root");
    let tracker = SessionHierarchyTracker::new();

    let resolution = tracker.resolve_parent(&registry, &signal("root-task-7")).unwrap();
    assert_eq!(resolution.parent_id.as_deref(), Some("root"));
    assert_eq!(resolution.strategy, Some(ParentStrategy::IdPrefix));
}

#[test]
fn subagent_is_never_its_own_parent() {
    let registry = registry();
    spawn(&registry, "sub");
    let tracker = SessionHierarchyTracker::new();

    let resolution = tracker
        .resolve_parent(
            &registry,
            &SubagentSignal {
                subagent_id: "sub".into(),
                session_id: Some("sub".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(resolution.parent_id.is_none());
}

#[test]
fn orphan_records_diagnostic() {
    let registry = registry();
    let tracker = SessionHierarchyTracker::new();

    let resolution = tracker
        .resolve_parent(
            &registry,
            &SubagentSignal {
                subagent_id: "lonely".into(),
                session_id: Some("unknown-session".into()),
                cwd: Some("/repo".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(resolution.parent_id.is_none());
    assert!(resolution.strategy.is_none());

    let diagnostics = tracker.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].subagent_id, "lonely");
    assert_eq!(diagnostics[0].cwd.as_deref(), Some("/repo"));
    assert!(diagnostics[0].stack_top.is_none());
}

#[test]
fn diagnostics_are_bounded() {
    let registry = registry();
    let tracker = SessionHierarchyTracker::new();
    for i in 0..150 {
        tracker
            .resolve_parent(&registry, &signal(&format!("orphan{i}")))
            .unwrap();
    }
    let diagnostics = tracker.diagnostics();
    assert_eq!(diagnostics.len(), 100);
    assert_eq!(diagnostics[0].subagent_id, "orphan50");
}
