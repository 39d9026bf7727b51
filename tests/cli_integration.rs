//! CLI integration tests using assert_cmd to exercise the actual binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use steward::config::StewardConfig;
use steward::context::StewardContext;
use steward::policy::{PermissionRequest, QueueStatus};

/// Binary pointed at a scratch data dir, a config file that does not exist
/// and a socket nobody listens on.
fn steward(tmp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("steward").unwrap();
    cmd.env("HOME", tmp)
        .arg("--config")
        .arg(tmp.join("config.yml"))
        .arg("--data-dir")
        .arg(tmp.join("data"))
        .arg("--socket")
        .arg(tmp.join("steward.sock"));
    cmd
}

fn open_store(tmp: &Path) -> StewardContext {
    let config = StewardConfig {
        data_dir: Some(tmp.join("data")),
        ..Default::default()
    };
    StewardContext::open(config).unwrap()
}

// ---------------------------------------------------------------------------
// Hook subcommand
// ---------------------------------------------------------------------------

#[test]
fn cli_hook_fails_open_without_daemon() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .arg("hook")
        .write_stdin(r#"{"hook_event_name":"PreToolUse","tool_name":"Bash","tool_input":{"command":"ls"}}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""permissionDecision":"allow""#));
}

#[test]
fn cli_hook_defaults_by_category() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .arg("hook")
        .write_stdin(r#"{"hook_event_name":"UserPromptSubmit","prompt":"hi"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""additionalContext":"""#));
}

#[test]
fn cli_hook_garbage_input_still_answers() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .arg("hook")
        .write_stdin("this is not json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""continue":true"#));
}

#[test]
fn cli_hook_survives_broken_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.yml"), "hook_timeout_ms: [oops").unwrap();

    steward(tmp.path())
        .arg("hook")
        .write_stdin(r#"{"hook_event_name":"Stop"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""continue":true"#));
}

// ---------------------------------------------------------------------------
// Policy subcommand
// ---------------------------------------------------------------------------

#[test]
fn cli_policy_install_defaults_and_list() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .args(["policy", "install-defaults"])
        .assert()
        .success()
        .stderr(predicate::str::contains("installed 8 default policies"));

    steward(tmp.path())
        .args(["policy", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Allow Read"))
        .stdout(predicate::str::contains("Deny environment files"))
        .stdout(predicate::str::contains("8 policies"));

    steward(tmp.path())
        .args(["policy", "install-defaults"])
        .assert()
        .success()
        .stderr(predicate::str::contains("installed 0 default policies"));
}

#[test]
fn cli_policy_add_disable_remove() {
    let tmp = TempDir::new().unwrap();

    let output = steward(tmp.path())
        .args([
            "policy",
            "add",
            "Block rm",
            "Bash(rm *)",
            "--action",
            "auto-deny",
            "--priority",
            "500",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let id = String::from_utf8(output).unwrap().trim().to_string();
    assert!(!id.is_empty());

    steward(tmp.path())
        .args(["policy", "disable", &id])
        .assert()
        .success();
    let ctx = open_store(tmp.path());
    let policies = ctx.policies.get_all_policies().unwrap();
    assert_eq!(policies.len(), 1);
    assert!(!policies[0].enabled);
    assert_eq!(policies[0].priority, 500);

    steward(tmp.path())
        .args(["policy", "remove", &id])
        .assert()
        .success();
    assert!(ctx.policies.get_all_policies().unwrap().is_empty());
}

#[test]
fn cli_policy_rejects_bad_action() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .args(["policy", "add", "x", "Bash", "--action", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown policy action"));
}

#[test]
fn cli_policy_remove_unknown_fails() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .args(["policy", "remove", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("policy not found"));
}

// ---------------------------------------------------------------------------
// Queue subcommand
// ---------------------------------------------------------------------------

#[test]
fn cli_queue_list_empty() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending requests."));
}

#[test]
fn cli_queue_list_and_approve() {
    let tmp = TempDir::new().unwrap();
    let id = {
        let ctx = open_store(tmp.path());
        ctx.policies
            .evaluate(&PermissionRequest::for_tool("s1", "Bash").with_command("make deploy"))
            .queue_item_id
            .unwrap()
    };

    steward(tmp.path())
        .args(["queue", "list", "--session", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("make deploy"))
        .stdout(predicate::str::contains("1 pending request(s)"));

    steward(tmp.path())
        .args(["queue", "approve", &id])
        .assert()
        .success()
        .stderr(predicate::str::contains("approved"));

    let ctx = open_store(tmp.path());
    assert_eq!(
        ctx.policies.get_approval(&id).unwrap().unwrap().status,
        QueueStatus::Approved
    );

    // A second decision is refused.
    steward(tmp.path())
        .args(["queue", "deny", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already approved"));
}

#[test]
fn cli_queue_approve_unknown_fails() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .args(["queue", "approve", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no queued request"));
}

#[test]
fn cli_queue_expire() {
    let tmp = TempDir::new().unwrap();
    {
        let ctx = open_store(tmp.path());
        ctx.policies
            .evaluate(&PermissionRequest::for_tool("s1", "Bash"));
    }

    steward(tmp.path())
        .args(["queue", "expire", "--older-than-secs", "0"])
        .assert()
        .success()
        .stderr(predicate::str::contains("expired 1 request(s)"));
}

// ---------------------------------------------------------------------------
// Agents subcommand
// ---------------------------------------------------------------------------

#[test]
fn cli_agents_empty() {
    let tmp = TempDir::new().unwrap();

    steward(tmp.path())
        .args(["agents", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No agents."));
}

#[test]
fn cli_agents_tree_shows_nesting() {
    let tmp = TempDir::new().unwrap();
    {
        let ctx = open_store(tmp.path());
        for (id, parent) in [("root", None), ("child", Some("root"))] {
            ctx.agents
                .spawn(steward::agents::SpawnOptions {
                    id: Some(id.into()),
                    name: format!("{id}-name"),
                    parent_id: parent.map(str::to_string),
                    ..Default::default()
                })
                .unwrap();
        }
    }

    steward(tmp.path())
        .args(["agents", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("root  spawning"))
        .stdout(predicate::str::contains("\n  child  spawning"));

    steward(tmp.path())
        .args(["agents", "list", "--status", "spawning"])
        .assert()
        .success()
        .stdout(predicate::str::contains("child-name"));
}
