use crate::config::maintenance::span;
use crate::config::StewardConfig;
use crate::context::StewardContext;
use crate::error::Result;
use crate::policy::{ApprovalQueueItem, PermissionRequest, PolicyEngine};

use super::QueueCommand;

pub async fn run_queue(config: StewardConfig, command: QueueCommand) -> Result<()> {
    let ctx = StewardContext::open(config)?;
    let engine = &ctx.policies;

    match command {
        QueueCommand::List { session } => {
            let pending = engine.get_pending_approvals(session.as_deref())?;
            if pending.is_empty() {
                println!("No pending requests.");
                return Ok(());
            }
            for item in &pending {
                print_item(item);
            }
            println!("{} pending request(s)", pending.len());
        }
        QueueCommand::Approve { ids } => decide(engine, &ids, true)?,
        QueueCommand::Deny { ids } => decide(engine, &ids, false)?,
        QueueCommand::Expire { older_than_secs } => {
            let expired = engine.expire_pending(span(older_than_secs))?;
            eprintln!("steward: expired {} request(s)", expired.len());
        }
    }
    Ok(())
}

/// One id is a single user decision; several go through the batch path,
/// which skips items that are already decided.
fn decide(engine: &PolicyEngine, ids: &[String], approve: bool) -> Result<()> {
    let verb = if approve { "approved" } else { "denied" };
    if let [id] = ids {
        let item = if approve {
            engine.approve_item(id, true)?
        } else {
            engine.deny_item(id, true)?
        };
        if item.is_none() {
            eprintln!("steward: no queued request with id {}", id);
            std::process::exit(1);
        }
        eprintln!("steward: {} {}", verb, id);
        return Ok(());
    }

    let decided = if approve {
        engine.batch_approve(ids)?
    } else {
        engine.batch_deny(ids)?
    };
    eprintln!("steward: {} {} of {} request(s)", verb, decided.len(), ids.len());
    Ok(())
}

fn print_item(item: &ApprovalQueueItem) {
    let request: Option<PermissionRequest> = serde_json::from_str(&item.request_details).ok();
    let tool = request
        .as_ref()
        .and_then(|r| r.tool_name.clone().or_else(|| r.permission_type.clone()))
        .unwrap_or_else(|| "-".into());
    let target = request
        .as_ref()
        .and_then(|r| r.file_path.clone().or_else(|| r.command.clone()))
        .unwrap_or_else(|| "-".into());
    println!(
        "ID: {}\n  Session: {}\n  Type: {}\n  Tool: {}\n  Target: {}\n  Queued: {}\n",
        item.id,
        item.session_id,
        item.request_type,
        tool,
        truncate(&target, 80),
        item.created_at,
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
