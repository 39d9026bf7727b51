//! Built-in handlers, one per host event type.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::SpawnOptions;
use crate::context::StewardContext;
use crate::error::Result;
use crate::hierarchy::SubagentSignal;
use crate::notify::NotificationKind;
use crate::policy::{PermissionRequest, Verdict};
use crate::protocol::{EventPayload, HookResponse};

use super::HookHandler;

pub fn default_handlers() -> Vec<(&'static str, Arc<dyn HookHandler>)> {
    vec![
        entry("SessionStart", SessionStartHandler),
        entry("UserPromptSubmit", UserPromptSubmitHandler),
        entry("PreToolUse", PreToolUseHandler),
        entry("PostToolUse", PostToolUseHandler),
        entry("SubagentStart", SubagentStartHandler),
        entry("SubagentStop", SubagentStopHandler),
        entry("Stop", StopHandler),
        entry("SessionEnd", SessionEndHandler),
        entry("Notification", NotificationHandler),
        entry("PermissionRequest", PermissionRequestHandler),
    ]
}

fn entry<H: HookHandler + 'static>(
    event_type: &'static str,
    handler: H,
) -> (&'static str, Arc<dyn HookHandler>) {
    (event_type, Arc::new(handler))
}

/// The agent an event is about: its own agent id when that names a known
/// agent, else whatever its session maps to.
fn acting_agent(ctx: &StewardContext, event: &EventPayload) -> Result<Option<String>> {
    if let Some(agent_id) = event.agent_id.as_deref() {
        if let Some(id) = ctx.agents.resolve_known_agent(agent_id)? {
            return Ok(Some(id));
        }
    }
    match event.session_id.as_deref() {
        Some(session_id) => {
            let resolved = ctx.agents.resolve_known_agent(session_id)?;
            if resolved.is_none() {
                tracing::debug!("no agent known for session {}", session_id);
            }
            Ok(resolved)
        }
        None => Ok(None),
    }
}

/// Lifecycle bookkeeping must not change what a tool event decides: a
/// failure here is logged and the handler carries on.
fn best_effort<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("{} failed, continuing: {}", what, e);
            None
        }
    }
}

/// Marks the acting agent active, if there is one. Returns its id.
fn touch_acting_agent(ctx: &StewardContext, event: &EventPayload) -> Option<String> {
    let agent_id = best_effort("agent lookup", acting_agent(ctx, event)).flatten()?;
    best_effort("mark active", ctx.agents.mark_active(&agent_id));
    Some(agent_id)
}

/// `(cwd, session)` of a delegation tool call, when the event carries both.
fn delegation_key(ctx: &StewardContext, event: &EventPayload) -> Option<(String, String)> {
    let tool = event.tool_name.as_deref()?;
    if !ctx.config.is_delegation_tool(tool) {
        return None;
    }
    Some((event.cwd.clone()?, event.session_id.clone()?))
}

fn permission_request(event: &EventPayload) -> PermissionRequest {
    PermissionRequest {
        session_id: event.session_id.clone().unwrap_or_default(),
        request_type: event.event_type.clone(),
        tool_name: event.tool_name.clone(),
        file_path: event.file_path(),
        command: event.command(),
        permission_type: event.permission_type.clone(),
        details: event
            .permission_details
            .clone()
            .or_else(|| event.tool_input.clone())
            .unwrap_or_default(),
    }
}

fn display_name(event: &EventPayload) -> String {
    event
        .agent_name
        .clone()
        .or_else(|| {
            event
                .cwd
                .as_deref()
                .and_then(|cwd| Path::new(cwd).file_name())
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "session".into())
}

// ------------------------------------------------------------------
// Session lifecycle
// ------------------------------------------------------------------

pub struct SessionStartHandler;

#[async_trait]
impl HookHandler for SessionStartHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        let Some(session_id) = event.session_id.as_deref() else {
            tracing::warn!("SessionStart without session id");
            return Ok(HookResponse::proceed());
        };

        let agent_id = match ctx.agents.resolve_known_agent(session_id)? {
            Some(id) => id,
            None => {
                ctx.agents
                    .spawn(SpawnOptions {
                        id: Some(session_id.to_string()),
                        name: display_name(event),
                        cwd: event.cwd.clone().unwrap_or_default(),
                        session_path: Some(session_id.to_string()),
                        ..Default::default()
                    })?
                    .id
            }
        };
        ctx.agents.mark_ready(&agent_id)?;
        ctx.agents.map_session(session_id, &agent_id);

        ctx.bus.emit(
            NotificationKind::SessionStart,
            &json!({"sessionId": session_id, "agentId": agent_id, "cwd": event.cwd}),
        );
        Ok(HookResponse::proceed())
    }
}

pub struct UserPromptSubmitHandler;

#[async_trait]
impl HookHandler for UserPromptSubmitHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        if let Some(agent_id) = acting_agent(ctx, event)? {
            ctx.agents.mark_active(&agent_id)?;
            if let Some(prompt) = event.prompt.as_deref() {
                ctx.agents.record_initial_prompt(&agent_id, prompt)?;
            }
        }
        Ok(HookResponse::context(""))
    }
}

pub struct StopHandler;

#[async_trait]
impl HookHandler for StopHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        if let Some(agent_id) = acting_agent(ctx, event)? {
            ctx.agents.mark_idle(&agent_id)?;
        }
        Ok(HookResponse::proceed())
    }
}

pub struct SessionEndHandler;

#[async_trait]
impl HookHandler for SessionEndHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        let Some(session_id) = event.session_id.as_deref() else {
            tracing::warn!("SessionEnd without session id");
            return Ok(HookResponse::proceed());
        };

        let agent_id = ctx.agents.resolve_known_agent(session_id)?;
        if let Some(agent_id) = agent_id.as_deref() {
            ctx.agents.complete(agent_id, 0)?;
        }
        ctx.hierarchy.clear_session(session_id);
        ctx.agents.unmap_session(session_id);

        ctx.bus.emit(
            NotificationKind::SessionEnd,
            &json!({"sessionId": session_id, "agentId": agent_id}),
        );
        Ok(HookResponse::proceed())
    }
}

// ------------------------------------------------------------------
// Tool use
// ------------------------------------------------------------------

pub struct PreToolUseHandler;

#[async_trait]
impl HookHandler for PreToolUseHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        touch_acting_agent(ctx, event);

        let request = permission_request(event);
        ctx.bus.emit(NotificationKind::PermissionRequested, &request);

        let evaluation = ctx.policies.evaluate(&request);

        // A denied delegation never runs, so no PostToolUse will pop it.
        if evaluation.verdict != Verdict::Denied {
            if let Some((cwd, session_id)) = delegation_key(ctx, event) {
                ctx.hierarchy.push(&cwd, &session_id);
            }
        }

        Ok(match evaluation.verdict {
            Verdict::Approved => HookResponse::allow(Some(evaluation.reason)),
            Verdict::Denied => HookResponse::deny(evaluation.reason),
            Verdict::Queued => HookResponse::ask(evaluation.reason),
        })
    }
}

pub struct PostToolUseHandler;

#[async_trait]
impl HookHandler for PostToolUseHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        let agent_id = touch_acting_agent(ctx, event);
        if let Some((cwd, session_id)) = delegation_key(ctx, event) {
            if !ctx.hierarchy.pop_session(&cwd, &session_id) {
                tracing::debug!("no pending delegation for {} in {}", session_id, cwd);
            }
        }

        ctx.bus.emit(
            NotificationKind::ToolUsed,
            &json!({
                "sessionId": event.session_id,
                "agentId": agent_id,
                "toolName": event.tool_name,
            }),
        );
        Ok(HookResponse::post_tool_use())
    }
}

// ------------------------------------------------------------------
// Sub-agents
// ------------------------------------------------------------------

pub struct SubagentStartHandler;

#[async_trait]
impl HookHandler for SubagentStartHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        let subagent_id = event
            .agent_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if ctx.agents.get_agent(&subagent_id)?.is_some() {
            tracing::debug!("sub-agent {} already registered", subagent_id);
            ctx.agents.mark_active(&subagent_id)?;
            return Ok(HookResponse::proceed());
        }

        let signal = SubagentSignal {
            subagent_id: subagent_id.clone(),
            session_id: event.session_id.clone(),
            cwd: event.cwd.clone(),
            parent_hint: event.parent_session_id.clone(),
        };
        let resolution = ctx.hierarchy.resolve_parent(&ctx.agents, &signal)?;

        let agent = ctx.agents.spawn(SpawnOptions {
            id: Some(subagent_id.clone()),
            name: event
                .agent_name
                .clone()
                .or_else(|| event.agent_type.clone())
                .unwrap_or_else(|| "subagent".into()),
            cwd: event.cwd.clone().unwrap_or_default(),
            parent_id: resolution.parent_id.clone(),
            template_id: event.agent_type.clone(),
            session_path: event.session_id.clone(),
            initial_prompt: event.prompt.clone(),
        })?;
        ctx.agents.mark_ready(&agent.id)?;
        ctx.agents.mark_active(&agent.id)?;
        ctx.agents.map_session(&subagent_id, &agent.id);

        ctx.bus.emit(
            NotificationKind::AgentStart,
            &json!({
                "agentId": agent.id,
                "parentId": resolution.parent_id,
                "strategy": resolution.strategy,
                "sessionId": event.session_id,
            }),
        );
        Ok(HookResponse::proceed())
    }
}

pub struct SubagentStopHandler;

#[async_trait]
impl HookHandler for SubagentStopHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        let Some(subagent_id) = event.agent_id.as_deref() else {
            tracing::warn!("SubagentStop without agent id");
            return Ok(HookResponse::proceed());
        };
        let agent_id = ctx.agents.resolve_known_agent(subagent_id)?;
        match agent_id.as_deref() {
            Some(id) => {
                ctx.agents.complete(id, 0)?;
            }
            None => tracing::warn!("SubagentStop for unknown agent {}", subagent_id),
        }

        ctx.bus.emit(
            NotificationKind::AgentStop,
            &json!({"agentId": agent_id.as_deref().unwrap_or(subagent_id), "sessionId": event.session_id}),
        );
        Ok(HookResponse::proceed())
    }
}

// ------------------------------------------------------------------
// Notifications and permission prompts
// ------------------------------------------------------------------

pub struct NotificationHandler;

#[async_trait]
impl HookHandler for NotificationHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        match event.notification_type.as_deref() {
            Some("permission_prompt") => {
                ctx.bus.emit(
                    NotificationKind::PermissionRequested,
                    &json!({
                        "sessionId": event.session_id,
                        "message": event.notification_message,
                    }),
                );
            }
            Some("idle_prompt") => {
                if let Some(agent_id) = acting_agent(ctx, event)? {
                    ctx.agents.mark_idle(&agent_id)?;
                }
            }
            other => tracing::debug!("ignoring notification type {:?}", other),
        }
        Ok(HookResponse::proceed())
    }
}

pub struct PermissionRequestHandler;

#[async_trait]
impl HookHandler for PermissionRequestHandler {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse> {
        let request = permission_request(event);
        ctx.bus.emit(NotificationKind::PermissionRequested, &request);

        let evaluation = ctx.policies.evaluate(&request);
        Ok(match evaluation.verdict {
            Verdict::Denied => HookResponse::halt(evaluation.reason),
            Verdict::Approved | Verdict::Queued => HookResponse::proceed(),
        })
    }
}
