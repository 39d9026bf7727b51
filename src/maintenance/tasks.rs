use chrono::Duration;
use regex::Regex;
use serde::Serialize;

use crate::agents::{Agent, AgentRegistry, AgentStatus};
use crate::error::{Result, StewardError};

/// Decides whether an agent record was created by mistake and should be
/// removed outright.
pub trait GarbageDetector: Send + Sync {
    fn is_garbage(&self, agent: &Agent) -> bool;
}

/// Flags agents whose name matches any of a set of regexes.
pub struct PatternGarbageDetector {
    patterns: Vec<Regex>,
}

impl PatternGarbageDetector {
    pub fn from_patterns(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| StewardError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl GarbageDetector for PatternGarbageDetector {
    fn is_garbage(&self, agent: &Agent) -> bool {
        self.patterns.iter().any(|re| re.is_match(&agent.name))
    }
}

fn inactive_for(registry: &AgentRegistry, agent: &Agent, threshold: Duration) -> bool {
    registry.clock().now() - agent.last_activity > threshold
}

/// Active agents quiet for longer than `idle_threshold` become idle.
pub fn check_activity(registry: &AgentRegistry, idle_threshold: Duration) -> Result<Vec<String>> {
    let mut idled = Vec::new();
    for agent in registry.agents_with_status(AgentStatus::Active)? {
        if inactive_for(registry, &agent, idle_threshold) {
            registry.mark_idle(&agent.id)?;
            idled.push(agent.id);
        }
    }
    Ok(idled)
}

/// Idle agents quiet for longer than `stale_threshold` are terminated.
pub fn terminate_stale_agents(
    registry: &AgentRegistry,
    stale_threshold: Duration,
) -> Result<Vec<String>> {
    let mut terminated = Vec::new();
    for agent in registry.agents_with_status(AgentStatus::Idle)? {
        if inactive_for(registry, &agent, stale_threshold) {
            registry.terminate_agent(&agent.id)?;
            terminated.push(agent.id);
        }
    }
    Ok(terminated)
}

/// Delete every agent the detector flags, along with its session mappings.
pub fn cleanup_garbage(
    registry: &AgentRegistry,
    detector: &dyn GarbageDetector,
) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for agent in registry.list_agents()? {
        if detector.is_garbage(&agent) && registry.remove_agent(&agent.id)? {
            tracing::info!("removed garbage agent {} ({:?})", agent.id, agent.name);
            removed.push(agent.id);
        }
    }
    Ok(removed)
}

/// Drop session mappings whose agent is gone or finished. Returns the
/// unmapped session ids.
pub fn validate_session_map(registry: &AgentRegistry) -> Result<Vec<String>> {
    let mut unmapped = Vec::new();
    for (session_id, agent_id) in registry.session_map_snapshot() {
        let live = registry
            .get_agent(&agent_id)?
            .is_some_and(|agent| !agent.status.is_terminal());
        if !live {
            registry.unmap_session(&session_id);
            unmapped.push(session_id);
        }
    }
    if !unmapped.is_empty() {
        tracing::debug!("dropped {} stale session mapping(s)", unmapped.len());
    }
    Ok(unmapped)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub terminated: Vec<String>,
    pub unmapped_sessions: Vec<String>,
}

/// Startup pass: anything left non-terminal from a previous run with no
/// activity inside `stale_threshold` is terminated, then the session map is
/// reconciled.
pub fn registry_sweep(registry: &AgentRegistry, stale_threshold: Duration) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for agent in registry.list_agents()? {
        if !agent.status.is_terminal() && inactive_for(registry, &agent, stale_threshold) {
            registry.terminate_agent(&agent.id)?;
            report.terminated.push(agent.id);
        }
    }
    report.unmapped_sessions = validate_session_map(registry)?;
    Ok(report)
}
