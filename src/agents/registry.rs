use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::Clock;
use crate::error::Result;
use crate::notify::{NotificationBus, NotificationKind};
use crate::storage::Store;

use super::{Agent, AgentStatus, SpawnOptions};

/// Owns agent lifecycle state and the session-to-agent cache.
///
/// All writes to `status` and `last_activity` go through this type. Operations
/// on an unknown agent id are logged and return `Ok(None)`.
pub struct AgentRegistry {
    store: Arc<dyn Store>,
    bus: NotificationBus,
    clock: Arc<dyn Clock>,
    /// session id -> agent id. Advisory; the store wins on divergence.
    sessions: DashMap<String, String>,
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn Store>, bus: NotificationBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            bus,
            clock,
            sessions: DashMap::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Create an agent in `spawning` with no pid.
    pub fn spawn(&self, options: SpawnOptions) -> Result<Agent> {
        let now = self.clock.now();
        let id = options
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let agent = Agent {
            session_path: options.session_path.unwrap_or_else(|| id.clone()),
            id,
            name: options.name,
            cwd: options.cwd,
            pid: None,
            parent_id: options.parent_id,
            template_id: options.template_id,
            status: AgentStatus::Spawning,
            last_activity: now,
            initial_prompt: options.initial_prompt,
            exit_code: None,
            error_message: None,
            created_at: now,
        };
        self.store.insert_agent(&agent)?;
        tracing::info!(
            "spawned agent {} ({}) parent={}",
            agent.id,
            agent.name,
            agent.parent_id.as_deref().unwrap_or("-")
        );
        self.bus.emit(NotificationKind::AgentSpawned, &agent);
        Ok(agent)
    }

    /// Attach the process id once the external process layer knows it.
    pub fn set_pid(&self, id: &str, pid: u32) -> Result<Option<Agent>> {
        self.modify(id, |agent| agent.pid = Some(pid))
    }

    pub fn mark_ready(&self, id: &str) -> Result<Option<Agent>> {
        let now = self.clock.now();
        let agent = self.modify(id, |agent| {
            agent.status = AgentStatus::Ready;
            agent.last_activity = now;
        })?;
        if let Some(agent) = &agent {
            self.bus.emit(NotificationKind::AgentReady, agent);
        }
        Ok(agent)
    }

    /// Enter `active`. An agent that is already active only has its activity
    /// stamp refreshed, and no notification is published.
    pub fn mark_active(&self, id: &str) -> Result<Option<Agent>> {
        let Some(mut agent) = self.lookup(id)? else {
            return Ok(None);
        };
        let was_active = agent.status == AgentStatus::Active;
        agent.status = AgentStatus::Active;
        agent.last_activity = self.clock.now();
        self.store.update_agent(&agent)?;
        if !was_active {
            tracing::debug!("agent {} became active", id);
            self.bus.emit(NotificationKind::AgentActive, &agent);
        }
        Ok(Some(agent))
    }

    pub fn mark_idle(&self, id: &str) -> Result<Option<Agent>> {
        let agent = self.transition(id, AgentStatus::Idle)?;
        if let Some(agent) = &agent {
            self.bus.emit(NotificationKind::AgentIdle, agent);
        }
        Ok(agent)
    }

    /// Exit code 0 completes the agent; anything else is an error.
    pub fn complete(&self, id: &str, exit_code: i32) -> Result<Option<Agent>> {
        let status = if exit_code == 0 {
            AgentStatus::Completed
        } else {
            AgentStatus::Error
        };
        let agent = self.modify(id, |agent| {
            agent.status = status;
            agent.exit_code = Some(exit_code);
        })?;
        if let Some(agent) = &agent {
            let kind = if exit_code == 0 {
                NotificationKind::AgentCompleted
            } else {
                NotificationKind::AgentError
            };
            tracing::info!("agent {} finished with exit code {}", id, exit_code);
            self.bus.emit(kind, agent);
        }
        Ok(agent)
    }

    pub fn error(&self, id: &str, message: &str) -> Result<Option<Agent>> {
        let agent = self.modify(id, |agent| {
            agent.status = AgentStatus::Error;
            agent.error_message = Some(message.to_string());
        })?;
        if let Some(agent) = &agent {
            tracing::warn!("agent {} failed: {}", id, message);
            self.bus.emit(NotificationKind::AgentError, agent);
        }
        Ok(agent)
    }

    /// Move to `terminated` and drop every session mapped to this agent.
    pub fn terminate_agent(&self, id: &str) -> Result<Option<Agent>> {
        let agent = self.transition(id, AgentStatus::Terminated)?;
        let purged = self.purge_sessions_for(id);
        if purged > 0 {
            tracing::debug!("purged {} session mapping(s) for agent {}", purged, id);
        }
        if let Some(agent) = &agent {
            tracing::info!("terminated agent {}", id);
            self.bus.emit(NotificationKind::AgentTerminated, agent);
        }
        Ok(agent)
    }

    /// Record the first prompt an agent received. Later prompts are ignored.
    pub fn record_initial_prompt(&self, id: &str, prompt: &str) -> Result<Option<Agent>> {
        self.modify(id, |agent| {
            if agent.initial_prompt.is_none() {
                agent.initial_prompt = Some(prompt.to_string());
            }
        })
    }

    /// Remove an agent record entirely, with its session mappings.
    pub fn remove_agent(&self, id: &str) -> Result<bool> {
        self.purge_sessions_for(id);
        self.store.delete_agent(id)
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        self.store.get_agent(id)
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        self.store.list_agents()
    }

    pub fn agents_with_status(&self, status: AgentStatus) -> Result<Vec<Agent>> {
        Ok(self
            .store
            .list_agents()?
            .into_iter()
            .filter(|a| a.status == status)
            .collect())
    }

    // ------------------------------------------------------------------
    // Session map
    // ------------------------------------------------------------------

    pub fn map_session(&self, session_id: &str, agent_id: &str) {
        self.sessions
            .insert(session_id.to_string(), agent_id.to_string());
    }

    pub fn unmap_session(&self, session_id: &str) -> Option<String> {
        self.sessions.remove(session_id).map(|(_, agent_id)| agent_id)
    }

    pub fn agent_for_session(&self, session_id: &str) -> Option<String> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Copy of the current map, sorted by session id.
    pub fn session_map_snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort();
        entries
    }

    fn purge_sessions_for(&self, agent_id: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, mapped| mapped.as_str() != agent_id);
        before - self.sessions.len()
    }

    /// Resolve a session id or agent id to a known agent id: the session map
    /// first, then the id itself as an agent.
    pub fn resolve_known_agent(&self, id: &str) -> Result<Option<String>> {
        if let Some(agent_id) = self.agent_for_session(id) {
            if self.store.get_agent(&agent_id)?.is_some() {
                return Ok(Some(agent_id));
            }
        }
        Ok(self.store.get_agent(id)?.map(|a| a.id))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lookup(&self, id: &str) -> Result<Option<Agent>> {
        let agent = self.store.get_agent(id)?;
        if agent.is_none() {
            tracing::warn!("agent not found: {}", id);
        }
        Ok(agent)
    }

    /// Status change only; `last_activity` keeps measuring real activity so
    /// idle and stale thresholds stay anchored to it.
    fn transition(&self, id: &str, status: AgentStatus) -> Result<Option<Agent>> {
        self.modify(id, |agent| agent.status = status)
    }

    fn modify<F>(&self, id: &str, f: F) -> Result<Option<Agent>>
    where
        F: FnOnce(&mut Agent),
    {
        let Some(mut agent) = self.lookup(id)? else {
            return Ok(None);
        };
        f(&mut agent);
        self.store.update_agent(&agent)?;
        Ok(Some(agent))
    }
}
