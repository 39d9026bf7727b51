pub mod registry;
pub mod tree;

pub use registry::AgentRegistry;
pub use tree::AgentNode;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of an agent.
///
/// `spawning -> ready -> active <-> idle -> {completed | error | terminated}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Spawning,
    Ready,
    Active,
    Idle,
    Completed,
    Error,
    Terminated,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Error | AgentStatus::Terminated
        )
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Spawning => "spawning",
            AgentStatus::Ready => "ready",
            AgentStatus::Active => "active",
            AgentStatus::Idle => "idle",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
            AgentStatus::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spawning" => Ok(AgentStatus::Spawning),
            "ready" => Ok(AgentStatus::Ready),
            "active" => Ok(AgentStatus::Active),
            "idle" => Ok(AgentStatus::Idle),
            "completed" => Ok(AgentStatus::Completed),
            "error" => Ok(AgentStatus::Error),
            "terminated" => Ok(AgentStatus::Terminated),
            _ => Err(format!("unknown agent status: {s}")),
        }
    }
}

/// A root session or sub-agent tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Stable for the lifetime of the entity.
    pub id: String,
    pub name: String,
    pub cwd: String,
    pub pid: Option<u32>,
    pub parent_id: Option<String>,
    pub template_id: Option<String>,
    pub status: AgentStatus,
    pub session_path: String,
    pub last_activity: DateTime<Utc>,
    pub initial_prompt: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input to `AgentRegistry::spawn`.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Caller-chosen id; a fresh UUID is generated when absent.
    pub id: Option<String>,
    pub name: String,
    pub cwd: String,
    pub parent_id: Option<String>,
    pub template_id: Option<String>,
    pub session_path: Option<String>,
    pub initial_prompt: Option<String>,
}
