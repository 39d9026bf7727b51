pub mod conditions;
pub mod defaults;
pub mod engine;
pub mod matcher;

pub use conditions::{PolicyConditions, TimeWindow};
pub use engine::{Evaluation, PolicyEngine, Verdict};
pub use matcher::Matcher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a matching policy does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyAction {
    AutoApprove,
    AutoDeny,
    Queue,
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyAction::AutoApprove => write!(f, "auto-approve"),
            PolicyAction::AutoDeny => write!(f, "auto-deny"),
            PolicyAction::Queue => write!(f, "queue"),
        }
    }
}

impl std::str::FromStr for PolicyAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto-approve" | "approve" | "allow" => Ok(PolicyAction::AutoApprove),
            "auto-deny" | "deny" => Ok(PolicyAction::AutoDeny),
            "queue" | "ask" => Ok(PolicyAction::Queue),
            _ => Err(format!("unknown policy action: {s}")),
        }
    }
}

/// A stored permission policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub name: String,
    /// Pattern string, see [`Matcher`].
    pub matcher: String,
    pub action: PolicyAction,
    pub priority: i64,
    /// Opaque structured predicate, interpreted by [`PolicyConditions`].
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `PolicyEngine::create_policy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicy {
    pub name: String,
    pub matcher: String,
    pub action: PolicyAction,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NewPolicy {
    pub fn new(name: &str, matcher: &str, action: PolicyAction, priority: i64) -> Self {
        Self {
            name: name.to_string(),
            matcher: matcher.to_string(),
            action,
            priority,
            conditions: None,
            enabled: true,
        }
    }

    pub fn with_conditions(mut self, conditions: serde_json::Value) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Partial update for `PolicyEngine::update_policy`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub matcher: Option<String>,
    pub action: Option<PolicyAction>,
    pub priority: Option<i64>,
    /// `Some(None)` clears the conditions.
    pub conditions: Option<Option<serde_json::Value>>,
    pub enabled: Option<bool>,
}

/// The subject of a policy evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub session_id: String,
    /// Event or request kind, e.g. `PreToolUse` or `PermissionRequest`.
    pub request_type: String,
    pub tool_name: Option<String>,
    pub file_path: Option<String>,
    pub command: Option<String>,
    pub permission_type: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl PermissionRequest {
    pub fn for_tool(session_id: &str, tool_name: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            request_type: "PreToolUse".to_string(),
            tool_name: Some(tool_name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_file_path(mut self, path: &str) -> Self {
        self.file_path = Some(path.to_string());
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }
}

/// Status of an approval queue item. Only `Pending` is non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Approved => write!(f, "approved"),
            QueueStatus::Denied => write!(f, "denied"),
            QueueStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecidedBy {
    User,
    Policy,
}

/// A request waiting for (or having received) a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQueueItem {
    pub id: String,
    pub session_id: String,
    pub request_type: String,
    /// Serialized request context.
    pub request_details: String,
    pub status: QueueStatus,
    pub decided_by: Option<DecidedBy>,
    pub policy_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
