//! Fire-and-forget notifications for the UI layer.
//!
//! Publishing never blocks and never fails from the caller's point of view:
//! with no subscribers the notification is simply dropped, and slow
//! subscribers lag instead of applying back-pressure to event handling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};

const DEFAULT_CAPACITY: usize = 1024;

/// Every notification the core publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "session:start")]
    SessionStart,
    #[serde(rename = "session:end")]
    SessionEnd,
    #[serde(rename = "agent:start")]
    AgentStart,
    #[serde(rename = "agent:stop")]
    AgentStop,
    #[serde(rename = "tool:used")]
    ToolUsed,
    #[serde(rename = "permission:requested")]
    PermissionRequested,
    #[serde(rename = "permission:approved")]
    PermissionApproved,
    #[serde(rename = "permission:denied")]
    PermissionDenied,
    #[serde(rename = "permission:queued")]
    PermissionQueued,
    #[serde(rename = "queue:approved")]
    QueueApproved,
    #[serde(rename = "queue:denied")]
    QueueDenied,
    #[serde(rename = "queue:batch-approved")]
    QueueBatchApproved,
    #[serde(rename = "queue:batch-denied")]
    QueueBatchDenied,
    #[serde(rename = "queue:expired")]
    QueueExpired,
    #[serde(rename = "ui:queue-changed")]
    UiQueueChanged,
    #[serde(rename = "policy:created")]
    PolicyCreated,
    #[serde(rename = "policy:updated")]
    PolicyUpdated,
    #[serde(rename = "policy:deleted")]
    PolicyDeleted,
    #[serde(rename = "agent:spawned")]
    AgentSpawned,
    #[serde(rename = "agent:ready")]
    AgentReady,
    #[serde(rename = "agent:active")]
    AgentActive,
    #[serde(rename = "agent:idle")]
    AgentIdle,
    #[serde(rename = "agent:completed")]
    AgentCompleted,
    #[serde(rename = "agent:error")]
    AgentError,
    #[serde(rename = "agent:terminated")]
    AgentTerminated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SessionStart => "session:start",
            NotificationKind::SessionEnd => "session:end",
            NotificationKind::AgentStart => "agent:start",
            NotificationKind::AgentStop => "agent:stop",
            NotificationKind::ToolUsed => "tool:used",
            NotificationKind::PermissionRequested => "permission:requested",
            NotificationKind::PermissionApproved => "permission:approved",
            NotificationKind::PermissionDenied => "permission:denied",
            NotificationKind::PermissionQueued => "permission:queued",
            NotificationKind::QueueApproved => "queue:approved",
            NotificationKind::QueueDenied => "queue:denied",
            NotificationKind::QueueBatchApproved => "queue:batch-approved",
            NotificationKind::QueueBatchDenied => "queue:batch-denied",
            NotificationKind::QueueExpired => "queue:expired",
            NotificationKind::UiQueueChanged => "ui:queue-changed",
            NotificationKind::PolicyCreated => "policy:created",
            NotificationKind::PolicyUpdated => "policy:updated",
            NotificationKind::PolicyDeleted => "policy:deleted",
            NotificationKind::AgentSpawned => "agent:spawned",
            NotificationKind::AgentReady => "agent:ready",
            NotificationKind::AgentActive => "agent:active",
            NotificationKind::AgentIdle => "agent:idle",
            NotificationKind::AgentCompleted => "agent:completed",
            NotificationKind::AgentError => "agent:error",
            NotificationKind::AgentTerminated => "agent:terminated",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Broadcast channel shared by every component that publishes notifications.
/// Notifications are stamped with the bus clock.
#[derive(Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
    clock: Arc<dyn Clock>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish a notification. Returns the number of subscribers reached.
    pub fn emit<T: Serialize>(&self, kind: NotificationKind, payload: &T) -> usize {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("dropping {} notification: {}", kind, e);
                return 0;
            }
        };
        let notification = Notification {
            kind,
            payload,
            at: self.clock.now(),
        };
        self.sender.send(notification).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
