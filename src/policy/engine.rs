use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{Result, StewardError};
use crate::notify::{NotificationBus, NotificationKind};
use crate::storage::{ApprovalDecision, Settled, Store};

use super::conditions::PolicyConditions;
use super::defaults::default_policies;
use super::matcher::Matcher;
use super::{
    ApprovalQueueItem, DecidedBy, NewPolicy, PermissionRequest, Policy, PolicyAction,
    PolicyUpdate, QueueStatus,
};

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Denied,
    Queued,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub verdict: Verdict,
    /// The governing policy, if any matched.
    pub policy_id: Option<String>,
    pub policy_name: Option<String>,
    /// Set when the request was queued and the item could be persisted.
    pub queue_item_id: Option<String>,
    pub reason: String,
}

#[derive(Serialize)]
struct PermissionOutcome<'a> {
    evaluation: &'a Evaluation,
    request: &'a PermissionRequest,
}

impl<'a> PermissionOutcome<'a> {
    fn new(evaluation: &'a Evaluation, request: &'a PermissionRequest) -> Self {
        Self {
            evaluation,
            request,
        }
    }
}

/// Evaluates permission requests against stored policies and owns the
/// approval queue.
pub struct PolicyEngine {
    store: Arc<dyn Store>,
    bus: NotificationBus,
    clock: Arc<dyn Clock>,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn Store>, bus: NotificationBus, clock: Arc<dyn Clock>) -> Self {
        Self { store, bus, clock }
    }

    /// Resolve a request: enabled policies by descending priority (stable on
    /// ties), first one whose matcher and conditions pass governs. No match
    /// queues the request.
    pub fn evaluate(&self, request: &PermissionRequest) -> Evaluation {
        let policies = match self.get_enabled_policies() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("policy lookup failed, queueing request: {}", e);
                return self.queue(request, None, "policy store unavailable".into());
            }
        };

        let hour = self.clock.local_hour();
        let governing = policies.into_iter().find(|policy| {
            Matcher::parse(&policy.matcher).matches(request)
                && PolicyConditions::from_value(policy.conditions.as_ref())
                    .map_or(true, |c| c.evaluate(request, hour))
        });

        let Some(policy) = governing else {
            return self.queue(request, None, "no policy matched; awaiting approval".into());
        };

        tracing::debug!(
            "policy '{}' ({}) governs {} for session {}",
            policy.name,
            policy.action,
            request.tool_name.as_deref().unwrap_or("-"),
            request.session_id
        );

        match policy.action {
            PolicyAction::AutoApprove => {
                let evaluation = Evaluation {
                    verdict: Verdict::Approved,
                    policy_id: Some(policy.id.clone()),
                    policy_name: Some(policy.name.clone()),
                    queue_item_id: None,
                    reason: format!("auto-approved by policy '{}'", policy.name),
                };
                self.bus.emit(
                    NotificationKind::PermissionApproved,
                    &PermissionOutcome::new(&evaluation, request),
                );
                evaluation
            }
            PolicyAction::AutoDeny => {
                let evaluation = Evaluation {
                    verdict: Verdict::Denied,
                    policy_id: Some(policy.id.clone()),
                    policy_name: Some(policy.name.clone()),
                    queue_item_id: None,
                    reason: format!("denied by policy '{}'", policy.name),
                };
                self.bus.emit(
                    NotificationKind::PermissionDenied,
                    &PermissionOutcome::new(&evaluation, request),
                );
                evaluation
            }
            PolicyAction::Queue => {
                let reason = format!("queued for approval by policy '{}'", policy.name);
                self.queue(request, Some(&policy), reason)
            }
        }
    }

    fn queue(&self, request: &PermissionRequest, policy: Option<&Policy>, reason: String) -> Evaluation {
        let details = serde_json::to_string(request).unwrap_or_default();
        let item = ApprovalQueueItem {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: request.session_id.clone(),
            request_type: request.request_type.clone(),
            request_details: details,
            status: QueueStatus::Pending,
            decided_by: None,
            policy_id: policy.map(|p| p.id.clone()),
            created_at: self.clock.now(),
            decided_at: None,
        };

        let queue_item_id = match self.store.insert_approval(&item) {
            Ok(()) => Some(item.id.clone()),
            Err(e) => {
                tracing::warn!("failed to persist approval item: {}", e);
                None
            }
        };

        let evaluation = Evaluation {
            verdict: Verdict::Queued,
            policy_id: policy.map(|p| p.id.clone()),
            policy_name: policy.map(|p| p.name.clone()),
            queue_item_id,
            reason,
        };
        self.bus.emit(NotificationKind::PermissionQueued, &item);
        evaluation
    }

    // ------------------------------------------------------------------
    // Approval queue
    // ------------------------------------------------------------------

    pub fn approve_item(&self, id: &str, by_user: bool) -> Result<Option<ApprovalQueueItem>> {
        let item = self.decide(id, QueueStatus::Approved, by_user)?;
        if let Some(item) = &item {
            self.bus.emit(NotificationKind::QueueApproved, item);
            self.bus.emit(NotificationKind::UiQueueChanged, item);
        }
        Ok(item)
    }

    pub fn deny_item(&self, id: &str, by_user: bool) -> Result<Option<ApprovalQueueItem>> {
        let item = self.decide(id, QueueStatus::Denied, by_user)?;
        if let Some(item) = &item {
            self.bus.emit(NotificationKind::QueueDenied, item);
            self.bus.emit(NotificationKind::UiQueueChanged, item);
        }
        Ok(item)
    }

    /// Approve several items as the user. Unknown or already-decided ids are
    /// skipped with a warning.
    pub fn batch_approve(&self, ids: &[String]) -> Result<Vec<ApprovalQueueItem>> {
        let decided = self.decide_batch(ids, QueueStatus::Approved)?;
        self.bus.emit(NotificationKind::QueueBatchApproved, &decided);
        self.bus.emit(NotificationKind::UiQueueChanged, &decided);
        Ok(decided)
    }

    pub fn batch_deny(&self, ids: &[String]) -> Result<Vec<ApprovalQueueItem>> {
        let decided = self.decide_batch(ids, QueueStatus::Denied)?;
        self.bus.emit(NotificationKind::QueueBatchDenied, &decided);
        self.bus.emit(NotificationKind::UiQueueChanged, &decided);
        Ok(decided)
    }

    fn decide_batch(&self, ids: &[String], status: QueueStatus) -> Result<Vec<ApprovalQueueItem>> {
        let mut decided = Vec::with_capacity(ids.len());
        for id in ids {
            match self.decide(id, status, true) {
                Ok(Some(item)) => decided.push(item),
                Ok(None) => {}
                Err(StewardError::ApprovalAlreadyDecided { item_id, status }) => {
                    tracing::warn!("skipping approval item {}: already {}", item_id, status);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(decided)
    }

    fn decide(&self, id: &str, status: QueueStatus, by_user: bool) -> Result<Option<ApprovalQueueItem>> {
        let decision = ApprovalDecision {
            status,
            decided_by: Some(if by_user {
                DecidedBy::User
            } else {
                DecidedBy::Policy
            }),
            at: self.clock.now(),
        };
        match self.store.decide_approval(id, &decision)? {
            Some(Settled::Decided(item)) => Ok(Some(item)),
            Some(Settled::AlreadyDecided(item)) => Err(StewardError::ApprovalAlreadyDecided {
                item_id: id.to_string(),
                status: item.status.to_string(),
            }),
            None => {
                tracing::warn!("approval item not found: {}", id);
                Ok(None)
            }
        }
    }

    pub fn get_pending_approvals(&self, session_id: Option<&str>) -> Result<Vec<ApprovalQueueItem>> {
        Ok(self
            .store
            .list_approvals()?
            .into_iter()
            .filter(|i| i.status == QueueStatus::Pending)
            .filter(|i| session_id.map_or(true, |s| i.session_id == s))
            .collect())
    }

    pub fn get_approval(&self, id: &str) -> Result<Option<ApprovalQueueItem>> {
        self.store.get_approval(id)
    }

    /// Mark items pending for longer than `older_than` as expired.
    pub fn expire_pending(&self, older_than: Duration) -> Result<Vec<ApprovalQueueItem>> {
        let now = self.clock.now();
        let cutoff = now.checked_sub_signed(older_than).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let decision = ApprovalDecision {
            status: QueueStatus::Expired,
            decided_by: None,
            at: now,
        };
        let expired = self.store.settle_pending_before(cutoff, &decision)?;
        for item in &expired {
            self.bus.emit(NotificationKind::QueueExpired, item);
        }
        if !expired.is_empty() {
            self.bus.emit(NotificationKind::UiQueueChanged, &expired);
        }
        Ok(expired)
    }

    // ------------------------------------------------------------------
    // Policy CRUD
    // ------------------------------------------------------------------

    pub fn create_policy(&self, new: NewPolicy) -> Result<Policy> {
        validate(&new.name, &new.matcher)?;
        let now = self.clock.now();
        let policy = Policy {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            matcher: new.matcher,
            action: new.action,
            priority: new.priority,
            conditions: new.conditions,
            enabled: new.enabled,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_policy(&policy)?;
        tracing::info!("created policy '{}' ({})", policy.name, policy.id);
        self.bus.emit(NotificationKind::PolicyCreated, &policy);
        Ok(policy)
    }

    /// Merge `update` into an existing policy. An unknown id is a caller bug
    /// and surfaces as `PolicyNotFound`.
    pub fn update_policy(&self, id: &str, update: PolicyUpdate) -> Result<Policy> {
        let mut policy = self
            .store
            .get_policy(id)?
            .ok_or_else(|| StewardError::PolicyNotFound {
                policy_id: id.to_string(),
            })?;

        if let Some(name) = update.name {
            policy.name = name;
        }
        if let Some(matcher) = update.matcher {
            policy.matcher = matcher;
        }
        if let Some(action) = update.action {
            policy.action = action;
        }
        if let Some(priority) = update.priority {
            policy.priority = priority;
        }
        if let Some(conditions) = update.conditions {
            policy.conditions = conditions;
        }
        if let Some(enabled) = update.enabled {
            policy.enabled = enabled;
        }
        validate(&policy.name, &policy.matcher)?;
        policy.updated_at = self.clock.now();

        if !self.store.update_policy(&policy)? {
            return Err(StewardError::PolicyNotFound {
                policy_id: id.to_string(),
            });
        }
        self.bus.emit(NotificationKind::PolicyUpdated, &policy);
        Ok(policy)
    }

    pub fn delete_policy(&self, id: &str) -> Result<()> {
        if !self.store.delete_policy(id)? {
            return Err(StewardError::PolicyNotFound {
                policy_id: id.to_string(),
            });
        }
        tracing::info!("deleted policy {}", id);
        self.bus
            .emit(NotificationKind::PolicyDeleted, &serde_json::json!({ "id": id }));
        Ok(())
    }

    pub fn get_all_policies(&self) -> Result<Vec<Policy>> {
        self.store.list_policies()
    }

    /// Enabled policies, highest priority first; ties keep store order.
    pub fn get_enabled_policies(&self) -> Result<Vec<Policy>> {
        let mut policies: Vec<Policy> = self
            .store
            .list_policies()?
            .into_iter()
            .filter(|p| p.enabled)
            .collect();
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(policies)
    }

    /// Insert the built-in policies whose names are not already taken.
    /// Returns how many were inserted.
    pub fn install_default_policies(&self) -> Result<usize> {
        let existing: Vec<String> = self
            .store
            .list_policies()?
            .into_iter()
            .map(|p| p.name)
            .collect();

        let mut installed = 0;
        for policy in default_policies() {
            if existing.contains(&policy.name) {
                continue;
            }
            self.create_policy(policy)?;
            installed += 1;
        }
        if installed > 0 {
            tracing::info!("installed {} default policies", installed);
        }
        Ok(installed)
    }
}

fn validate(name: &str, matcher: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StewardError::InvalidPolicy {
            reason: "policy name must not be empty".into(),
        });
    }
    if matcher.trim().is_empty() {
        return Err(StewardError::InvalidPolicy {
            reason: format!("policy '{name}' has an empty matcher"),
        });
    }
    Ok(())
}
