pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::agents::Agent;
use crate::error::Result;
use crate::policy::{ApprovalQueueItem, DecidedBy, Policy, QueueStatus};

/// Terminal status to put on an approval item that is still pending.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalDecision {
    pub status: QueueStatus,
    pub decided_by: Option<DecidedBy>,
    pub at: DateTime<Utc>,
}

impl ApprovalDecision {
    /// Settle `item` if it is still pending. Returns whether it changed.
    pub fn apply(&self, item: &mut ApprovalQueueItem) -> bool {
        if item.status != QueueStatus::Pending {
            return false;
        }
        item.status = self.status;
        item.decided_by = self.decided_by;
        item.decided_at = Some(self.at);
        true
    }
}

/// What a conditional decision found.
#[derive(Debug, Clone)]
pub enum Settled {
    Decided(ApprovalQueueItem),
    /// The item had already left `pending`; carries it as stored.
    AlreadyDecided(ApprovalQueueItem),
}

pub(crate) fn settle_one(
    records: &mut [ApprovalQueueItem],
    id: &str,
    decision: &ApprovalDecision,
) -> Option<Settled> {
    let item = records.iter_mut().find(|i| i.id == id)?;
    Some(if decision.apply(item) {
        Settled::Decided(item.clone())
    } else {
        Settled::AlreadyDecided(item.clone())
    })
}

pub(crate) fn settle_created_before(
    records: &mut [ApprovalQueueItem],
    cutoff: DateTime<Utc>,
    decision: &ApprovalDecision,
) -> Vec<ApprovalQueueItem> {
    records
        .iter_mut()
        .filter(|i| i.created_at <= cutoff)
        .filter_map(|i| decision.apply(i).then(|| i.clone()))
        .collect()
}

/// Authoritative persistence for the three record types the core owns.
///
/// Every method is a single-record operation, apart from the approval
/// check-and-set pair, which touches only approval items; there are no
/// cross-entity transactions. `list_policies` returns records in insertion order, which
/// policy resolution relies on for tie-breaking.
pub trait Store: Send + Sync {
    fn insert_agent(&self, agent: &Agent) -> Result<()>;

    /// Overwrite an existing agent. Returns false if it does not exist.
    fn update_agent(&self, agent: &Agent) -> Result<bool>;

    fn get_agent(&self, id: &str) -> Result<Option<Agent>>;

    fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Returns false if nothing was deleted.
    fn delete_agent(&self, id: &str) -> Result<bool>;

    fn insert_policy(&self, policy: &Policy) -> Result<()>;

    fn update_policy(&self, policy: &Policy) -> Result<bool>;

    fn get_policy(&self, id: &str) -> Result<Option<Policy>>;

    fn list_policies(&self) -> Result<Vec<Policy>>;

    fn delete_policy(&self, id: &str) -> Result<bool>;

    fn insert_approval(&self, item: &ApprovalQueueItem) -> Result<()>;

    fn update_approval(&self, item: &ApprovalQueueItem) -> Result<bool>;

    fn get_approval(&self, id: &str) -> Result<Option<ApprovalQueueItem>>;

    /// Check-and-set on one item: `decision` lands only if the item is still
    /// pending, and the check and the write happen under one lock. `None` when
    /// the id is unknown.
    fn decide_approval(&self, id: &str, decision: &ApprovalDecision) -> Result<Option<Settled>>;

    /// Apply `decision` to every pending item created at or before `cutoff`,
    /// under one lock. Returns the items that changed.
    fn settle_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        decision: &ApprovalDecision,
    ) -> Result<Vec<ApprovalQueueItem>>;

    fn list_approvals(&self) -> Result<Vec<ApprovalQueueItem>>;
}
