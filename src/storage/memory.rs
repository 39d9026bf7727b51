use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::agents::Agent;
use crate::error::Result;
use crate::policy::{ApprovalQueueItem, Policy};

use super::{settle_created_before, settle_one, ApprovalDecision, Settled, Store};

/// In-process store. Records are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    agents: RwLock<Vec<Agent>>,
    policies: RwLock<Vec<Policy>>,
    approvals: RwLock<Vec<ApprovalQueueItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert<T: Clone>(records: &RwLock<Vec<T>>, record: &T, id_of: impl Fn(&T) -> &str) {
    let mut records = records.write().unwrap_or_else(|e| e.into_inner());
    let id = id_of(record).to_string();
    match records.iter().position(|r| id_of(r) == id) {
        Some(idx) => records[idx] = record.clone(),
        None => records.push(record.clone()),
    }
}

fn replace<T: Clone>(records: &RwLock<Vec<T>>, record: &T, id_of: impl Fn(&T) -> &str) -> bool {
    let mut records = records.write().unwrap_or_else(|e| e.into_inner());
    let id = id_of(record).to_string();
    match records.iter().position(|r| id_of(r) == id) {
        Some(idx) => {
            records[idx] = record.clone();
            true
        }
        None => false,
    }
}

fn find<T: Clone>(records: &RwLock<Vec<T>>, id: &str, id_of: impl Fn(&T) -> &str) -> Option<T> {
    let records = records.read().unwrap_or_else(|e| e.into_inner());
    records.iter().find(|r| id_of(*r) == id).cloned()
}

fn remove<T>(records: &RwLock<Vec<T>>, id: &str, id_of: impl Fn(&T) -> &str) -> bool {
    let mut records = records.write().unwrap_or_else(|e| e.into_inner());
    let before = records.len();
    records.retain(|r| id_of(r) != id);
    records.len() != before
}

fn all<T: Clone>(records: &RwLock<Vec<T>>) -> Vec<T> {
    records.read().unwrap_or_else(|e| e.into_inner()).clone()
}

impl Store for MemoryStore {
    fn insert_agent(&self, agent: &Agent) -> Result<()> {
        upsert(&self.agents, agent, |a| a.id.as_str());
        Ok(())
    }

    fn update_agent(&self, agent: &Agent) -> Result<bool> {
        Ok(replace(&self.agents, agent, |a| a.id.as_str()))
    }

    fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        Ok(find(&self.agents, id, |a| a.id.as_str()))
    }

    fn list_agents(&self) -> Result<Vec<Agent>> {
        Ok(all(&self.agents))
    }

    fn delete_agent(&self, id: &str) -> Result<bool> {
        Ok(remove(&self.agents, id, |a| a.id.as_str()))
    }

    fn insert_policy(&self, policy: &Policy) -> Result<()> {
        upsert(&self.policies, policy, |p| p.id.as_str());
        Ok(())
    }

    fn update_policy(&self, policy: &Policy) -> Result<bool> {
        Ok(replace(&self.policies, policy, |p| p.id.as_str()))
    }

    fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        Ok(find(&self.policies, id, |p| p.id.as_str()))
    }

    fn list_policies(&self) -> Result<Vec<Policy>> {
        Ok(all(&self.policies))
    }

    fn delete_policy(&self, id: &str) -> Result<bool> {
        Ok(remove(&self.policies, id, |p| p.id.as_str()))
    }

    fn insert_approval(&self, item: &ApprovalQueueItem) -> Result<()> {
        upsert(&self.approvals, item, |i| i.id.as_str());
        Ok(())
    }

    fn update_approval(&self, item: &ApprovalQueueItem) -> Result<bool> {
        Ok(replace(&self.approvals, item, |i| i.id.as_str()))
    }

    fn get_approval(&self, id: &str) -> Result<Option<ApprovalQueueItem>> {
        Ok(find(&self.approvals, id, |i| i.id.as_str()))
    }

    fn list_approvals(&self) -> Result<Vec<ApprovalQueueItem>> {
        Ok(all(&self.approvals))
    }

    fn decide_approval(&self, id: &str, decision: &ApprovalDecision) -> Result<Option<Settled>> {
        let mut records = self.approvals.write().unwrap_or_else(|e| e.into_inner());
        Ok(settle_one(records.as_mut_slice(), id, decision))
    }

    fn settle_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        decision: &ApprovalDecision,
    ) -> Result<Vec<ApprovalQueueItem>> {
        let mut records = self.approvals.write().unwrap_or_else(|e| e.into_inner());
        Ok(settle_created_before(records.as_mut_slice(), cutoff, decision))
    }
}
