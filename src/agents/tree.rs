use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::Result;

use super::{Agent, AgentRegistry};

/// An agent with its children, for rendering the session forest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNode {
    pub agent: Agent,
    pub children: Vec<AgentNode>,
}

/// Snapshot of the registry indexed for tree walks. Every walk tracks the ids
/// it has visited, so a cyclic `parent_id` chain terminates instead of looping.
struct AgentIndex {
    by_id: HashMap<String, Agent>,
    children: HashMap<String, Vec<String>>,
    /// Store order, used to keep sibling order deterministic.
    order: Vec<String>,
}

impl AgentIndex {
    fn build(agents: Vec<Agent>) -> Self {
        let mut by_id = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut order = Vec::with_capacity(agents.len());
        for agent in agents {
            if let Some(parent) = &agent.parent_id {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(agent.id.clone());
            }
            order.push(agent.id.clone());
            by_id.insert(agent.id.clone(), agent);
        }
        Self {
            by_id,
            children,
            order,
        }
    }

    fn children_of(&self, id: &str) -> Vec<Agent> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.by_id.get(c).cloned()).collect())
            .unwrap_or_default()
    }

    fn ancestors_of(&self, id: &str) -> Vec<Agent> {
        let mut out = Vec::new();
        let mut visited = HashSet::from([id.to_string()]);
        let mut cursor = self.by_id.get(id).and_then(|a| a.parent_id.clone());
        while let Some(parent_id) = cursor {
            if !visited.insert(parent_id.clone()) {
                tracing::warn!("cycle in agent parent chain at {}", parent_id);
                break;
            }
            let Some(parent) = self.by_id.get(&parent_id) else {
                break;
            };
            cursor = parent.parent_id.clone();
            out.push(parent.clone());
        }
        out
    }

    fn descendants_of(&self, id: &str) -> Vec<Agent> {
        let mut out = Vec::new();
        let mut visited = HashSet::from([id.to_string()]);
        let mut stack: Vec<String> = self.children.get(id).cloned().unwrap_or_default();
        stack.reverse();
        while let Some(next) = stack.pop() {
            if !visited.insert(next.clone()) {
                continue;
            }
            if let Some(agent) = self.by_id.get(&next) {
                out.push(agent.clone());
            }
            if let Some(grandchildren) = self.children.get(&next) {
                stack.extend(grandchildren.iter().rev().cloned());
            }
        }
        out
    }

    fn is_root(&self, agent: &Agent) -> bool {
        match &agent.parent_id {
            None => true,
            Some(parent) => !self.by_id.contains_key(parent),
        }
    }

    fn node(&self, id: &str, visited: &mut HashSet<String>) -> Option<AgentNode> {
        if !visited.insert(id.to_string()) {
            return None;
        }
        let agent = self.by_id.get(id)?.clone();
        let children = self
            .children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.node(c, visited)).collect())
            .unwrap_or_default();
        Some(AgentNode { agent, children })
    }

    fn forest(&self) -> Vec<AgentNode> {
        let mut visited = HashSet::new();
        self.order
            .iter()
            .filter(|id| self.by_id.get(*id).is_some_and(|a| self.is_root(a)))
            .filter_map(|id| self.node(id, &mut visited))
            .collect()
    }
}

impl AgentRegistry {
    fn index(&self) -> Result<AgentIndex> {
        Ok(AgentIndex::build(self.list_agents()?))
    }

    /// Direct children, in store order.
    pub fn children(&self, id: &str) -> Result<Vec<Agent>> {
        Ok(self.index()?.children_of(id))
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: &str) -> Result<Vec<Agent>> {
        Ok(self.index()?.ancestors_of(id))
    }

    /// All agents below `id`, depth first.
    pub fn descendants(&self, id: &str) -> Result<Vec<Agent>> {
        Ok(self.index()?.descendants_of(id))
    }

    /// Every tree in the registry. Roots are agents without a parent, plus
    /// agents whose parent record no longer exists.
    pub fn forest(&self) -> Result<Vec<AgentNode>> {
        Ok(self.index()?.forest())
    }
}
