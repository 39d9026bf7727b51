pub mod inference;

pub use inference::{ParentResolution, ParentStrategy, SubagentSignal};

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

const MAX_DIAGNOSTICS: usize = 100;

/// Record of a sub-agent whose parent could not be inferred.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyDiagnostic {
    pub subagent_id: String,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub parent_hint: Option<String>,
    pub stack_top: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Per-working-directory stacks of sessions that have a delegation in flight.
///
/// The delegate tool call and the resulting sub-agent start event arrive
/// independently; the stack top is the best guess for the spawning session.
#[derive(Default)]
pub struct SessionHierarchyTracker {
    stacks: DashMap<String, Vec<String>>,
    diagnostics: RwLock<VecDeque<HierarchyDiagnostic>>,
}

impl SessionHierarchyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, cwd: &str, session_id: &str) {
        self.stacks
            .entry(cwd.to_string())
            .or_default()
            .push(session_id.to_string());
        tracing::debug!("delegation pending: session {} in {}", session_id, cwd);
    }

    pub fn pop(&self, cwd: &str) -> Option<String> {
        let popped = self.stacks.get_mut(cwd).and_then(|mut stack| stack.pop());
        self.stacks.remove_if(cwd, |_, stack| stack.is_empty());
        popped
    }

    /// Remove the topmost entry for `session_id` in `cwd`, wherever it sits.
    /// Completions may arrive out of order when one session delegates twice.
    pub fn pop_session(&self, cwd: &str, session_id: &str) -> bool {
        let removed = match self.stacks.get_mut(cwd) {
            Some(mut stack) => match stack.iter().rposition(|s| s == session_id) {
                Some(idx) => {
                    stack.remove(idx);
                    true
                }
                None => false,
            },
            None => false,
        };
        self.stacks.remove_if(cwd, |_, stack| stack.is_empty());
        removed
    }

    pub fn peek(&self, cwd: &str) -> Option<String> {
        self.stacks.get(cwd).and_then(|stack| stack.last().cloned())
    }

    pub fn depth(&self, cwd: &str) -> usize {
        self.stacks.get(cwd).map(|stack| stack.len()).unwrap_or(0)
    }

    /// Drop a session from every stack, e.g. when the session ends.
    pub fn clear_session(&self, session_id: &str) {
        for mut stack in self.stacks.iter_mut() {
            stack.retain(|s| s != session_id);
        }
        self.stacks.retain(|_, stack| !stack.is_empty());
    }

    pub fn record_diagnostic(&self, diagnostic: HierarchyDiagnostic) {
        tracing::warn!(
            "no parent found for sub-agent {}: {}",
            diagnostic.subagent_id,
            diagnostic.message
        );
        let mut diagnostics = self.diagnostics.write().unwrap_or_else(|e| e.into_inner());
        if diagnostics.len() == MAX_DIAGNOSTICS {
            diagnostics.pop_front();
        }
        diagnostics.push_back(diagnostic);
    }

    /// Recent parent-inference failures, oldest first.
    pub fn diagnostics(&self) -> Vec<HierarchyDiagnostic> {
        self.diagnostics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
