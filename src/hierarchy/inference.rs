use serde::Serialize;

use crate::agents::AgentRegistry;
use crate::error::Result;

use super::{HierarchyDiagnostic, SessionHierarchyTracker};

/// The parts of a sub-agent start event that parent inference looks at.
#[derive(Debug, Clone, Default)]
pub struct SubagentSignal {
    pub subagent_id: String,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub parent_hint: Option<String>,
}

/// Which lookup produced the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentStrategy {
    ExplicitHint,
    HierarchyStack,
    EventSession,
    IdPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentResolution {
    pub parent_id: Option<String>,
    pub strategy: Option<ParentStrategy>,
}

impl ParentResolution {
    fn found(parent_id: String, strategy: ParentStrategy) -> Self {
        Self {
            parent_id: Some(parent_id),
            strategy: Some(strategy),
        }
    }

    fn orphan() -> Self {
        Self {
            parent_id: None,
            strategy: None,
        }
    }
}

impl SessionHierarchyTracker {
    /// Infer the parent agent of a sub-agent. Lookups are tried in order and
    /// the first that names a known agent wins:
    ///
    /// 1. the explicit parent-session hint,
    /// 2. the top of the working directory's delegation stack,
    /// 3. the event's own session id,
    /// 4. the prefix of the sub-agent id before its first separator.
    ///
    /// When nothing resolves the sub-agent is an orphan and a diagnostic is
    /// recorded.
    pub fn resolve_parent(
        &self,
        registry: &AgentRegistry,
        signal: &SubagentSignal,
    ) -> Result<ParentResolution> {
        if let Some(hint) = signal.parent_hint.as_deref() {
            if let Some(parent) = self.known(registry, hint, &signal.subagent_id)? {
                return Ok(ParentResolution::found(parent, ParentStrategy::ExplicitHint));
            }
        }

        let stack_top = signal.cwd.as_deref().and_then(|cwd| self.peek(cwd));
        if let Some(top) = stack_top.as_deref() {
            if let Some(parent) = self.known(registry, top, &signal.subagent_id)? {
                return Ok(ParentResolution::found(parent, ParentStrategy::HierarchyStack));
            }
        }

        if let Some(session) = signal.session_id.as_deref() {
            if let Some(parent) = self.known(registry, session, &signal.subagent_id)? {
                return Ok(ParentResolution::found(parent, ParentStrategy::EventSession));
            }
        }

        // Last resort only; the id format is not a contract.
        if let Some(prefix) = id_prefix(&signal.subagent_id) {
            if let Some(parent) = self.known(registry, prefix, &signal.subagent_id)? {
                return Ok(ParentResolution::found(parent, ParentStrategy::IdPrefix));
            }
        }

        self.record_diagnostic(HierarchyDiagnostic {
            subagent_id: signal.subagent_id.clone(),
            session_id: signal.session_id.clone(),
            cwd: signal.cwd.clone(),
            parent_hint: signal.parent_hint.clone(),
            stack_top,
            message: "no hint, stack entry, session or id prefix resolved to a known agent"
                .into(),
            at: registry.clock().now(),
        });
        Ok(ParentResolution::orphan())
    }

    fn known(&self, registry: &AgentRegistry, id: &str, subagent_id: &str) -> Result<Option<String>> {
        let resolved = registry.resolve_known_agent(id)?;
        Ok(resolved.filter(|parent| parent != subagent_id))
    }
}

/// Text before the first `-`, `_` or `:`; `None` when there is no separator
/// or the prefix is empty.
fn id_prefix(id: &str) -> Option<&str> {
    let (prefix, _) = id.split_once(['-', '_', ':'])?;
    (!prefix.is_empty()).then_some(prefix)
}
