use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response shape family. Decided purely by the event-type name; anything
/// unknown is Stop-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCategory {
    PreToolUse,
    UserPromptSubmit,
    PostToolUse,
    StopLike,
}

impl HookCategory {
    pub fn of(event_type: &str) -> Self {
        match event_type {
            "PreToolUse" => HookCategory::PreToolUse,
            "UserPromptSubmit" => HookCategory::UserPromptSubmit,
            "PostToolUse" => HookCategory::PostToolUse,
            _ => HookCategory::StopLike,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
    Ask,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseResponse {
    pub permission_decision: PermissionDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptSubmitResponse {
    pub additional_context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostToolUseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLikeResponse {
    #[serde(rename = "continue")]
    pub should_continue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

/// What goes back to the host for one hook event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HookResponse {
    PreToolUse(PreToolUseResponse),
    UserPromptSubmit(UserPromptSubmitResponse),
    PostToolUse(PostToolUseResponse),
    StopLike(StopLikeResponse),
}

impl HookResponse {
    /// The fail-open answer for a category: allow, empty context, or continue.
    pub fn default_for(category: HookCategory) -> Self {
        match category {
            HookCategory::PreToolUse => Self::allow(None),
            HookCategory::UserPromptSubmit => Self::context(""),
            HookCategory::PostToolUse => Self::PostToolUse(PostToolUseResponse::default()),
            HookCategory::StopLike => Self::proceed(),
        }
    }

    /// Fail-open answer for a possibly unknown event type.
    pub fn default_for_event(event_type: Option<&str>) -> Self {
        Self::default_for(event_type.map_or(HookCategory::StopLike, HookCategory::of))
    }

    pub fn allow(reason: Option<String>) -> Self {
        Self::decision(PermissionDecision::Allow, reason)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::decision(PermissionDecision::Deny, Some(reason.into()))
    }

    pub fn ask(reason: impl Into<String>) -> Self {
        Self::decision(PermissionDecision::Ask, Some(reason.into()))
    }

    fn decision(permission_decision: PermissionDecision, reason: Option<String>) -> Self {
        Self::PreToolUse(PreToolUseResponse {
            permission_decision,
            reason,
            updated_input: None,
        })
    }

    pub fn context(additional_context: impl Into<String>) -> Self {
        Self::UserPromptSubmit(UserPromptSubmitResponse {
            additional_context: additional_context.into(),
        })
    }

    pub fn post_tool_use() -> Self {
        Self::PostToolUse(PostToolUseResponse::default())
    }

    pub fn proceed() -> Self {
        Self::StopLike(StopLikeResponse {
            should_continue: true,
            stop_reason: None,
            additional_context: None,
        })
    }

    pub fn halt(stop_reason: impl Into<String>) -> Self {
        Self::StopLike(StopLikeResponse {
            should_continue: false,
            stop_reason: Some(stop_reason.into()),
            additional_context: None,
        })
    }

    pub fn category(&self) -> HookCategory {
        match self {
            HookResponse::PreToolUse(_) => HookCategory::PreToolUse,
            HookResponse::UserPromptSubmit(_) => HookCategory::UserPromptSubmit,
            HookResponse::PostToolUse(_) => HookCategory::PostToolUse,
            HookResponse::StopLike(_) => HookCategory::StopLike,
        }
    }

    /// Replace a response of the wrong shape with the category default.
    pub fn conform(self, event_type: &str) -> Self {
        let expected = HookCategory::of(event_type);
        if self.category() == expected {
            self
        } else {
            tracing::warn!(
                "handler for {} returned a {:?} response; using default",
                event_type,
                self.category()
            );
            Self::default_for(expected)
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_per_category() {
        assert_eq!(
            HookResponse::default_for(HookCategory::PreToolUse).to_value(),
            json!({"permissionDecision": "allow"})
        );
        assert_eq!(
            HookResponse::default_for(HookCategory::UserPromptSubmit).to_value(),
            json!({"additionalContext": ""})
        );
        assert_eq!(
            HookResponse::default_for(HookCategory::PostToolUse).to_value(),
            json!({})
        );
        assert_eq!(
            HookResponse::default_for(HookCategory::StopLike).to_value(),
            json!({"continue": true})
        );
    }

    #[test]
    fn test_unknown_event_is_stop_like() {
        assert_eq!(HookCategory::of("SomethingNew"), HookCategory::StopLike);
        assert_eq!(
            HookResponse::default_for_event(None).to_value(),
            json!({"continue": true})
        );
    }

    #[test]
    fn test_halt_shape() {
        assert_eq!(
            HookResponse::halt("denied by policy 'x'").to_value(),
            json!({"continue": false, "stopReason": "denied by policy 'x'"})
        );
    }

    #[test]
    fn test_conform_replaces_wrong_shape() {
        let wrong = HookResponse::proceed().conform("PreToolUse");
        assert_eq!(wrong, HookResponse::allow(None));
        let right = HookResponse::deny("no").conform("PreToolUse");
        assert_eq!(right, HookResponse::deny("no"));
    }
}
