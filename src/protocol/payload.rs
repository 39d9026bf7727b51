use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, StewardError};

const EVENT_TYPE_KEYS: &[&str] = &["hook_event_name", "hookEventName", "eventType"];

/// A hook event with its field names normalized.
///
/// Hosts send either snake_case or camelCase keys, and a few fields have
/// more than one historical name. The first key present wins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_type: String,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub agent_type: Option<String>,
    /// Explicit hint naming the session that spawned a sub-agent.
    pub parent_session_id: Option<String>,
    pub permission_type: Option<String>,
    pub permission_details: Option<Value>,
    pub notification_type: Option<String>,
    pub notification_message: Option<String>,
    pub prompt: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload {
    /// Normalize a raw payload. `now` stands in for a missing or unreadable
    /// timestamp.
    pub fn from_value(raw: &Value, now: DateTime<Utc>) -> Result<Self> {
        let obj = raw.as_object().ok_or_else(|| StewardError::InvalidPayload {
            reason: "payload is not a JSON object".into(),
        })?;
        let event_type = string(obj, EVENT_TYPE_KEYS).ok_or_else(|| StewardError::InvalidPayload {
            reason: "missing hook_event_name".into(),
        })?;

        Ok(Self {
            event_type,
            session_id: string(obj, &["session_id", "sessionId"]),
            cwd: string(obj, &["cwd", "working_directory", "workingDirectory"]),
            tool_name: string(obj, &["tool_name", "toolName"]),
            tool_input: value(obj, &["tool_input", "toolInput"]),
            tool_response: value(obj, &["tool_response", "toolResponse"]),
            agent_id: string(obj, &["agent_id", "agentId"]),
            agent_name: string(obj, &["agent_name", "agentName"]),
            agent_type: string(obj, &["agent_type", "agentType"]),
            parent_session_id: string(obj, &["parent_session_id", "parentSessionId"]),
            permission_type: string(obj, &["permission_type", "permissionType"]),
            permission_details: value(obj, &["permission_details", "permissionDetails"]),
            notification_type: string(obj, &["notification_type", "notificationType"]),
            notification_message: string(
                obj,
                &["notification_message", "notificationMessage", "message"],
            ),
            prompt: string(obj, &["prompt"]),
            timestamp: timestamp(obj).unwrap_or(now),
        })
    }

    /// Target path of a file tool call, if the tool input carries one.
    pub fn file_path(&self) -> Option<String> {
        let input = self.tool_input.as_ref()?.as_object()?;
        string(input, &["file_path", "path", "notebook_path"])
    }

    /// Shell command of a Bash-style tool call.
    pub fn command(&self) -> Option<String> {
        let input = self.tool_input.as_ref()?.as_object()?;
        string(input, &["command"])
    }
}

/// The event-type name of a raw payload, without validating anything else.
/// Used to pick a fail-open default when normalization itself fails.
pub fn event_type_of(raw: &Value) -> Option<String> {
    string(raw.as_object()?, EVENT_TYPE_KEYS)
}

fn string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn value(obj: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
        .cloned()
}

/// RFC 3339 strings or epoch milliseconds.
fn timestamp(obj: &Map<String, Value>) -> Option<DateTime<Utc>> {
    match obj.get("timestamp")? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_snake_and_camel_case_normalize_alike() {
        let snake = json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "cwd": "/repo",
            "tool_name": "Edit",
            "tool_input": {"file_path": "src/main.rs"}
        });
        let camel = json!({
            "hookEventName": "PreToolUse",
            "sessionId": "s1",
            "workingDirectory": "/repo",
            "toolName": "Edit",
            "toolInput": {"file_path": "src/main.rs"}
        });
        let a = EventPayload::from_value(&snake, now()).unwrap();
        let b = EventPayload::from_value(&camel, now()).unwrap();
        assert_eq!(a.event_type, b.event_type);
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.cwd.as_deref(), Some("/repo"));
        assert_eq!(b.cwd.as_deref(), Some("/repo"));
        assert_eq!(a.file_path().as_deref(), Some("src/main.rs"));
        assert_eq!(b.file_path(), a.file_path());
    }

    #[test]
    fn test_event_type_alias() {
        let raw = json!({"eventType": "Stop"});
        assert_eq!(EventPayload::from_value(&raw, now()).unwrap().event_type, "Stop");
        assert_eq!(event_type_of(&raw).as_deref(), Some("Stop"));
    }

    #[test]
    fn test_missing_event_type_is_invalid() {
        let raw = json!({"session_id": "s1"});
        assert!(matches!(
            EventPayload::from_value(&raw, now()),
            Err(StewardError::InvalidPayload { .. })
        ));
        assert!(EventPayload::from_value(&json!([1, 2]), now()).is_err());
    }

    #[test]
    fn test_timestamp_forms() {
        let rfc = json!({"hook_event_name": "Stop", "timestamp": "2026-01-02T03:04:05Z"});
        let millis = json!({"hook_event_name": "Stop", "timestamp": 1_767_323_045_000_i64});
        let junk = json!({"hook_event_name": "Stop", "timestamp": true});
        let expected = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(EventPayload::from_value(&rfc, now()).unwrap().timestamp, expected);
        assert_eq!(EventPayload::from_value(&millis, now()).unwrap().timestamp, expected);
        assert_eq!(EventPayload::from_value(&junk, now()).unwrap().timestamp, now());
    }

    #[test]
    fn test_message_alias_and_command() {
        let raw = json!({
            "hook_event_name": "Notification",
            "message": "Claude needs your permission",
            "tool_input": {"command": "cargo build"}
        });
        let event = EventPayload::from_value(&raw, now()).unwrap();
        assert_eq!(
            event.notification_message.as_deref(),
            Some("Claude needs your permission")
        );
        assert_eq!(event.command().as_deref(), Some("cargo build"));
    }
}
