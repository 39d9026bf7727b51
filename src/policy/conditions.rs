use serde::{Deserialize, Serialize};

use super::matcher::{command_glob_matches, path_glob_matches};
use super::PermissionRequest;

/// Hour-of-day window. Both ends are inclusive; a start after the end wraps
/// past midnight (`22..=6` covers 22, 23, 0, ... 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour <= self.end_hour
        } else {
            hour >= self.start_hour || hour <= self.end_hour
        }
    }
}

/// Optional per-policy predicate. Stored opaquely on the policy and parsed at
/// evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConditions {
    pub allowed_paths: Option<Vec<String>>,
    pub blocked_paths: Option<Vec<String>>,
    pub allowed_commands: Option<Vec<String>>,
    pub blocked_commands: Option<Vec<String>>,
    pub allowed_tools: Option<Vec<String>>,
    pub blocked_tools: Option<Vec<String>>,
    pub time_window: Option<TimeWindow>,
}

impl PolicyConditions {
    /// Interpret raw condition data. Anything that does not parse is treated
    /// as "no conditions".
    pub fn from_value(raw: Option<&serde_json::Value>) -> Option<Self> {
        let raw = raw?;
        if raw.is_null() {
            return None;
        }
        match serde_json::from_value::<PolicyConditions>(raw.clone()) {
            Ok(conditions) => Some(conditions),
            Err(e) => {
                tracing::warn!("ignoring malformed policy conditions: {}", e);
                None
            }
        }
    }

    /// Every present condition must pass. A condition whose subject is absent
    /// from the request is skipped.
    pub fn evaluate(&self, request: &PermissionRequest, hour: u32) -> bool {
        if let Some(path) = request.file_path.as_deref() {
            if let Some(allowed) = &self.allowed_paths {
                if !allowed.iter().any(|g| path_glob_matches(g, path)) {
                    return false;
                }
            }
            if let Some(blocked) = &self.blocked_paths {
                if blocked.iter().any(|g| path_glob_matches(g, path)) {
                    return false;
                }
            }
        }

        if let Some(command) = request.command.as_deref() {
            if let Some(allowed) = &self.allowed_commands {
                if !allowed.iter().any(|g| command_glob_matches(g, command)) {
                    return false;
                }
            }
            if let Some(blocked) = &self.blocked_commands {
                if blocked.iter().any(|g| command_glob_matches(g, command)) {
                    return false;
                }
            }
        }

        if let Some(tool) = request.tool_name.as_deref() {
            if let Some(allowed) = &self.allowed_tools {
                if !allowed.iter().any(|t| t == tool) {
                    return false;
                }
            }
            if let Some(blocked) = &self.blocked_tools {
                if blocked.iter().any(|t| t == tool) {
                    return false;
                }
            }
        }

        if let Some(window) = &self.time_window {
            if !window.contains(hour) {
                return false;
            }
        }

        true
    }
}
