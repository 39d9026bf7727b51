use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StewardError {
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("policy not found: {policy_id}")]
    PolicyNotFound { policy_id: String },

    #[error("invalid policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("approval item {item_id} already {status}")]
    ApprovalAlreadyDecided { item_id: String, status: String },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("handler for {event_type} failed: {reason}")]
    Handler { event_type: String, reason: String },

    #[error("ipc error: {reason}")]
    Ipc { reason: String },

    #[error("socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    #[error("hook response timeout after {timeout_ms}ms")]
    ResponseTimeout { timeout_ms: u64 },

    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StewardError>;
