//! Hook wire format: normalized event payloads and category-shaped responses.

pub mod payload;
pub mod response;

pub use payload::{event_type_of, EventPayload};
pub use response::{
    HookCategory, HookResponse, PermissionDecision, PostToolUseResponse, PreToolUseResponse,
    StopLikeResponse, UserPromptSubmitResponse,
};
