//! Orchestration core for coding-agent companions: hook ingress, permission
//! policies with an approval queue, agent lifecycle tracking and sub-agent
//! hierarchy inference.

pub mod agents;
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod ingress;
pub mod ipc;
pub mod maintenance;
pub mod notify;
pub mod policy;
pub mod protocol;
pub mod storage;

pub use context::StewardContext;
pub use error::{Result, StewardError};
