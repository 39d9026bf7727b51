use std::io::Read;
use std::time::Duration;

use serde_json::Value;

use crate::config::StewardConfig;
use crate::error::Result;
use crate::ipc::HookClient;
use crate::protocol::{event_type_of, HookResponse};

/// Hook entry point. Always prints a response and always succeeds: when the
/// daemon is unreachable, slow, or the payload unreadable, the category
/// default goes out instead.
pub async fn run_hook(config: &StewardConfig) -> Result<()> {
    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        tracing::warn!("failed to read hook payload: {}", e);
    }

    let raw: Option<Value> = match serde_json::from_str(&input) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("hook payload is not JSON: {}", e);
            None
        }
    };
    let event_type = raw.as_ref().and_then(event_type_of);

    let response = match raw {
        Some(raw) => {
            let client = HookClient::new(
                config.socket_path(),
                Duration::from_millis(config.hook_timeout_ms),
            );
            match client.send(&raw).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("daemon unavailable, failing open: {}", e);
                    HookResponse::default_for_event(event_type.as_deref()).to_value()
                }
            }
        }
        None => HookResponse::default_for_event(None).to_value(),
    };

    println!("{}", response);
    Ok(())
}
