pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::StewardContext;
use crate::error::{Result, StewardError};
use crate::protocol::{event_type_of, EventPayload, HookResponse};

/// Handles one hook event type.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, ctx: &StewardContext, event: &EventPayload) -> Result<HookResponse>;
}

/// Entry point for hook events. Nothing that goes wrong in here reaches the
/// host as an error: every failure path answers with the category default.
pub struct EventIngress {
    ctx: Arc<StewardContext>,
    handlers: HashMap<String, Arc<dyn HookHandler>>,
}

impl EventIngress {
    /// An ingress with no handlers; every event gets the category default.
    pub fn new(ctx: Arc<StewardContext>) -> Self {
        Self {
            ctx,
            handlers: HashMap::new(),
        }
    }

    pub fn with_default_handlers(ctx: Arc<StewardContext>) -> Self {
        let mut ingress = Self::new(ctx);
        for (event_type, handler) in handlers::default_handlers() {
            ingress.register(event_type, handler);
        }
        ingress
    }

    /// Register (or replace) the handler for an event type.
    pub fn register(&mut self, event_type: &str, handler: Arc<dyn HookHandler>) {
        self.handlers.insert(event_type.to_string(), handler);
    }

    pub fn context(&self) -> &Arc<StewardContext> {
        &self.ctx
    }

    /// Normalize a raw payload and dispatch it.
    pub async fn submit_event(&self, raw: Value) -> HookResponse {
        match EventPayload::from_value(&raw, self.ctx.clock.now()) {
            Ok(event) => self.submit_payload(event).await,
            Err(e) => {
                tracing::warn!("dropping hook payload: {}", e);
                HookResponse::default_for_event(event_type_of(&raw).as_deref())
            }
        }
    }

    /// Dispatch an already-normalized event.
    pub async fn submit_payload(&self, event: EventPayload) -> HookResponse {
        let event_type = event.event_type.clone();
        let Some(handler) = self.handlers.get(&event_type).cloned() else {
            tracing::debug!("no handler for {}, answering with default", event_type);
            return HookResponse::default_for_event(Some(&event_type));
        };

        tracing::debug!(
            "dispatching {} for session {}",
            event_type,
            event.session_id.as_deref().unwrap_or("-")
        );

        // A separate task, so a panicking handler surfaces as a JoinError.
        let ctx = self.ctx.clone();
        let task = tokio::spawn(async move { handler.handle(&ctx, &event).await });

        let outcome = match task.await {
            Ok(result) => result,
            Err(join_error) => Err(StewardError::Handler {
                event_type: event_type.clone(),
                reason: if join_error.is_panic() {
                    "handler panicked".into()
                } else {
                    join_error.to_string()
                },
            }),
        };

        match outcome {
            Ok(response) => response.conform(&event_type),
            Err(e) => {
                tracing::warn!("{} handler failed, failing open: {}", event_type, e);
                HookResponse::default_for_event(Some(&event_type))
            }
        }
    }
}
