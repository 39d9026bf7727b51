use std::sync::Arc;

use crate::agents::AgentRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::StewardConfig;
use crate::error::Result;
use crate::hierarchy::SessionHierarchyTracker;
use crate::notify::NotificationBus;
use crate::policy::PolicyEngine;
use crate::storage::{JsonFileStore, MemoryStore, Store};

/// Every long-lived service, built once at startup and shared by `Arc`.
pub struct StewardContext {
    pub config: StewardConfig,
    pub store: Arc<dyn Store>,
    pub bus: NotificationBus,
    pub clock: Arc<dyn Clock>,
    pub agents: AgentRegistry,
    pub policies: PolicyEngine,
    pub hierarchy: SessionHierarchyTracker,
}

impl StewardContext {
    pub fn new(config: StewardConfig, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let bus = NotificationBus::new().with_clock(clock.clone());
        Self {
            agents: AgentRegistry::new(store.clone(), bus.clone(), clock.clone()),
            policies: PolicyEngine::new(store.clone(), bus.clone(), clock.clone()),
            hierarchy: SessionHierarchyTracker::new(),
            config,
            store,
            bus,
            clock,
        }
    }

    /// JSON-file store under the configured data dir, wall clock.
    pub fn open(config: StewardConfig) -> Result<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(data_dir));
        Ok(Self::new(config, store, Arc::new(SystemClock)))
    }

    pub fn in_memory(config: StewardConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), clock)
    }
}
