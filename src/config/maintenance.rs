use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest span a setting can express (100 years). Larger values are clamped so
/// `now ± span` stays inside chrono's range.
pub const MAX_SPAN_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Seconds from config as a chrono span, clamped to [`MAX_SPAN_SECS`].
pub fn span(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_SPAN_SECS) as i64)
}

/// Thresholds and intervals for the background maintenance tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Active agents without activity for this long become idle.
    pub idle_threshold_secs: u64,
    /// Idle agents without activity for this long are terminated.
    pub stale_threshold_secs: u64,
    pub activity_check_interval_secs: u64,
    pub stale_check_interval_secs: u64,
    pub garbage_cleanup_interval_secs: u64,
    pub session_map_validation_interval_secs: u64,
    /// How often the scheduler looks for due tasks.
    pub tick_millis: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: 120,
            stale_threshold_secs: 1800,
            activity_check_interval_secs: 30,
            stale_check_interval_secs: 300,
            garbage_cleanup_interval_secs: 600,
            session_map_validation_interval_secs: 60,
            tick_millis: 1000,
        }
    }
}

impl MaintenanceConfig {
    pub fn idle_threshold(&self) -> chrono::Duration {
        span(self.idle_threshold_secs)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        span(self.stale_threshold_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(10))
    }
}
