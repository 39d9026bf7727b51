use std::sync::RwLock;

use chrono::{DateTime, Duration, Local, Timelike, Utc};

/// Source of "now" for everything time-dependent: activity stamps, idle and
/// stale thresholds, policy time windows and the maintenance scheduler.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Hour of day (0-23) in local time, used by policy time windows.
    fn local_hour(&self) -> u32 {
        self.now().with_timezone(&Local).hour()
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    hour: RwLock<Option<u32>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
            hour: RwLock::new(None),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }

    /// Pin the value returned by `local_hour`, independent of the host timezone.
    pub fn set_local_hour(&self, hour: u32) {
        let mut h = self.hour.write().unwrap_or_else(|e| e.into_inner());
        *h = Some(hour % 24);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }

    fn local_hour(&self) -> u32 {
        let pinned = *self.hour.read().unwrap_or_else(|e| e.into_inner());
        pinned.unwrap_or_else(|| self.now().with_timezone(&Local).hour())
    }
}
