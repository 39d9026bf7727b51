//! Periodic housekeeping over the agent registry.
//!
//! All tasks share one scheduler. Each has an interval and a next-due
//! instant; `run_due` runs whatever is due in a fixed order and reschedules it
//! from the tick time. Time comes from the context clock, so tests drive the
//! scheduler with a `ManualClock` instead of sleeping.

pub mod tasks;

pub use tasks::{GarbageDetector, PatternGarbageDetector, SweepReport};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use crate::config::maintenance::span;
use crate::context::StewardContext;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenanceTask {
    ActivityCheck,
    StaleAgents,
    GarbageCleanup,
    SessionMapValidation,
}

impl MaintenanceTask {
    /// Execution order within one tick.
    pub const ALL: [MaintenanceTask; 4] = [
        MaintenanceTask::ActivityCheck,
        MaintenanceTask::StaleAgents,
        MaintenanceTask::GarbageCleanup,
        MaintenanceTask::SessionMapValidation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceTask::ActivityCheck => "activity-check",
            MaintenanceTask::StaleAgents => "stale-agents",
            MaintenanceTask::GarbageCleanup => "garbage-cleanup",
            MaintenanceTask::SessionMapValidation => "session-map-validation",
        }
    }
}

/// What one task run touched: agent ids, or session ids for map validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: MaintenanceTask,
    pub affected: Vec<String>,
}

struct TaskSlot {
    task: MaintenanceTask,
    interval: Duration,
    next_due: DateTime<Utc>,
}

pub struct MaintenanceScheduler {
    ctx: Arc<StewardContext>,
    detector: Box<dyn GarbageDetector>,
    slots: Vec<TaskSlot>,
}

impl MaintenanceScheduler {
    /// Scheduler with the pattern detector from config. First runs fall one
    /// interval after construction.
    pub fn new(ctx: Arc<StewardContext>) -> Result<Self> {
        let detector = PatternGarbageDetector::from_patterns(&ctx.config.garbage_name_patterns)?;
        Ok(Self::with_detector(ctx, Box::new(detector)))
    }

    pub fn with_detector(ctx: Arc<StewardContext>, detector: Box<dyn GarbageDetector>) -> Self {
        let now = ctx.clock.now();
        let m = &ctx.config.maintenance;
        let slots = MaintenanceTask::ALL
            .iter()
            .map(|&task| {
                let secs = match task {
                    MaintenanceTask::ActivityCheck => m.activity_check_interval_secs,
                    MaintenanceTask::StaleAgents => m.stale_check_interval_secs,
                    MaintenanceTask::GarbageCleanup => m.garbage_cleanup_interval_secs,
                    MaintenanceTask::SessionMapValidation => {
                        m.session_map_validation_interval_secs
                    }
                };
                let interval = span(secs.max(1));
                TaskSlot {
                    task,
                    interval,
                    next_due: now + interval,
                }
            })
            .collect();
        Self {
            ctx,
            detector,
            slots,
        }
    }

    /// One-off registry sweep, run before the timers start.
    pub fn startup_sweep(&self) -> Result<SweepReport> {
        let report = tasks::registry_sweep(
            &self.ctx.agents,
            self.ctx.config.maintenance.stale_threshold(),
        )?;
        tracing::info!(
            "startup sweep: terminated {} agent(s), dropped {} session mapping(s)",
            report.terminated.len(),
            report.unmapped_sessions.len()
        );
        Ok(report)
    }

    pub fn next_due(&self, task: MaintenanceTask) -> Option<DateTime<Utc>> {
        self.slots
            .iter()
            .find(|slot| slot.task == task)
            .map(|slot| slot.next_due)
    }

    /// Run every task due at `now`, in fixed order, and reschedule each one
    /// for `now + interval`. A failing task is logged and still rescheduled.
    pub fn run_due(&mut self, now: DateTime<Utc>) -> Vec<TaskReport> {
        let mut reports = Vec::new();
        for idx in 0..self.slots.len() {
            if self.slots[idx].next_due > now {
                continue;
            }
            let task = self.slots[idx].task;
            match self.run_task(task) {
                Ok(affected) => {
                    if !affected.is_empty() {
                        tracing::debug!("{} touched {} record(s)", task.name(), affected.len());
                    }
                    reports.push(TaskReport { task, affected });
                }
                Err(e) => tracing::warn!("maintenance task {} failed: {}", task.name(), e),
            }
            let slot = &mut self.slots[idx];
            slot.next_due = now + slot.interval;
        }
        reports
    }

    fn run_task(&self, task: MaintenanceTask) -> Result<Vec<String>> {
        let registry = &self.ctx.agents;
        let m = &self.ctx.config.maintenance;
        match task {
            MaintenanceTask::ActivityCheck => tasks::check_activity(registry, m.idle_threshold()),
            MaintenanceTask::StaleAgents => {
                tasks::terminate_stale_agents(registry, m.stale_threshold())
            }
            MaintenanceTask::GarbageCleanup => {
                tasks::cleanup_garbage(registry, self.detector.as_ref())
            }
            MaintenanceTask::SessionMapValidation => tasks::validate_session_map(registry),
        }
    }

    /// Tick until `shutdown` is notified.
    pub async fn run(mut self, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.ctx.config.maintenance.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = self.ctx.clock.now();
                    self.run_due(now);
                }
                _ = shutdown.notified() => {
                    tracing::info!("maintenance scheduler stopping");
                    break;
                }
            }
        }
    }
}
