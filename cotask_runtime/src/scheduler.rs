//! Cooperative round-robin scheduler.
//!
//! Tasks run in registration order, one `step()` at a time, on the calling
//! thread. A pass visits every live task exactly once. The stop flag is
//! checked between tasks, never inside a step.
//!
//! ## Faults
//!
//! A task whose step fails is marked faulted, logged, and skipped in later
//! passes. The others keep running. Once every task has faulted, the
//! scheduler performs its shutdown action and returns
//! [`SchedulerError::AllTasksFaulted`].
//!
//! ## Shutdown
//!
//! `safe_stop()` on every task in order (faulted ones included), then the
//! registered shutdown hook.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, trace};

use crate::task::{Task, TaskError};
use crate::ticks::Clock;

/// Scheduler-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `run()` called with an empty task list.
    #[error("no tasks registered")]
    NoTasks,

    /// Every registered task has halted.
    #[error("all {count} tasks faulted")]
    AllTasksFaulted { count: usize },
}

// ─── Pass Statistics ────────────────────────────────────────────────

/// Timing statistics over scheduler passes.
#[derive(Debug, Clone, Copy)]
pub struct PassStats {
    /// Completed passes.
    pub pass_count: u64,
    /// Total due steps across all tasks.
    pub fires: u64,
    /// Passes in which no task was due.
    pub idle_passes: u64,
    /// Last pass duration [ns].
    pub last_pass_ns: u64,
    pub min_pass_ns: u64,
    pub max_pass_ns: u64,
    /// Running sum for average computation.
    pub sum_pass_ns: u64,
}

impl PassStats {
    pub const fn new() -> Self {
        Self {
            pass_count: 0,
            fires: 0,
            idle_passes: 0,
            last_pass_ns: 0,
            min_pass_ns: u64::MAX,
            max_pass_ns: 0,
            sum_pass_ns: 0,
        }
    }

    /// Record one pass. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: u64, fired: usize) {
        self.pass_count += 1;
        self.fires += fired as u64;
        if fired == 0 {
            self.idle_passes += 1;
        }
        self.last_pass_ns = duration_ns;
        self.min_pass_ns = self.min_pass_ns.min(duration_ns);
        self.max_pass_ns = self.max_pass_ns.max(duration_ns);
        self.sum_pass_ns = self.sum_pass_ns.saturating_add(duration_ns);
    }

    /// Average pass time [ns] (0 if no passes).
    #[inline]
    pub fn avg_pass_ns(&self) -> u64 {
        if self.pass_count == 0 {
            0
        } else {
            self.sum_pass_ns / self.pass_count
        }
    }
}

impl Default for PassStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

struct Slot {
    task: Box<dyn Task>,
    fault: Option<TaskError>,
}

/// Result of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassOutcome {
    Completed { fired: usize },
    Interrupted,
}

/// Ordered task list plus the drive loop.
pub struct Scheduler {
    clock: Box<dyn Clock>,
    slots: Vec<Slot>,
    shutdown_hook: Option<Box<dyn FnMut()>>,
    idle_sleep: Duration,
    stats: PassStats,
}

impl Scheduler {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            slots: Vec::new(),
            shutdown_hook: None,
            idle_sleep: Duration::ZERO,
            stats: PassStats::new(),
        }
    }

    /// Sleep applied after a pass in which no task fired.
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Append a task. Insertion order is execution order.
    pub fn add_task(&mut self, task: impl Task + 'static) {
        self.add_boxed(Box::new(task));
    }

    pub fn add_boxed(&mut self, task: Box<dyn Task>) {
        self.slots.push(Slot { task, fault: None });
    }

    /// Action run once after every task's `safe_stop()`.
    pub fn set_shutdown_hook(&mut self, hook: impl FnMut() + 'static) {
        self.shutdown_hook = Some(Box::new(hook));
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.task.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names of faulted tasks, in registration order.
    pub fn faulted(&self) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|s| s.fault.is_some())
            .map(|s| s.task.name())
            .collect()
    }

    pub fn stats(&self) -> &PassStats {
        &self.stats
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run passes until `stop` is set, then shut down.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NoTasks`] before the first pass,
    /// [`SchedulerError::AllTasksFaulted`] once nothing is left to run
    /// (after the shutdown action).
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), SchedulerError> {
        if self.slots.is_empty() {
            return Err(SchedulerError::NoTasks);
        }
        info!(tasks = ?self.task_names(), "scheduler started");

        loop {
            if let Err(e) = self.check_live() {
                self.shutdown();
                return Err(e);
            }
            match self.pass(Some(stop)) {
                PassOutcome::Completed { fired } => {
                    if fired == 0 && !self.idle_sleep.is_zero() {
                        std::thread::sleep(self.idle_sleep);
                    }
                }
                PassOutcome::Interrupted => break,
            }
        }

        info!("stop requested");
        self.shutdown();
        Ok(())
    }

    /// Run exactly `passes` passes with no stop flag and no shutdown.
    pub fn run_passes(&mut self, passes: usize) -> Result<(), SchedulerError> {
        if self.slots.is_empty() {
            return Err(SchedulerError::NoTasks);
        }
        for _ in 0..passes {
            self.check_live()?;
            self.pass(None);
        }
        Ok(())
    }

    /// Best-effort safety action: `safe_stop()` on every task, then the hook.
    pub fn shutdown(&mut self) {
        for slot in &mut self.slots {
            slot.task.safe_stop();
        }
        if let Some(hook) = self.shutdown_hook.as_mut() {
            hook();
        }
        let s = &self.stats;
        info!(
            passes = s.pass_count,
            fires = s.fires,
            idle_passes = s.idle_passes,
            min_ns = if s.pass_count == 0 { 0 } else { s.min_pass_ns },
            max_ns = s.max_pass_ns,
            avg_ns = s.avg_pass_ns(),
            "scheduler shut down"
        );
    }

    fn check_live(&self) -> Result<(), SchedulerError> {
        if self.slots.iter().all(|s| s.fault.is_some()) {
            return Err(SchedulerError::AllTasksFaulted {
                count: self.slots.len(),
            });
        }
        Ok(())
    }

    fn pass(&mut self, stop: Option<&AtomicBool>) -> PassOutcome {
        let started = Instant::now();
        let mut fired = 0;

        for slot in &mut self.slots {
            if stop.is_some_and(|s| s.load(Ordering::SeqCst)) {
                return PassOutcome::Interrupted;
            }
            if slot.fault.is_some() {
                continue;
            }
            match slot.task.step(self.clock.as_ref()) {
                Ok(status) => {
                    if status.fired() {
                        fired += 1;
                    }
                }
                Err(e) => {
                    error!(task = slot.task.name(), "task faulted and will be skipped: {e}");
                    slot.fault = Some(e);
                }
            }
        }

        let elapsed = started.elapsed().as_nanos() as u64;
        self.stats.record(elapsed, fired);
        trace!(pass = self.stats.pass_count, fired, elapsed_ns = elapsed, "pass");
        PassOutcome::Completed { fired }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
