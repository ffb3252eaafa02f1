//! Periodic tasks and the state machines they drive.
//!
//! [`PeriodicTask`] owns the deadline bookkeeping; a [`StateMachine`] owns
//! the per-task states and performs one transition per due step. The
//! scheduler only sees the object-safe [`Task`] trait.
//!
//! ## Re-arming
//!
//! Every due step advances the deadline by exactly one period, however late
//! the step is. A task that falls behind catches up one period per pass and
//! never fires twice in the same pass.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, trace};

use crate::ticks::{Clock, Tick, TickWidth};

// ─── Errors ─────────────────────────────────────────────────────────

/// Fatal task conditions. Recoverable anomalies (bad keystrokes, clamped
/// values, missing calibration files) never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The state machine reached a state it cannot execute. A logic defect.
    #[error("task '{task}' reached invalid state {state}: {detail}")]
    InvalidState {
        task: &'static str,
        state: &'static str,
        detail: String,
    },

    /// The task was halted by an earlier fault and no longer runs.
    #[error("task '{task}' is halted")]
    Halted { task: &'static str },
}

// ─── Task Contract ──────────────────────────────────────────────────

/// Outcome of one [`Task::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Deadline not reached; nothing happened.
    NotDue,
    /// One transition ran; carries the resulting state label.
    Ran(&'static str),
}

impl Status {
    #[inline]
    pub const fn fired(self) -> bool {
        matches!(self, Self::Ran(_))
    }
}

/// Schedulable unit of cooperative work.
pub trait Task {
    /// Diagnostic name.
    fn name(&self) -> &'static str;

    /// Run one transition if due. Bounded, non-blocking work only.
    fn step(&mut self, clock: &dyn Clock) -> Result<Status, TaskError>;

    fn next_deadline(&self) -> Tick;

    fn period(&self) -> u32;

    /// Put any actuator this task owns into a safe state.
    fn safe_stop(&mut self) {}
}

// ─── State Machines ─────────────────────────────────────────────────

/// State tag of a task state machine.
pub trait TaskState: Copy + PartialEq + fmt::Debug {
    /// Short upper-case label, e.g. `"S_CMD"`.
    fn label(self) -> &'static str;
}

/// Timing context handed to a state machine for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    /// Tick at which the step started.
    pub now: Tick,
    pub width: TickWidth,
    /// Configured period of the owning task [ticks].
    pub period: u32,
}

/// Per-task states and transition logic.
pub trait StateMachine {
    type State: TaskState;

    fn state(&self) -> Self::State;

    /// Execute exactly one transition.
    fn advance(&mut self, ctx: StepContext) -> Result<(), TaskError>;

    fn safe_stop(&mut self) {}
}

// ─── Periodic Task ──────────────────────────────────────────────────

/// A state machine bound to a fixed period.
pub struct PeriodicTask<M: StateMachine> {
    name: &'static str,
    period: u32,
    next_deadline: Tick,
    machine: M,
    runs: u64,
    halted: bool,
}

impl<M: StateMachine> PeriodicTask<M> {
    /// First deadline is one period after the clock's current tick.
    pub fn new(name: &'static str, period: u32, clock: &dyn Clock, machine: M) -> Self {
        let next_deadline = clock.width().add(clock.now(), period);
        Self::with_deadline(name, period, next_deadline, machine)
    }

    /// Start with an explicit first deadline.
    pub fn with_deadline(name: &'static str, period: u32, next_deadline: Tick, machine: M) -> Self {
        Self {
            name,
            period,
            next_deadline,
            machine,
            runs: 0,
            halted: false,
        }
    }

    #[inline]
    pub fn state(&self) -> M::State {
        self.machine.state()
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Number of due steps executed.
    #[inline]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl<M: StateMachine> Task for PeriodicTask<M> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn step(&mut self, clock: &dyn Clock) -> Result<Status, TaskError> {
        if self.halted {
            return Err(TaskError::Halted { task: self.name });
        }

        let now = clock.now();
        let width = clock.width();
        if !width.is_due(now, self.next_deadline) {
            return Ok(Status::NotDue);
        }

        self.next_deadline = width.add(self.next_deadline, self.period);
        self.runs += 1;

        let before = self.machine.state();
        let ctx = StepContext {
            now,
            width,
            period: self.period,
        };
        if let Err(e) = self.machine.advance(ctx) {
            self.halted = true;
            error!(task = self.name, state = before.label(), "{e}");
            return Err(e);
        }

        let after = self.machine.state();
        if after != before {
            debug!(
                task = self.name,
                from = before.label(),
                to = after.label(),
                "state transition"
            );
        } else {
            trace!(task = self.name, state = after.label(), now, "step");
        }
        Ok(Status::Ran(after.label()))
    }

    fn next_deadline(&self) -> Tick {
        self.next_deadline
    }

    fn period(&self) -> u32 {
        self.period
    }

    fn safe_stop(&mut self) {
        self.machine.safe_stop();
    }
}

impl<M: StateMachine> fmt::Debug for PeriodicTask<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("next_deadline", &self.next_deadline)
            .field("state", &self.machine.state())
            .field("runs", &self.runs)
            .field("halted", &self.halted)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
