//! # cotask runtime
//!
//! Cooperative round-robin scheduling of periodic state-machine tasks that
//! talk only through single-slot shared cells.
//!
//! ## Building blocks
//!
//! - [`ticks`] - wraparound-safe tick arithmetic and clocks
//! - [`share`] - single-slot shared cells
//! - [`task`] - the task contract and the periodic wrapper
//! - [`scheduler`] - the round-robin drive loop
//!
//! ## Application
//!
//! - [`tasks`] - user interface, encoder, IMU, touch panel, control, motor
//! - [`control`] - pluggable control laws (PID)
//! - [`ui`] - numeric entry, clamping, sample collection
//! - [`calibration`] - persisted calibration files
//! - [`console`] - byte-oriented command stream
//! - [`system`] - wiring of cells, tasks and shutdown action
//! - [`sim`] - simulated drivers for running on a host
//!
//! ## Single thread
//!
//! Everything runs on the thread that calls [`scheduler::Scheduler::run`].
//! Shared cells are `!Send`, so the compiler rejects any attempt to move a
//! task to another thread.

pub mod calibration;
pub mod console;
pub mod control;
pub mod scheduler;
pub mod share;
pub mod sim;
pub mod system;
pub mod task;
pub mod tasks;
pub mod ticks;
pub mod ui;
