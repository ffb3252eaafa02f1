//! Pluggable closed-loop control laws.
//!
//! The control task only depends on [`Controller`]; the law behind it is
//! chosen at assembly time.

pub mod pid;

use cotask_common::system::LoopGains;

pub use pid::{PidController, PidGains, PidState, pid_compute};

/// Measured plant state fed to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub position: f32,
    /// Rate of `position`, measured rather than differentiated.
    pub velocity: f32,
}

/// Control law contract: `run(measurement, dt) -> actuation`.
pub trait Controller {
    fn set_gains(&mut self, gains: LoopGains);

    fn set_reference(&mut self, reference: f32);

    /// One control update. `dt` in seconds since the previous update.
    fn run(&mut self, measurement: Measurement, dt: f32) -> f32;

    /// Drop accumulated state (integral, filters).
    fn reset(&mut self);
}
