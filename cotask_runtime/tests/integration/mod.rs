pub mod calibration;
pub mod collect;
pub mod commands;
pub mod scheduling;
pub mod shutdown;

use std::path::Path;

use cotask_common::system::SystemConfig;
use cotask_runtime::console::MemoryConsole;
use cotask_runtime::sim::SimPlatform;
use cotask_runtime::system::{System, assemble};
use cotask_runtime::ticks::{ManualClock, TICKS_PER_SECOND, TickWidth};

/// Simulated time per scheduler pass [ticks]; the fastest task period.
pub const STEP: u32 = 5_000;

/// Assembled system plus handles on everything a test pokes at.
pub struct Rig {
    pub clock: ManualClock,
    pub console: MemoryConsole,
    pub platform: SimPlatform,
    pub system: System,
}

impl Rig {
    /// Default configuration with calibration files under `dir`.
    pub fn new(dir: &Path) -> Self {
        Self::with_config(dir, |_| {})
    }

    pub fn with_config(dir: &Path, edit: impl FnOnce(&mut SystemConfig)) -> Self {
        let mut config = SystemConfig::default();
        config.calibration.imu_file = dir.join("imu_cal.txt").display().to_string();
        config.calibration.touchpad_file = dir.join("touch_cal.txt").display().to_string();
        edit(&mut config);
        config.validate().unwrap();

        let width = TickWidth::new(config.scheduler.tick_bits).unwrap();
        let clock = ManualClock::new(width, 0);
        let console = MemoryConsole::new();
        let platform = SimPlatform::new();
        let seconds = |ticks: u32| ticks as f32 / TICKS_PER_SECOND as f32;
        let drivers =
            platform.drivers(seconds(config.periods.motor), seconds(config.periods.encoder));
        let system = assemble(&config, Box::new(clock.clone()), console.handle(), drivers);

        Self {
            clock,
            console,
            platform,
            system,
        }
    }

    /// Advance the clock by [`STEP`] and run one pass, `passes` times.
    pub fn run(&mut self, passes: usize) {
        for _ in 0..passes {
            self.clock.advance(STEP);
            self.system.scheduler.run_passes(1).unwrap();
        }
    }

    /// Run until `done` holds, at most `max_passes` passes.
    pub fn run_until(&mut self, max_passes: usize, done: impl Fn(&Self) -> bool) -> bool {
        for _ in 0..max_passes {
            if done(self) {
                return true;
            }
            self.run(1);
        }
        done(self)
    }

    /// Run until both sensors report ready (calibration finished).
    pub fn settle(&mut self) {
        let ready = self.run_until(2_000, |r| {
            r.system.shares.imu_ready.read() && r.system.shares.touch_ready.read()
        });
        assert!(ready, "sensors never became ready:\n{}", self.console.output());
    }

    /// Queue console input and run until the user task has consumed it.
    pub fn type_in(&mut self, text: &str) {
        self.console.push_input(text);
        let consumed = self.run_until(10_000, |r| r.console.pending_input() == 0);
        assert!(consumed, "input {text:?} not consumed");
    }

    /// Run until the console output contains `needle`.
    pub fn wait_for(&mut self, needle: &str) {
        let seen = self.run_until(10_000, |r| r.console.output().contains(needle));
        assert!(seen, "never printed {needle:?}:\n{}", self.console.output());
    }
}
