//! System assembly: shared cells, task wiring and the shutdown action.
//!
//! Every inter-task channel is created here once and handed to the tasks
//! that use it. Tasks never call each other.

use std::fmt::{self, Write as _};
use std::time::Duration;

use cotask_common::consts::CHANNELS;
use cotask_common::hal::{
    BallState, CalibrationStatus, Encoder, EncoderReading, Imu, Motor, TouchPanel, Vector3,
};
use cotask_common::system::{ControlConfig, LoopGains, SystemConfig};
use tracing::{debug, info};

use crate::calibration::CalibrationStore;
use crate::console::ConsoleHandle;
use crate::control::{PidController, PidGains};
use crate::scheduler::Scheduler;
use crate::share::Share;
use crate::task::PeriodicTask;
use crate::tasks::{
    ChannelConfig, ControlTask, EncoderTask, ImuTask, MotorTask, TouchpadTask, UserSettings,
    UserTask,
};
use crate::ticks::Clock;

/// Anti-windup tracking time constant for both loops [s].
const ANTI_WINDUP_TT: f32 = 0.1;
/// Derivative filter time constant for the inner loop [s].
const INNER_DERIVATIVE_TF: f32 = 0.005;

/// Every shared cell in the system.
#[derive(Clone)]
pub struct Shares {
    // ── user → control ──
    pub closed_loop: Share<bool>,
    pub inner_gains: Share<LoopGains>,
    pub outer_gains: Share<LoopGains>,
    pub setpoints: [Share<f32>; CHANNELS],
    pub direct_setpoint: Share<bool>,
    pub print_request: [Share<bool>; CHANNELS],

    // ── user/control → motor ──
    pub duty: [Share<f32>; CHANNELS],
    pub clear_fault: [Share<bool>; CHANNELS],

    // ── encoder ──
    pub encoder: Share<EncoderReading>,
    pub zero_encoder: Share<bool>,

    // ── IMU ──
    pub euler: Share<Vector3>,
    pub omega: Share<Vector3>,
    pub imu_status: Share<CalibrationStatus>,
    pub imu_ready: Share<bool>,

    // ── touch panel ──
    pub ball: Share<BallState>,
    pub touch_ready: Share<bool>,

    // ── collection ──
    pub collect_stop: Share<bool>,
}

impl Shares {
    /// Create all cells; gain cells start at the configured gains.
    pub fn new(control: &ControlConfig) -> Self {
        Self {
            closed_loop: Share::new("closed_loop", false),
            inner_gains: Share::new("inner_gains", control.inner),
            outer_gains: Share::new("outer_gains", control.outer),
            setpoints: [Share::new("setpoint_1", 0.0), Share::new("setpoint_2", 0.0)],
            direct_setpoint: Share::new("direct_setpoint", false),
            print_request: [Share::new("print_1", false), Share::new("print_2", false)],
            duty: [Share::new("duty_1", 0.0), Share::new("duty_2", 0.0)],
            clear_fault: [
                Share::new("clear_fault_1", false),
                Share::new("clear_fault_2", false),
            ],
            encoder: Share::new("encoder", EncoderReading::default()),
            zero_encoder: Share::new("zero_encoder", false),
            euler: Share::new("euler", [0.0; 3]),
            omega: Share::new("omega", [0.0; 3]),
            imu_status: Share::new("imu_status", CalibrationStatus::default()),
            imu_ready: Share::new("imu_ready", false),
            ball: Share::new("ball", BallState::default()),
            touch_ready: Share::new("touch_ready", false),
            collect_stop: Share::new("collect_stop", false),
        }
    }

    /// One `name = value` line per cell.
    pub fn describe(&self) -> String {
        fn line<T: Copy + fmt::Debug>(out: &mut String, share: &Share<T>) {
            let _ = writeln!(out, "{} = {:?}", share.name(), share.read());
        }

        let mut out = String::new();
        line(&mut out, &self.closed_loop);
        line(&mut out, &self.inner_gains);
        line(&mut out, &self.outer_gains);
        for s in &self.setpoints {
            line(&mut out, s);
        }
        line(&mut out, &self.direct_setpoint);
        for s in &self.print_request {
            line(&mut out, s);
        }
        for s in &self.duty {
            line(&mut out, s);
        }
        for s in &self.clear_fault {
            line(&mut out, s);
        }
        line(&mut out, &self.encoder);
        line(&mut out, &self.zero_encoder);
        line(&mut out, &self.euler);
        line(&mut out, &self.omega);
        line(&mut out, &self.imu_status);
        line(&mut out, &self.imu_ready);
        line(&mut out, &self.ball);
        line(&mut out, &self.touch_ready);
        line(&mut out, &self.collect_stop);
        out
    }

    /// Shutdown action: zero every actuation and gain cell and drop out of
    /// closed-loop control.
    pub fn apply_safe_state(&self) {
        for duty in &self.duty {
            duty.write(0.0);
        }
        self.inner_gains.write(LoopGains::default());
        self.outer_gains.write(LoopGains::default());
        self.closed_loop.write(false);
        self.direct_setpoint.write(false);
        info!("actuation and gain cells zeroed");
    }
}

/// Hardware collaborators, one per role.
pub struct Drivers {
    pub motors: [Box<dyn Motor>; CHANNELS],
    pub encoder: Box<dyn Encoder>,
    pub imu: Box<dyn Imu>,
    pub touch_panel: Box<dyn TouchPanel>,
}

/// Assembled system.
pub struct System {
    pub scheduler: Scheduler,
    pub shares: Shares,
}

/// Wire every task to its cells and drivers, in execution order:
/// user, encoder, IMU, touch panel, control 1/2, motor 1/2.
pub fn assemble(
    config: &SystemConfig,
    clock: Box<dyn Clock>,
    console: ConsoleHandle,
    drivers: Drivers,
) -> System {
    let shares = Shares::new(&config.control);
    let periods = &config.periods;
    let control = &config.control;
    let clk = clock.as_ref();

    let user = UserTask::new(console.clone(), &shares, UserSettings::from_config(config));
    let encoder = EncoderTask::new(drivers.encoder, &shares);
    let imu = ImuTask::new(
        drivers.imu,
        CalibrationStore::new(&config.calibration.imu_file),
        config.calibration.imu_target,
        console.clone(),
        &shares,
    );
    let touchpad = TouchpadTask::new(
        drivers.touch_panel,
        CalibrationStore::new(&config.calibration.touchpad_file),
        config.filter.clone(),
        console.clone(),
        &shares,
    );

    let mut tasks: Vec<Box<dyn crate::task::Task>> = vec![
        Box::new(PeriodicTask::new("user", periods.user, clk, user)),
        Box::new(PeriodicTask::new("encoder", periods.encoder, clk, encoder)),
        Box::new(PeriodicTask::new("imu", periods.imu, clk, imu)),
        Box::new(PeriodicTask::new("touchpad", periods.touchpad, clk, touchpad)),
    ];

    for ch in 0..CHANNELS {
        let cfg = ChannelConfig::platform(ch);
        let inner = PidController::new(PidGains::new(control.inner, control.duty_limit))
            .with_filters(INNER_DERIVATIVE_TF, ANTI_WINDUP_TT);
        let outer = PidController::new(PidGains::new(control.outer, control.outer_output_limit))
            .with_filters(0.0, ANTI_WINDUP_TT);
        let task = ControlTask::new(cfg, Box::new(inner), console.clone(), &shares)
            .with_outer(Box::new(outer), &shares);
        tasks.push(Box::new(PeriodicTask::new(cfg.name, periods.control, clk, task)));
    }

    for (ch, motor) in drivers.motors.into_iter().enumerate() {
        let name = if ch == 0 { "motor_1" } else { "motor_2" };
        let task = MotorTask::new(ch, motor, &shares, control.duty_limit);
        tasks.push(Box::new(PeriodicTask::new(name, periods.motor, clk, task)));
    }

    let mut scheduler = Scheduler::new(clock)
        .with_idle_sleep(Duration::from_micros(u64::from(config.scheduler.idle_sleep_us)));
    for task in tasks {
        scheduler.add_boxed(task);
    }

    let hook_shares = shares.clone();
    scheduler.set_shutdown_hook(move || hook_shares.apply_safe_state());

    info!(tasks = ?scheduler.task_names(), "system assembled");
    debug!("shared cells:\n{}", shares.describe());
    System { scheduler, shares }
}
