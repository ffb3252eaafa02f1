//! Cascaded control task, one instance per channel.
//!
//! The outer stage maps ball position on one panel axis to a platform angle
//! reference; the inner stage maps platform angle and rate to motor duty.
//! Stages alternate one per due step. A direct setpoint replaces the outer
//! stage's output. With closed-loop control disabled the task idles and
//! holds its duty cell at zero.

use cotask_common::consts::CHANNELS;
use cotask_common::hal::{BallState, Vector3};
use cotask_common::system::LoopGains;
use tracing::debug;

use crate::console::ConsoleHandle;
use crate::control::{Controller, Measurement};
use crate::share::Share;
use crate::system::Shares;
use crate::task::{StateMachine, StepContext, TaskError, TaskState};
use crate::ticks::{Tick, ticks_to_secs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Init,
    Idle,
    RunOuter,
    RunInner,
}

impl TaskState for ControlState {
    fn label(self) -> &'static str {
        match self {
            Self::Init => "S_INIT",
            Self::Idle => "S_IDLE",
            Self::RunOuter => "S_RUN_OUTER",
            Self::RunInner => "S_RUN_INNER",
        }
    }
}

/// Per-instance wiring of a control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Task name used in diagnostics.
    pub name: &'static str,
    /// Zero-based channel index: selects duty, setpoint and print cells.
    pub channel_id: usize,
    /// Panel axis measured by the outer stage (0 = x, 1 = y).
    pub ball_axis: usize,
    /// Euler component measured by the inner stage.
    pub euler_index: usize,
    /// Angular-rate component measured by the inner stage.
    pub omega_index: usize,
}

impl ChannelConfig {
    /// Platform wiring: channel 1 tilts about y and moves the ball along x;
    /// channel 2 tilts about x and moves it along y.
    pub const fn platform(channel_id: usize) -> Self {
        if channel_id == 0 {
            Self {
                name: "control_1",
                channel_id: 0,
                ball_axis: 0,
                euler_index: 2,
                omega_index: 1,
            }
        } else {
            Self {
                name: "control_2",
                channel_id: 1,
                ball_axis: 1,
                euler_index: 1,
                omega_index: 0,
            }
        }
    }

    /// Describe the first index that is out of range, if any.
    pub fn check(&self) -> Option<String> {
        let axes = Vector3::default().len();
        if self.channel_id >= CHANNELS {
            Some(format!("channel_id {} out of range (< {CHANNELS})", self.channel_id))
        } else if self.ball_axis >= CHANNELS {
            Some(format!("ball_axis {} out of range (< {CHANNELS})", self.ball_axis))
        } else if self.euler_index >= axes {
            Some(format!("euler_index {} out of range (< {axes})", self.euler_index))
        } else if self.omega_index >= axes {
            Some(format!("omega_index {} out of range (< {axes})", self.omega_index))
        } else {
            None
        }
    }
}

/// Outer stage: controller plus its gain cell.
pub struct OuterStage {
    pub controller: Box<dyn Controller>,
    pub gains: Share<LoopGains>,
}

pub struct ControlTask {
    state: ControlState,
    cfg: ChannelConfig,
    console: ConsoleHandle,

    inner: Box<dyn Controller>,
    inner_gains: Share<LoopGains>,
    outer: Option<OuterStage>,

    closed_loop: Share<bool>,
    imu_ready: Share<bool>,
    touch_ready: Share<bool>,
    direct_setpoint: Share<bool>,
    setpoint: Share<f32>,
    print_request: Share<bool>,
    euler: Share<Vector3>,
    omega: Share<Vector3>,
    ball: Share<BallState>,
    duty: Share<f32>,

    reference: f32,
    last_inner: Option<Tick>,
    last_outer: Option<Tick>,
    /// Wiring error reported by the first step.
    miswired: Option<String>,
}

impl ControlTask {
    /// Inner-loop only task. Add the outer loop with [`Self::with_outer`].
    ///
    /// An out-of-range index in `cfg` makes the first step fail with
    /// [`TaskError::InvalidState`].
    pub fn new(
        cfg: ChannelConfig,
        inner: Box<dyn Controller>,
        console: ConsoleHandle,
        shares: &Shares,
    ) -> Self {
        let miswired = cfg.check();
        let ch = cfg.channel_id.min(CHANNELS - 1);
        Self {
            state: ControlState::Init,
            cfg,
            console,
            inner,
            inner_gains: shares.inner_gains.clone(),
            outer: None,
            closed_loop: shares.closed_loop.clone(),
            imu_ready: shares.imu_ready.clone(),
            touch_ready: shares.touch_ready.clone(),
            direct_setpoint: shares.direct_setpoint.clone(),
            setpoint: shares.setpoints[ch].clone(),
            print_request: shares.print_request[ch].clone(),
            euler: shares.euler.clone(),
            omega: shares.omega.clone(),
            ball: shares.ball.clone(),
            duty: shares.duty[ch].clone(),
            reference: 0.0,
            last_inner: None,
            last_outer: None,
            miswired,
        }
    }

    pub fn with_outer(mut self, controller: Box<dyn Controller>, shares: &Shares) -> Self {
        self.outer = Some(OuterStage {
            controller,
            gains: shares.outer_gains.clone(),
        });
        self
    }

    pub fn reference(&self) -> f32 {
        self.reference
    }

    fn first_stage(&self) -> ControlState {
        if self.outer.is_some() {
            ControlState::RunOuter
        } else {
            ControlState::RunInner
        }
    }

    fn go_idle(&mut self) {
        self.duty.write(0.0);
        self.inner.reset();
        if let Some(outer) = self.outer.as_mut() {
            outer.controller.reset();
        }
        self.reference = 0.0;
        self.last_inner = None;
        self.last_outer = None;
        self.state = ControlState::Idle;
    }

    fn elapsed(last: &mut Option<Tick>, ctx: StepContext) -> f32 {
        let dt = match *last {
            Some(t) => ctx.width.diff(ctx.now, t),
            None => i64::from(ctx.period),
        };
        *last = Some(ctx.now);
        ticks_to_secs(dt)
    }

    fn run_outer(&mut self, ctx: StepContext) -> Result<(), TaskError> {
        let dt = Self::elapsed(&mut self.last_outer, ctx);
        let Some(outer) = self.outer.as_mut() else {
            return Err(TaskError::InvalidState {
                task: self.cfg.name,
                state: ControlState::RunOuter.label(),
                detail: "channel has no outer stage".into(),
            });
        };

        if self.direct_setpoint.read() {
            self.reference = self.setpoint.read();
        } else {
            let ball = self.ball.read();
            if ball.contact && self.touch_ready.read() {
                let (position, velocity) = ball.axis(self.cfg.ball_axis);
                outer.controller.set_gains(outer.gains.read());
                outer.controller.set_reference(0.0);
                self.reference = outer
                    .controller
                    .run(Measurement { position, velocity }, dt);
            } else {
                outer.controller.reset();
                self.reference = 0.0;
            }
        }
        self.state = ControlState::RunInner;
        Ok(())
    }

    fn run_inner(&mut self, ctx: StepContext) {
        let dt = Self::elapsed(&mut self.last_inner, ctx);
        let euler = self.euler.read();
        let omega = self.omega.read();
        let measurement = Measurement {
            position: euler[self.cfg.euler_index],
            velocity: omega[self.cfg.omega_index],
        };

        self.inner.set_gains(self.inner_gains.read());
        self.inner.set_reference(self.reference);
        let duty = self.inner.run(measurement, dt);
        self.duty.write(duty);

        if self.print_request.read() {
            self.print_request.write(false);
            self.console.write_line(&format!(
                "Channel {}: reference {:.2} deg, angle {:.2} deg, duty {:.1}%",
                self.cfg.channel_id + 1,
                self.reference,
                measurement.position,
                duty
            ));
        }

        self.state = self.first_stage();
    }
}

impl StateMachine for ControlTask {
    type State = ControlState;

    fn state(&self) -> ControlState {
        self.state
    }

    fn advance(&mut self, ctx: StepContext) -> Result<(), TaskError> {
        if let Some(detail) = self.miswired.take() {
            return Err(TaskError::InvalidState {
                task: self.cfg.name,
                state: self.state.label(),
                detail,
            });
        }
        let enabled = self.closed_loop.read() && self.imu_ready.read();
        match self.state {
            ControlState::Init => self.go_idle(),
            ControlState::Idle => {
                if enabled {
                    debug!(task = self.cfg.name, "closed loop engaged");
                    self.state = self.first_stage();
                }
            }
            ControlState::RunOuter | ControlState::RunInner if !enabled => self.go_idle(),
            ControlState::RunOuter => self.run_outer(ctx)?,
            ControlState::RunInner => self.run_inner(ctx),
        }
        Ok(())
    }
}
