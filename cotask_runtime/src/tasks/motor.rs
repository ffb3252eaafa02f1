//! Motor task: applies its duty cell to the driver each period.

use cotask_common::hal::{DriverFault, Motor};
use tracing::{info, warn};

use crate::share::Share;
use crate::system::Shares;
use crate::task::{StateMachine, StepContext, TaskError, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Init,
    Run,
}

impl TaskState for MotorState {
    fn label(self) -> &'static str {
        match self {
            Self::Init => "S_INIT",
            Self::Run => "S_RUN",
        }
    }
}

pub struct MotorTask {
    state: MotorState,
    channel: usize,
    motor: Box<dyn Motor>,
    duty: Share<f32>,
    clear_fault: Share<bool>,
    duty_limit: f32,
    latched: DriverFault,
}

impl MotorTask {
    pub fn new(channel: usize, motor: Box<dyn Motor>, shares: &Shares, duty_limit: f32) -> Self {
        Self {
            state: MotorState::Init,
            channel,
            motor,
            duty: shares.duty[channel].clone(),
            clear_fault: shares.clear_fault[channel].clone(),
            duty_limit,
            latched: DriverFault::empty(),
        }
    }
}

impl StateMachine for MotorTask {
    type State = MotorState;

    fn state(&self) -> MotorState {
        self.state
    }

    fn advance(&mut self, _ctx: StepContext) -> Result<(), TaskError> {
        match self.state {
            MotorState::Init => {
                self.motor.set_duty(0.0);
                self.motor.enable();
                self.state = MotorState::Run;
            }
            MotorState::Run => {
                if self.clear_fault.read() {
                    self.motor.enable();
                    self.clear_fault.write(false);
                    info!(channel = self.channel + 1, "motor driver re-enabled");
                }
                let faults = self.motor.faults();
                if faults != self.latched {
                    if !faults.is_empty() {
                        warn!(channel = self.channel + 1, ?faults, "motor driver fault");
                    }
                    self.latched = faults;
                }
                let duty = self.duty.read().clamp(-self.duty_limit, self.duty_limit);
                self.motor.set_duty(duty);
            }
        }
        Ok(())
    }

    fn safe_stop(&mut self) {
        self.motor.set_duty(0.0);
    }
}
