//! Encoder task: samples the encoder every period and publishes the reading.
//! A raised zero flag is serviced on the next step and then cleared.

use cotask_common::hal::{Encoder, EncoderReading};

use crate::share::Share;
use crate::system::Shares;
use crate::task::{StateMachine, StepContext, TaskError, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Init,
    Update,
    Zero,
}

impl TaskState for EncoderState {
    fn label(self) -> &'static str {
        match self {
            Self::Init => "S_INIT",
            Self::Update => "S_UPDATE",
            Self::Zero => "S_ZERO",
        }
    }
}

pub struct EncoderTask {
    state: EncoderState,
    encoder: Box<dyn Encoder>,
    reading: Share<EncoderReading>,
    zero_flag: Share<bool>,
}

impl EncoderTask {
    pub fn new(encoder: Box<dyn Encoder>, shares: &Shares) -> Self {
        Self {
            state: EncoderState::Init,
            encoder,
            reading: shares.encoder.clone(),
            zero_flag: shares.zero_encoder.clone(),
        }
    }

    fn publish(&self, tick: u32) {
        self.reading.write(EncoderReading {
            tick,
            position: self.encoder.position(),
            delta: self.encoder.delta(),
            velocity: self.encoder.velocity(),
        });
    }
}

impl StateMachine for EncoderTask {
    type State = EncoderState;

    fn state(&self) -> EncoderState {
        self.state
    }

    fn advance(&mut self, ctx: StepContext) -> Result<(), TaskError> {
        match self.state {
            EncoderState::Init => {
                self.encoder.zero();
                self.publish(ctx.now);
                self.state = EncoderState::Update;
            }
            EncoderState::Update => {
                if self.zero_flag.read() {
                    self.state = EncoderState::Zero;
                } else {
                    self.encoder.update();
                    self.publish(ctx.now);
                }
            }
            EncoderState::Zero => {
                self.encoder.zero();
                self.publish(ctx.now);
                self.zero_flag.write(false);
                self.state = EncoderState::Update;
            }
        }
        Ok(())
    }
}
