//! Concrete task state machines.
//!
//! | Task | Writes | Reads |
//! |------|--------|-------|
//! | [`user::UserTask`] | duty, gains, setpoints, flags | readings |
//! | [`encoder::EncoderTask`] | encoder, zero flag (clear) | zero flag |
//! | [`imu::ImuTask`] | euler, omega, status, ready | |
//! | [`touchpad::TouchpadTask`] | ball, ready | |
//! | [`control::ControlTask`] | duty, print flag (clear) | gains, readings, flags |
//! | [`motor::MotorTask`] | fault flag (clear) | duty |

pub mod control;
pub mod encoder;
pub mod imu;
pub mod motor;
pub mod touchpad;
pub mod user;

pub use control::{ChannelConfig, ControlState, ControlTask};
pub use encoder::{EncoderState, EncoderTask};
pub use imu::{ImuState, ImuTask};
pub use motor::{MotorState, MotorTask};
pub use touchpad::{TouchState, TouchpadTask};
pub use user::{UserSettings, UserState, UserTask};
