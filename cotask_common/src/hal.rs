//! Hardware boundary: driver traits and the value types that cross them.
//!
//! Drivers are synchronous and infallible at the call site. A failing sensor
//! shows up as a wrong reading, never as an error value. Register maps and
//! bus protocols live behind these traits and are out of scope here.
//!
//! # Call contract
//!
//! | Trait | Called from | Per-tick cost |
//! |-------|-------------|---------------|
//! | [`Motor`] | motor task | one duty write |
//! | [`Encoder`] | encoder task | one timer read |
//! | [`Imu`] | IMU task | one bus transaction |
//! | [`TouchPanel`] | touch-panel task | three ADC scans |

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::IMU_CAL_BYTES;

/// Three-component vector: `[heading, roll, pitch]` for Euler angles,
/// `[x, y, z]` for angular rates.
pub type Vector3 = [f32; 3];

/// Raw IMU calibration blob.
pub type ImuCalibration = [u8; IMU_CAL_BYTES];

bitflags! {
    /// Motor-driver fault flags reported by the H-bridge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DriverFault: u8 {
        /// Over-current protection tripped.
        const OVERCURRENT  = 0x01;
        /// Thermal shutdown.
        const OVERTEMP     = 0x02;
        /// Supply under-voltage lockout.
        const UNDERVOLTAGE = 0x04;
    }
}

/// Per-subsystem IMU calibration scores (0..=3 each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub mag: u8,
    pub acc: u8,
    pub gyr: u8,
    pub sys: u8,
}

impl CalibrationStatus {
    /// True when every sub-score has reached `target`.
    #[inline]
    pub const fn all_at_least(&self, target: u8) -> bool {
        self.mag >= target && self.acc >= target && self.gyr >= target && self.sys >= target
    }
}

/// IMU operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImuMode {
    /// Configuration mode, required to write calibration coefficients.
    Config = 0,
    /// Nine-degree-of-freedom fusion mode.
    Ndof = 12,
}

/// One touch-panel scan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchSample {
    /// Calibrated x position [mm].
    pub x: f32,
    /// Calibrated y position [mm].
    pub y: f32,
    /// Whether anything is touching the panel.
    pub contact: bool,
}

/// Filtered ball state published by the touch-panel task.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BallState {
    pub x: f32,
    pub vx: f32,
    pub y: f32,
    pub vy: f32,
    pub contact: bool,
}

impl BallState {
    /// Position and velocity along one panel axis (0 = x, 1 = y).
    #[inline]
    pub fn axis(&self, axis: usize) -> (f32, f32) {
        if axis == 0 {
            (self.x, self.vx)
        } else {
            (self.y, self.vy)
        }
    }
}

/// Encoder reading published by the encoder task.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncoderReading {
    /// Tick at which the reading was taken.
    pub tick: u32,
    /// Accumulated position [rad].
    pub position: f32,
    /// Change since the previous update [rad].
    pub delta: f32,
    /// Angular velocity [rad/s].
    pub velocity: f32,
}

/// PWM motor channel behind an H-bridge.
pub trait Motor {
    /// Apply a signed duty cycle in percent, `[-100, 100]`.
    fn set_duty(&mut self, percent: f32);

    /// Re-enable the bridge after a fault.
    fn enable(&mut self) {}

    /// Currently latched driver faults.
    fn faults(&self) -> DriverFault {
        DriverFault::empty()
    }
}

/// Quadrature encoder on a hardware timer.
pub trait Encoder {
    /// Sample the timer and accumulate position.
    fn update(&mut self);
    /// Accumulated position [rad].
    fn position(&self) -> f32;
    /// Delta of the last update [rad].
    fn delta(&self) -> f32;
    /// Velocity estimate from the last update [rad/s].
    fn velocity(&self) -> f32;
    /// Reset the accumulated position to zero.
    fn zero(&mut self);
}

/// Absolute-orientation IMU.
pub trait Imu {
    fn set_mode(&mut self, mode: ImuMode);
    /// Euler angles `[heading, roll, pitch]` [deg].
    fn euler(&mut self) -> Vector3;
    /// Angular rates `[x, y, z]` [deg/s].
    fn omega(&mut self) -> Vector3;
    fn calibration_status(&mut self) -> CalibrationStatus;
    fn calibration_coefficients(&mut self) -> ImuCalibration;
    fn set_calibration_coefficients(&mut self, coefficients: &ImuCalibration);
}

/// Resistive touch panel.
pub trait TouchPanel {
    /// Scan x, y and contact. Positions are raw until calibration is applied.
    fn scan_xyz(&mut self) -> TouchSample;
    /// Install affine calibration `x = kxx*rx + kxy*ry + x0`, `y = kyx*rx + kyy*ry + y0`.
    fn set_calibration(&mut self, coefficients: &TouchCalibration);
}

/// Affine touch-panel calibration, stored in file order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchCalibration {
    pub kxx: f32,
    pub kxy: f32,
    pub x0: f32,
    pub kyx: f32,
    pub kyy: f32,
    pub y0: f32,
}

impl TouchCalibration {
    /// Identity map (raw readings pass through).
    pub const IDENTITY: Self = Self {
        kxx: 1.0,
        kxy: 0.0,
        x0: 0.0,
        kyx: 0.0,
        kyy: 1.0,
        y0: 0.0,
    };

    /// Coefficients in persisted order.
    pub const fn to_array(&self) -> [f32; 6] {
        [self.kxx, self.kxy, self.x0, self.kyx, self.kyy, self.y0]
    }

    pub const fn from_array(v: [f32; 6]) -> Self {
        Self {
            kxx: v[0],
            kxy: v[1],
            x0: v[2],
            kyx: v[3],
            kyy: v[4],
            y0: v[5],
        }
    }

    /// Map a raw reading through the calibration.
    #[inline]
    pub fn apply(&self, raw_x: f32, raw_y: f32) -> (f32, f32) {
        (
            self.kxx * raw_x + self.kxy * raw_y + self.x0,
            self.kyx * raw_x + self.kyy * raw_y + self.y0,
        )
    }
}

impl Default for TouchCalibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}
