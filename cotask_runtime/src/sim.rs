//! Simulated drivers over a simple ball-on-platform model.
//!
//! Each motor drives one platform tilt axis at a rate proportional to duty.
//! The ball rolls under gravity along the panel axis that tilt acts on and
//! stops at the panel edge. The plant advances whenever a motor duty is
//! applied, by that motor's period.
//!
//! The touch panel plays back the five-point calibration touches by itself
//! while an identity calibration is installed, so manual calibration
//! completes without an operator.

use std::cell::RefCell;
use std::rc::Rc;

use cotask_common::consts::{CHANNELS, IMU_CAL_BYTES};
use cotask_common::hal::{
    CalibrationStatus, DriverFault, Encoder, Imu, ImuCalibration, ImuMode, Motor, TouchCalibration,
    TouchPanel, TouchSample, Vector3,
};

use crate::system::Drivers;
use crate::tasks::touchpad::CAL_POINTS;

/// Platform tilt rate per percent duty [deg/s].
const TILT_RATE_PER_DUTY: f32 = 0.6;
/// Mechanical tilt stop [deg].
const MAX_TILT_DEG: f32 = 20.0;
/// Rolling-ball acceleration per unit sine of tilt [mm/s²] (5/7 g).
const BALL_ACCEL: f32 = 7007.0;
/// Half-extent of the panel along x and y [mm].
const PANEL_HALF: [f32; CHANNELS] = [88.0, 50.0];
/// Motor shaft travel per degree of platform tilt [rad].
const SHAFT_RAD_PER_DEG: f32 = 0.35;
/// Raw ADC offset and counts per mm of the simulated panel.
const RAW_ORIGIN: (f32, f32) = (2048.0, 2048.0);
const RAW_PER_MM: (f32, f32) = (11.5, 19.0);

/// Plant state shared by the simulated drivers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plant {
    /// Platform tilt per axis [deg].
    pub angle: [f32; CHANNELS],
    /// Platform tilt rate per axis [deg/s].
    pub rate: [f32; CHANNELS],
    /// Ball position [mm].
    pub ball: [f32; CHANNELS],
    /// Ball velocity [mm/s].
    pub ball_velocity: [f32; CHANNELS],
    /// Motor-1 shaft angle [rad].
    pub shaft: f32,
}

impl Plant {
    /// Advance one axis by `dt` seconds at the given duty.
    pub fn drive(&mut self, axis: usize, duty: f32, dt: f32) {
        let mut rate = duty * TILT_RATE_PER_DUTY;
        let target = self.angle[axis] + rate * dt;
        let angle = target.clamp(-MAX_TILT_DEG, MAX_TILT_DEG);
        if angle != target {
            rate = (angle - self.angle[axis]) / dt;
        }
        self.angle[axis] = angle;
        self.rate[axis] = rate;
        if axis == 0 {
            self.shaft += rate * dt * SHAFT_RAD_PER_DEG;
        }

        let accel = BALL_ACCEL * angle.to_radians().sin();
        self.ball_velocity[axis] += accel * dt;
        self.ball[axis] += self.ball_velocity[axis] * dt;
        let half = PANEL_HALF[axis];
        if self.ball[axis].abs() > half {
            self.ball[axis] = self.ball[axis].clamp(-half, half);
            self.ball_velocity[axis] = 0.0;
        }
    }
}

type PlantHandle = Rc<RefCell<Plant>>;

/// Owner of the simulated plant; hands out drivers bound to it.
#[derive(Debug, Clone, Default)]
pub struct SimPlatform {
    plant: PlantHandle,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the plant.
    pub fn plant(&self) -> Plant {
        *self.plant.borrow()
    }

    /// Place the ball at rest.
    pub fn set_ball(&self, x: f32, y: f32) {
        let mut p = self.plant.borrow_mut();
        p.ball = [x, y];
        p.ball_velocity = [0.0; CHANNELS];
    }

    /// Driver set. `motor_period_s` is the step the plant advances per duty
    /// write; `encoder_period_s` scales encoder velocity.
    pub fn drivers(&self, motor_period_s: f32, encoder_period_s: f32) -> Drivers {
        Drivers {
            motors: [
                Box::new(SimMotor::new(self.plant.clone(), 0, motor_period_s)),
                Box::new(SimMotor::new(self.plant.clone(), 1, motor_period_s)),
            ],
            encoder: Box::new(SimEncoder::new(self.plant.clone(), encoder_period_s)),
            imu: Box::new(SimImu::new(self.plant.clone())),
            touch_panel: Box::new(SimTouchPanel::new(self.plant.clone())),
        }
    }
}

// ─── Motor ──────────────────────────────────────────────────────────

pub struct SimMotor {
    plant: PlantHandle,
    axis: usize,
    dt: f32,
    enabled: bool,
    fault: DriverFault,
}

impl SimMotor {
    fn new(plant: PlantHandle, axis: usize, dt: f32) -> Self {
        Self {
            plant,
            axis,
            dt,
            enabled: false,
            fault: DriverFault::empty(),
        }
    }

    /// Latch a driver fault; the motor stops until re-enabled.
    pub fn inject_fault(&mut self, fault: DriverFault) {
        self.fault |= fault;
        self.enabled = false;
    }
}

impl Motor for SimMotor {
    fn set_duty(&mut self, percent: f32) {
        let duty = if self.enabled { percent } else { 0.0 };
        self.plant.borrow_mut().drive(self.axis, duty, self.dt);
    }

    fn enable(&mut self) {
        self.fault = DriverFault::empty();
        self.enabled = true;
    }

    fn faults(&self) -> DriverFault {
        self.fault
    }
}

// ─── Encoder ────────────────────────────────────────────────────────

pub struct SimEncoder {
    plant: PlantHandle,
    dt: f32,
    last_shaft: f32,
    position: f32,
    delta: f32,
}

impl SimEncoder {
    fn new(plant: PlantHandle, dt: f32) -> Self {
        let last_shaft = plant.borrow().shaft;
        Self {
            plant,
            dt,
            last_shaft,
            position: 0.0,
            delta: 0.0,
        }
    }
}

impl Encoder for SimEncoder {
    fn update(&mut self) {
        let shaft = self.plant.borrow().shaft;
        self.delta = shaft - self.last_shaft;
        self.last_shaft = shaft;
        self.position += self.delta;
    }

    fn position(&self) -> f32 {
        self.position
    }

    fn delta(&self) -> f32 {
        self.delta
    }

    fn velocity(&self) -> f32 {
        if self.dt > 0.0 { self.delta / self.dt } else { 0.0 }
    }

    fn zero(&mut self) {
        self.position = 0.0;
        self.delta = 0.0;
        self.last_shaft = self.plant.borrow().shaft;
    }
}

// ─── IMU ────────────────────────────────────────────────────────────

/// Calibration scores climb by one per status read until fully calibrated.
pub struct SimImu {
    plant: PlantHandle,
    mode: ImuMode,
    score: u8,
    coefficients: ImuCalibration,
}

impl SimImu {
    fn new(plant: PlantHandle) -> Self {
        let mut coefficients = [0u8; IMU_CAL_BYTES];
        for (i, c) in coefficients.iter_mut().enumerate() {
            *c = (i as u8).wrapping_mul(7);
        }
        Self {
            plant,
            mode: ImuMode::Config,
            score: 0,
            coefficients,
        }
    }
}

impl Imu for SimImu {
    fn set_mode(&mut self, mode: ImuMode) {
        self.mode = mode;
    }

    fn euler(&mut self) -> Vector3 {
        if self.mode != ImuMode::Ndof {
            return [0.0; 3];
        }
        let p = self.plant.borrow();
        [0.0, p.angle[1], p.angle[0]]
    }

    fn omega(&mut self) -> Vector3 {
        if self.mode != ImuMode::Ndof {
            return [0.0; 3];
        }
        let p = self.plant.borrow();
        [p.rate[1], p.rate[0], 0.0]
    }

    fn calibration_status(&mut self) -> CalibrationStatus {
        self.score = (self.score + 1).min(3);
        CalibrationStatus {
            mag: self.score,
            acc: self.score,
            gyr: 3,
            sys: self.score,
        }
    }

    fn calibration_coefficients(&mut self) -> ImuCalibration {
        self.coefficients
    }

    fn set_calibration_coefficients(&mut self, coefficients: &ImuCalibration) {
        self.coefficients = *coefficients;
        self.score = 3;
    }
}

// ─── Touch Panel ────────────────────────────────────────────────────

pub struct SimTouchPanel {
    plant: PlantHandle,
    calibration: TouchCalibration,
    script_scan: usize,
}

impl SimTouchPanel {
    fn new(plant: PlantHandle) -> Self {
        Self {
            plant,
            calibration: TouchCalibration::IDENTITY,
            script_scan: 0,
        }
    }

    /// Raw reading for a position in mm.
    pub fn raw_of(x: f32, y: f32) -> (f32, f32) {
        (
            RAW_ORIGIN.0 + RAW_PER_MM.0 * x,
            RAW_ORIGIN.1 + RAW_PER_MM.1 * y,
        )
    }

    /// Touch, hold, release per calibration point.
    fn scripted(&mut self) -> TouchSample {
        let phase = self.script_scan % 4;
        let point = CAL_POINTS[(self.script_scan / 4) % CAL_POINTS.len()];
        self.script_scan += 1;
        if phase == 1 || phase == 2 {
            let (x, y) = Self::raw_of(point.0, point.1);
            TouchSample {
                x,
                y,
                contact: true,
            }
        } else {
            TouchSample::default()
        }
    }
}

impl TouchPanel for SimTouchPanel {
    fn scan_xyz(&mut self) -> TouchSample {
        if self.calibration == TouchCalibration::IDENTITY {
            return self.scripted();
        }
        let [bx, by] = self.plant.borrow().ball;
        let (rx, ry) = Self::raw_of(bx, by);
        let (x, y) = self.calibration.apply(rx, ry);
        TouchSample {
            x,
            y,
            contact: true,
        }
    }

    fn set_calibration(&mut self, coefficients: &TouchCalibration) {
        self.calibration = *coefficients;
        self.script_scan = 0;
    }
}
