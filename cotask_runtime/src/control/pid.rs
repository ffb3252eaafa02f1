//! PID controller with backward Euler integration, filtered derivative (Tf)
//! and anti-windup via back-calculation (Tt).
//!
//! The derivative acts on the measured rate, not on the error, so a
//! setpoint step produces no derivative kick. Zero Ki disables the integral;
//! zero Kd disables the derivative.

use cotask_common::system::LoopGains;

use super::{Controller, Measurement};

/// Internal state preserved across updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Integral accumulator.
    integral: f32,
    /// Filtered derivative term.
    derivative_filtered: f32,
    /// Previous raw (unsaturated) output, for anti-windup.
    prev_raw_output: f32,
}

impl PidState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn integral(&self) -> f32 {
        self.integral
    }
}

/// Full gain set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    /// Integral gain (0 = disabled).
    pub ki: f32,
    /// Derivative gain (0 = disabled).
    pub kd: f32,
    /// Derivative filter time constant [s] (0 = unfiltered).
    pub tf: f32,
    /// Anti-windup tracking time constant [s] (0 = disabled).
    pub tt: f32,
    /// Output saturation limit (symmetric).
    pub out_max: f32,
}

impl PidGains {
    pub const fn new(gains: LoopGains, out_max: f32) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            tf: 0.0,
            tt: 0.0,
            out_max,
        }
    }
}

/// One PID update.
///
/// `error` is reference minus position, `rate` the measured rate of the
/// position. Returns the unsaturated output.
///
/// Unlike the textbook law `kd · d(error)/dt`, the derivative term is
/// `-kd · rate`: it damps the measured motion and ignores reference steps.
#[inline]
pub fn pid_compute(state: &mut PidState, gains: &PidGains, error: f32, rate: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }

    // ── P term ──────────────────────────────────────────────
    let p_term = gains.kp * error;

    // ── I term (backward Euler) ─────────────────────────────
    let i_term = if gains.ki != 0.0 {
        // Back-calculation: feed the previous saturation excess back.
        let anti_windup = if gains.tt > 0.0 && gains.out_max > 0.0 {
            let saturated = state.prev_raw_output.clamp(-gains.out_max, gains.out_max);
            (saturated - state.prev_raw_output) / gains.tt
        } else {
            0.0
        };
        state.integral += (gains.ki * error + anti_windup) * dt;
        state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    // ── D term on measurement ───────────────────────────────
    let d_term = if gains.kd != 0.0 {
        let raw_derivative = -rate;
        if gains.tf > 0.0 {
            let alpha = dt / (gains.tf + dt);
            state.derivative_filtered += alpha * (raw_derivative - state.derivative_filtered);
            gains.kd * state.derivative_filtered
        } else {
            gains.kd * raw_derivative
        }
    } else {
        state.derivative_filtered = 0.0;
        0.0
    };

    let raw_output = p_term + i_term + d_term;
    state.prev_raw_output = raw_output;
    raw_output
}

/// [`Controller`] backed by [`pid_compute`], saturating at `out_max`.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    state: PidState,
    reference: f32,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            state: PidState::default(),
            reference: 0.0,
        }
    }

    /// Default derivative filter and anti-windup time constants.
    pub fn with_filters(mut self, tf: f32, tt: f32) -> Self {
        self.gains.tf = tf;
        self.gains.tt = tt;
        self
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    pub fn reference(&self) -> f32 {
        self.reference
    }
}

impl Controller for PidController {
    fn set_gains(&mut self, gains: LoopGains) {
        self.gains.kp = gains.kp;
        self.gains.kd = gains.kd;
        self.gains.ki = gains.ki;
    }

    fn set_reference(&mut self, reference: f32) {
        self.reference = reference;
    }

    fn run(&mut self, measurement: Measurement, dt: f32) -> f32 {
        let error = self.reference - measurement.position;
        let raw = pid_compute(&mut self.state, &self.gains, error, measurement.velocity, dt);
        raw.clamp(-self.gains.out_max, self.gains.out_max)
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
