//! Prelude module for common re-exports.
//!
//! ```rust
//! use cotask_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::system::{LoopGains, SystemConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CHANNELS, DUTY_LIMIT, MAX_SAMPLES};

// ─── Hardware Boundary ──────────────────────────────────────────────
pub use crate::hal::{
    BallState, CalibrationStatus, DriverFault, Encoder, EncoderReading, Imu, ImuMode, Motor,
    TouchCalibration, TouchPanel, TouchSample, Vector3,
};
