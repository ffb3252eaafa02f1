//! System-wide constants for the cotask workspace.
//!
//! Single source of truth for numeric limits and default paths.

use static_assertions::const_assert;

/// Maximum number of samples a single collection run can hold.
pub const MAX_SAMPLES: usize = 301;

/// Default tick counter width in bits (microsecond counter).
pub const DEFAULT_TICK_BITS: u32 = 32;

/// Maximum supported tick counter width in bits.
pub const MAX_TICK_BITS: u32 = 32;

/// Capacity of the numeric entry buffer (characters).
pub const ENTRY_CAPACITY: usize = 16;

/// Number of IMU calibration coefficient bytes.
pub const IMU_CAL_BYTES: usize = 22;

/// Number of touch-panel calibration coefficients (Kxx, Kxy, x0, Kyx, Kyy, y0).
pub const TOUCH_CAL_COEFFS: usize = 6;

/// Number of control channels (motors) on the platform.
pub const CHANNELS: usize = 2;

/// Duty cycle bound accepted by motor drivers [%].
pub const DUTY_LIMIT: f32 = 100.0;

/// Default IMU calibration file name.
pub const DEFAULT_IMU_CAL_FILE: &str = "IMU_cal_coeffs.txt";

/// Default touch-panel calibration file name.
pub const DEFAULT_TOUCH_CAL_FILE: &str = "Touchpad_cal_coeffs.txt";

const_assert!(DEFAULT_TICK_BITS <= MAX_TICK_BITS);
const_assert!(MAX_SAMPLES > 0);
const_assert!(ENTRY_CAPACITY >= 8);
