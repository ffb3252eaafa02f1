//! Runtime configuration schema.
//!
//! Every section carries serde defaults, so an empty TOML document yields a
//! complete, valid configuration. [`SystemConfig::validate`] checks ranges
//! after parsing.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "balance-platform"
//!
//! [scheduler]
//! tick_bits = 30
//!
//! [periods]
//! user = 50_000
//! control = 10_000
//!
//! [ui]
//! collect_capacity = 200
//! data_file = "Data.csv"
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_IMU_CAL_FILE, DEFAULT_TICK_BITS, DEFAULT_TOUCH_CAL_FILE, DUTY_LIMIT, MAX_SAMPLES,
    MAX_TICK_BITS,
};

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub periods: PeriodConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

impl SystemConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.scheduler.validate()?;
        self.periods.validate(self.scheduler.tick_bits)?;
        self.ui.validate()?;
        self.control.validate()?;
        self.calibration.validate()?;
        self.filter.validate()?;
        Ok(())
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Width of the tick counter in bits (1..=32).
    pub tick_bits: u32,
    /// Sleep after a pass in which no task fired [µs]. 0 = busy loop.
    pub idle_sleep_us: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_bits: DEFAULT_TICK_BITS,
            idle_sleep_us: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_bits == 0 || self.tick_bits > MAX_TICK_BITS {
            return Err(ConfigError::ValidationError(format!(
                "tick_bits {} out of range [1, {MAX_TICK_BITS}]",
                self.tick_bits
            )));
        }
        Ok(())
    }
}

/// `[periods]` section, all values in ticks (microseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    pub user: u32,
    pub motor: u32,
    pub encoder: u32,
    pub imu: u32,
    pub touchpad: u32,
    pub control: u32,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            user: 50_000,
            motor: 10_000,
            encoder: 10_000,
            imu: 10_000,
            touchpad: 5_000,
            control: 10_000,
        }
    }
}

impl PeriodConfig {
    /// Periods must be non-zero and below half the tick range, otherwise the
    /// due-check cannot tell "late" from "early".
    pub fn validate(&self, tick_bits: u32) -> Result<(), ConfigError> {
        let half_range = 1u64 << (tick_bits.clamp(1, MAX_TICK_BITS) - 1);
        for (name, period) in [
            ("user", self.user),
            ("motor", self.motor),
            ("encoder", self.encoder),
            ("imu", self.imu),
            ("touchpad", self.touchpad),
            ("control", self.control),
        ] {
            if period == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "periods.{name} must be non-zero"
                )));
            }
            if u64::from(period) >= half_range {
                return Err(ConfigError::ValidationError(format!(
                    "periods.{name} = {period} must be below half the tick range ({half_range})"
                )));
            }
        }
        Ok(())
    }
}

/// `[ui]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Samples per collection run (1..=MAX_SAMPLES).
    pub collect_capacity: usize,
    /// Optional CSV file the drain state appends to.
    pub data_file: Option<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            collect_capacity: MAX_SAMPLES,
            data_file: None,
        }
    }
}

impl UiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collect_capacity == 0 || self.collect_capacity > MAX_SAMPLES {
            return Err(ConfigError::ValidationError(format!(
                "ui.collect_capacity {} out of range [1, {MAX_SAMPLES}]",
                self.collect_capacity
            )));
        }
        Ok(())
    }
}

/// PID gain triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopGains {
    pub kp: f32,
    pub kd: f32,
    pub ki: f32,
}

/// `[control]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Duty saturation [%].
    pub duty_limit: f32,
    /// Bound for direct angle setpoints [deg].
    pub setpoint_limit: f32,
    /// Upper bound for gains entered at the console (lower bound is 0).
    pub gain_limit: f32,
    /// Saturation of the outer loop output (reference angle) [deg].
    pub outer_output_limit: f32,
    /// Initial inner-loop gains (platform angle → duty).
    pub inner: LoopGains,
    /// Initial outer-loop gains (ball position → angle).
    pub outer: LoopGains,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            duty_limit: DUTY_LIMIT,
            setpoint_limit: 15.0,
            gain_limit: 1000.0,
            outer_output_limit: 10.0,
            inner: LoopGains::default(),
            outer: LoopGains::default(),
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.duty_limit > 0.0 && self.duty_limit <= DUTY_LIMIT) {
            return Err(ConfigError::ValidationError(format!(
                "control.duty_limit {} out of range (0, {DUTY_LIMIT}]",
                self.duty_limit
            )));
        }
        for (name, value) in [
            ("setpoint_limit", self.setpoint_limit),
            ("gain_limit", self.gain_limit),
            ("outer_output_limit", self.outer_output_limit),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "control.{name} must be positive and finite, got {value}"
                )));
            }
        }
        for (name, gains) in [("inner", self.inner), ("outer", self.outer)] {
            for value in [gains.kp, gains.kd, gains.ki] {
                if !(0.0..=self.gain_limit).contains(&value) {
                    return Err(ConfigError::ValidationError(format!(
                        "control.{name} gain {value} out of range [0, {}]",
                        self.gain_limit
                    )));
                }
            }
        }
        Ok(())
    }
}

/// `[calibration]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub imu_file: String,
    pub touchpad_file: String,
    /// Sub-score every IMU calibration channel must reach.
    pub imu_target: u8,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            imu_file: DEFAULT_IMU_CAL_FILE.to_string(),
            touchpad_file: DEFAULT_TOUCH_CAL_FILE.to_string(),
            imu_target: 3,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.imu_file.is_empty() || self.touchpad_file.is_empty() {
            return Err(ConfigError::ValidationError(
                "calibration file names cannot be empty".to_string(),
            ));
        }
        if self.imu_target > 3 {
            return Err(ConfigError::ValidationError(format!(
                "calibration.imu_target {} out of range [0, 3]",
                self.imu_target
            )));
        }
        Ok(())
    }
}

/// `[filter]` section: alpha-beta filter for the touch panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub alpha: f32,
    pub beta: f32,
    /// Consecutive no-contact runs after which the estimate is reset.
    pub lost_contact_passes: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            beta: 0.005,
            lost_contact_passes: 10,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) || !(0.0..=1.0).contains(&self.beta) {
            return Err(ConfigError::ValidationError(format!(
                "filter alpha/beta must lie in [0, 1], got {}/{}",
                self.alpha, self.beta
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    #[test]
    fn empty_document_is_valid() {
        let config = SystemConfig::from_toml("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.periods.user, 50_000);
        assert_eq!(config.ui.collect_capacity, MAX_SAMPLES);
        assert_eq!(config.scheduler.tick_bits, DEFAULT_TICK_BITS);
    }

    #[test]
    fn period_must_fit_half_range() {
        let mut config = SystemConfig::default();
        config.scheduler.tick_bits = 16;
        config.periods.control = 40_000;
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("periods.control"), "got: {msg}");
    }

    #[test]
    fn zero_period_rejected() {
        let mut config = SystemConfig::default();
        config.periods.motor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tick_bits_range() {
        let mut config = SystemConfig::default();
        config.scheduler.tick_bits = 33;
        assert!(config.validate().is_err());
        config.scheduler.tick_bits = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn collect_capacity_bounded() {
        let mut config = SystemConfig::default();
        config.ui.collect_capacity = MAX_SAMPLES + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn initial_gains_checked_against_limit() {
        let mut config = SystemConfig::default();
        config.control.inner.kp = 5000.0;
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("inner"), "got: {msg}");
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let config = SystemConfig::from_toml(
            r#"
[control]
setpoint_limit = 8.0
[control.inner]
kp = 2.5
"#,
        )
        .unwrap();
        assert_eq!(config.control.setpoint_limit, 8.0);
        assert_eq!(config.control.duty_limit, DUTY_LIMIT);
        assert_eq!(config.control.inner.kp, 2.5);
        assert_eq!(config.control.inner.kd, 0.0);
    }
}
