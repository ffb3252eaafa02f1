//! Persisted calibration files.
//!
//! Plain text, one line, comma-separated, positional. The IMU file holds the
//! 22 raw coefficient bytes as decimal integers; the touch-panel file holds
//! the six affine coefficients `kxx, kxy, x0, kyx, kyy, y0`.
//!
//! Loading validates field count and every numeric parse. Callers treat any
//! [`CalibrationError`] as "no usable calibration" and fall back to the
//! manual procedure.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cotask_common::consts::{IMU_CAL_BYTES, TOUCH_CAL_COEFFS};
use cotask_common::hal::{ImuCalibration, TouchCalibration};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {index} ({value:?}) is not a valid number")]
    Parse { index: usize, value: String },
}

/// One calibration file on disk.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load_imu(&self) -> Result<ImuCalibration, CalibrationError> {
        self.read_fields::<u8, IMU_CAL_BYTES>()
    }

    pub fn save_imu(&self, coefficients: &ImuCalibration) -> Result<(), CalibrationError> {
        self.write_fields(coefficients)
    }

    pub fn load_touch(&self) -> Result<TouchCalibration, CalibrationError> {
        self.read_fields::<f32, TOUCH_CAL_COEFFS>()
            .map(TouchCalibration::from_array)
    }

    pub fn save_touch(&self, calibration: &TouchCalibration) -> Result<(), CalibrationError> {
        self.write_fields(&calibration.to_array())
    }

    fn read_fields<T, const N: usize>(&self) -> Result<[T; N], CalibrationError>
    where
        T: FromStr + Copy + Default,
    {
        let content = fs::read_to_string(&self.path)?;
        let fields: Vec<&str> = content.trim().split(',').map(str::trim).collect();
        if fields.len() != N {
            return Err(CalibrationError::FieldCount {
                expected: N,
                found: fields.len(),
            });
        }
        let mut out = [T::default(); N];
        for (index, (slot, raw)) in out.iter_mut().zip(&fields).enumerate() {
            *slot = raw.parse().map_err(|_| CalibrationError::Parse {
                index,
                value: (*raw).to_string(),
            })?;
        }
        Ok(out)
    }

    fn write_fields<T: Display>(&self, fields: &[T]) -> Result<(), CalibrationError> {
        let line = fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        fs::write(&self.path, line + "\n")?;
        info!(path = %self.path.display(), fields = fields.len(), "calibration saved");
        Ok(())
    }
}
