//! IMU task: loads or performs calibration, then publishes orientation.
//!
//! A missing or unreadable calibration file sends the task to manual
//! calibration. A file that fails to save is reported and the task still
//! proceeds to S_RUN with the in-device calibration.

use cotask_common::hal::{CalibrationStatus, Imu, ImuMode, Vector3};
use tracing::{info, warn};

use crate::calibration::CalibrationStore;
use crate::console::ConsoleHandle;
use crate::share::Share;
use crate::system::Shares;
use crate::task::{StateMachine, StepContext, TaskError, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuState {
    Init,
    LoadCal,
    Calibrate,
    SaveCal,
    Run,
}

impl TaskState for ImuState {
    fn label(self) -> &'static str {
        match self {
            Self::Init => "S_INIT",
            Self::LoadCal => "S_LOAD_CAL",
            Self::Calibrate => "S_CALIBRATE",
            Self::SaveCal => "S_SAVE_CAL",
            Self::Run => "S_RUN",
        }
    }
}

pub struct ImuTask {
    state: ImuState,
    imu: Box<dyn Imu>,
    store: CalibrationStore,
    target: u8,
    console: ConsoleHandle,
    euler: Share<Vector3>,
    omega: Share<Vector3>,
    status: Share<CalibrationStatus>,
    ready: Share<bool>,
}

impl ImuTask {
    pub fn new(
        imu: Box<dyn Imu>,
        store: CalibrationStore,
        target: u8,
        console: ConsoleHandle,
        shares: &Shares,
    ) -> Self {
        Self {
            state: ImuState::Init,
            imu,
            store,
            target,
            console,
            euler: shares.euler.clone(),
            omega: shares.omega.clone(),
            status: shares.imu_status.clone(),
            ready: shares.imu_ready.clone(),
        }
    }

    fn start_manual(&mut self) {
        self.imu.set_mode(ImuMode::Ndof);
        self.console.write_line(
            "IMU calibration required: move the platform until all scores reach the target.",
        );
        self.state = ImuState::Calibrate;
    }
}

impl StateMachine for ImuTask {
    type State = ImuState;

    fn state(&self) -> ImuState {
        self.state
    }

    fn advance(&mut self, _ctx: StepContext) -> Result<(), TaskError> {
        match self.state {
            ImuState::Init => {
                self.ready.write(false);
                if self.store.exists() {
                    self.state = ImuState::LoadCal;
                } else {
                    info!(path = %self.store.path().display(), "no IMU calibration file");
                    self.start_manual();
                }
            }
            ImuState::LoadCal => match self.store.load_imu() {
                Ok(coefficients) => {
                    self.imu.set_mode(ImuMode::Config);
                    self.imu.set_calibration_coefficients(&coefficients);
                    self.imu.set_mode(ImuMode::Ndof);
                    self.console.write_line("IMU calibration loaded from file.");
                    self.ready.write(true);
                    self.state = ImuState::Run;
                }
                Err(e) => {
                    warn!(path = %self.store.path().display(), "IMU calibration file unusable: {e}");
                    self.console
                        .write_line(&format!("IMU calibration file unusable ({e})."));
                    self.start_manual();
                }
            },
            ImuState::Calibrate => {
                let status = self.imu.calibration_status();
                if status != self.status.read() {
                    self.console.write_line(&format!(
                        "IMU calibration: mag {} acc {} gyr {} sys {}",
                        status.mag, status.acc, status.gyr, status.sys
                    ));
                }
                self.status.write(status);
                if status.all_at_least(self.target) {
                    self.state = ImuState::SaveCal;
                }
            }
            ImuState::SaveCal => {
                let coefficients = self.imu.calibration_coefficients();
                match self.store.save_imu(&coefficients) {
                    Ok(()) => self.console.write_line("IMU calibrated, coefficients saved."),
                    Err(e) => {
                        warn!("IMU calibration not saved: {e}");
                        self.console
                            .write_line(&format!("IMU calibrated, save failed ({e})."));
                    }
                }
                self.ready.write(true);
                self.state = ImuState::Run;
            }
            ImuState::Run => {
                self.euler.write(self.imu.euler());
                self.omega.write(self.imu.omega());
            }
        }
        Ok(())
    }
}
