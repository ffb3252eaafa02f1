//! Integration test: sensor calibration on first boot, reuse on later boots.

use std::fs;

use cotask_runtime::calibration::CalibrationStore;
use tempfile::TempDir;

use super::Rig;

#[test]
fn first_boot_calibrates_and_saves_both_sensors() {
    let dir = TempDir::new().unwrap();
    let mut rig = Rig::new(dir.path());
    rig.settle();

    let out = rig.console.output();
    assert!(out.contains("Balance platform ready."));
    assert!(out.contains("IMU calibrated, coefficients saved."));
    assert!(out.contains("Touch panel calibrated, coefficients saved."));

    let imu = CalibrationStore::new(dir.path().join("imu_cal.txt"));
    let touch = CalibrationStore::new(dir.path().join("touch_cal.txt"));
    assert!(imu.load_imu().is_ok());
    assert!(touch.load_touch().is_ok());
}

#[test]
fn later_boot_loads_saved_calibration() {
    let dir = TempDir::new().unwrap();
    Rig::new(dir.path()).settle();

    let mut rig = Rig::new(dir.path());
    rig.settle();
    let out = rig.console.output();
    assert!(out.contains("IMU calibration loaded from file."));
    assert!(out.contains("Touch panel calibration loaded from file."));
    assert!(!out.contains("coefficients saved"));
}

#[test]
fn malformed_file_falls_back_to_manual_calibration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imu_cal.txt");
    fs::write(&path, "1,2,3\n").unwrap();

    let mut rig = Rig::new(dir.path());
    rig.settle();
    let out = rig.console.output();
    assert!(out.contains("IMU calibration file unusable"));
    assert!(out.contains("IMU calibrated, coefficients saved."));

    // Rewritten with a full coefficient set.
    assert!(CalibrationStore::new(path).load_imu().is_ok());
}

#[test]
fn calibrated_touch_panel_reports_ball_position() {
    let dir = TempDir::new().unwrap();
    let mut rig = Rig::new(dir.path());
    rig.settle();

    rig.platform.set_ball(40.0, -20.0);
    rig.run(40);
    let ball = rig.system.shares.ball.read();
    assert!(ball.contact);
    assert!((ball.x - 40.0).abs() < 1.0, "x = {}", ball.x);
    assert!((ball.y + 20.0).abs() < 1.0, "y = {}", ball.y);
}
