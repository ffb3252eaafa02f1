//! Integration test: console commands reaching the other tasks through
//! shared cells.

use cotask_common::system::LoopGains;
use tempfile::TempDir;

use super::Rig;

fn ready_rig(dir: &TempDir) -> Rig {
    let mut rig = Rig::new(dir.path());
    rig.settle();
    rig.console.take_output();
    rig
}

#[test]
fn duty_entry_drives_the_motor() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("m50\r");
    assert_eq!(rig.system.shares.duty[0].read(), 50.0);
    assert!(rig.console.output().contains("Motor 1 duty set to 50%"));

    rig.run(20);
    let plant = rig.platform.plant();
    assert!(plant.angle[0] > 0.0);
    assert_eq!(plant.angle[1], 0.0);
}

#[test]
fn out_of_range_duty_is_clamped_with_warning() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("M150\r");
    assert_eq!(rig.system.shares.duty[1].read(), 100.0);
    assert!(rig.console.output().contains("Duty cannot be above 100"));
}

#[test]
fn duty_entry_refused_in_closed_loop() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("w");
    assert!(rig.system.shares.closed_loop.read());
    rig.type_in("m");
    assert!(rig.console.output().contains("Disable closed-loop control"));

    rig.type_in("w");
    assert!(!rig.system.shares.closed_loop.read());
}

#[test]
fn chained_gain_entry_writes_once_complete() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);
    let before = rig.system.shares.inner_gains.read();

    rig.type_in("k2\r1\r");
    assert_eq!(rig.system.shares.inner_gains.read(), before);

    rig.type_in("0.5\r");
    assert_eq!(
        rig.system.shares.inner_gains.read(),
        LoopGains {
            kp: 2.0,
            kd: 1.0,
            ki: 0.5,
        }
    );
    assert!(rig.console.output().contains("Inner gains set: Kp 2, Kd 1, Ki 0.5"));
}

#[test]
fn setpoint_entry_and_release() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("Y5\r");
    assert_eq!(rig.system.shares.setpoints[1].read(), 5.0);
    assert!(rig.system.shares.direct_setpoint.read());

    rig.type_in("q");
    assert_eq!(rig.system.shares.setpoints[1].read(), 0.0);
    assert!(!rig.system.shares.direct_setpoint.read());
}

#[test]
fn zero_command_waits_for_encoder_task() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("m80\r");
    rig.run(40);
    assert!(rig.system.shares.encoder.read().position > 0.0);

    rig.type_in("m0\rz");
    rig.wait_for("Encoder zeroed.");
    assert!(!rig.system.shares.zero_encoder.read());
    assert!(rig.system.shares.encoder.read().position.abs() < 1e-3);
}

#[test]
fn print_request_reports_control_channel() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("wd");
    rig.wait_for("Channel 1: reference");
    assert!(!rig.system.shares.print_request[0].read());
}

#[test]
fn unknown_command_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut rig = ready_rig(&dir);

    rig.type_in("x");
    assert!(rig.console.output().contains("Invalid character 'x'"));
}
