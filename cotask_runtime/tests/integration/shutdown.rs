//! Integration test: stop request and the shutdown action.

use std::sync::atomic::AtomicBool;

use cotask_common::system::LoopGains;
use tempfile::TempDir;

use super::Rig;

#[test]
fn stop_request_zeroes_actuation_and_gains() {
    let dir = TempDir::new().unwrap();
    let mut rig = Rig::with_config(dir.path(), |c| {
        c.control.inner = LoopGains {
            kp: 1.5,
            kd: 0.1,
            ki: 0.2,
        };
    });
    rig.settle();
    rig.type_in("m40\r");
    rig.type_in("Y3\r");
    assert_eq!(rig.system.shares.duty[0].read(), 40.0);

    let stop = AtomicBool::new(true);
    rig.system.scheduler.run(&stop).unwrap();

    let shares = &rig.system.shares;
    assert_eq!(shares.duty[0].read(), 0.0);
    assert_eq!(shares.duty[1].read(), 0.0);
    assert_eq!(shares.inner_gains.read(), LoopGains::default());
    assert_eq!(shares.outer_gains.read(), LoopGains::default());
    assert!(!shares.closed_loop.read());
    assert!(!shares.direct_setpoint.read());
}

#[test]
fn shutdown_stops_closed_loop_output() {
    let dir = TempDir::new().unwrap();
    let mut rig = Rig::new(dir.path());
    rig.settle();
    rig.type_in("w");
    rig.run(20);
    assert!(rig.system.shares.closed_loop.read());

    rig.system.scheduler.shutdown();
    assert!(!rig.system.shares.closed_loop.read());

    // Control tasks drop back to idle on the next pass and hold zero duty.
    rig.run(10);
    assert_eq!(rig.system.shares.duty[0].read(), 0.0);
    assert_eq!(rig.system.shares.duty[1].read(), 0.0);
}
