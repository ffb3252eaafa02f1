//! Integration test: data collection and the CSV drain.

use std::fs;

use tempfile::TempDir;

use super::Rig;

#[test]
fn full_collection_drains_to_console_and_file() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("run.csv");
    let mut rig = Rig::with_config(dir.path(), |c| {
        c.ui.collect_capacity = 5;
        c.ui.data_file = Some(data.display().to_string());
    });
    rig.settle();

    rig.type_in("g");
    rig.wait_for("Done printing 5 samples.");
    let out = rig.console.output();
    assert!(out.contains("Collection ended, 5 samples."));

    let text = fs::read_to_string(&data).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    for line in &lines {
        assert_eq!(line.split(',').count(), 10, "bad record {line:?}");
        assert!(out.contains(line));
    }
    // Timestamps restart at zero and advance by the user period.
    assert!(lines[0].starts_with("0.0000,"));
    assert!(lines[1].starts_with("0.0500,"));
    assert!(!rig.system.shares.collect_stop.read());
}

#[test]
fn stop_key_ends_collection_early() {
    let dir = TempDir::new().unwrap();
    let mut rig = Rig::new(dir.path());
    rig.settle();

    rig.type_in("g");
    rig.run(60);
    rig.type_in("s");
    rig.wait_for("Done printing");

    let collector = rig.console.output();
    assert!(collector.contains("Collection ended,"));
    assert!(!collector.contains("Collection ended, 301 samples."));

    // Back at the command prompt.
    rig.console.take_output();
    rig.type_in("x");
    assert!(rig.console.output().contains("Invalid character"));
}
