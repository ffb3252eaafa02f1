//! Console-side helpers shared by the user task: numeric entry, value
//! clamping and sample collection.

pub mod collect;
pub mod entry;

use tracing::warn;

use crate::console::Console;

pub use collect::{Collector, CsvSink, Sample};
pub use entry::{EntryEvent, NumericEntry};

/// Clamp an entered value into `[lo, hi]`, printing and logging a warning
/// when it had to be moved.
pub fn clamp_entry(console: &dyn Console, label: &str, value: f32, lo: f32, hi: f32) -> f32 {
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        let bound = if value > hi { "above" } else { "below" };
        console.write_line(&format!(
            "Warning: {label} cannot be {bound} {clamped}, entered {value}"
        ));
        warn!(label, value, clamped, "entered value clamped");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;

    #[test]
    fn duty_clamped_high_with_warning() {
        let c = MemoryConsole::new();
        assert_eq!(clamp_entry(&c, "Duty", 150.0, -100.0, 100.0), 100.0);
        assert!(c.output().contains("cannot be above 100"));
    }

    #[test]
    fn duty_clamped_low_with_warning() {
        let c = MemoryConsole::new();
        assert_eq!(clamp_entry(&c, "Duty", -150.0, -100.0, 100.0), -100.0);
        assert!(c.output().contains("cannot be below -100"));
    }

    #[test]
    fn in_range_value_is_silent() {
        let c = MemoryConsole::new();
        assert_eq!(clamp_entry(&c, "Duty", 42.0, -100.0, 100.0), 42.0);
        assert!(c.output().is_empty());
    }
}
