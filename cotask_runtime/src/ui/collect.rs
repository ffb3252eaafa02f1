//! Bounded sample collection and one-record-per-tick CSV drain.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use cotask_common::consts::MAX_SAMPLES;
use heapless::Vec;

use crate::console::Console;

/// One collected record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Seconds since the first sample of the run.
    pub time: f32,
    pub x: f32,
    pub vx: f32,
    pub y: f32,
    pub vy: f32,
    pub roll: f32,
    pub roll_rate: f32,
    pub pitch: f32,
    pub pitch_rate: f32,
    /// Encoder position [rad].
    pub encoder: f32,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.4}",
            self.time,
            self.x,
            self.vx,
            self.y,
            self.vy,
            self.roll,
            self.roll_rate,
            self.pitch,
            self.pitch_rate,
            self.encoder
        )
    }
}

/// Fixed-capacity sample buffer with a drain cursor.
#[derive(Debug)]
pub struct Collector {
    samples: Vec<Sample, MAX_SAMPLES>,
    capacity: usize,
    printed: usize,
}

impl Collector {
    /// `capacity` is capped at [`MAX_SAMPLES`].
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::new(),
            capacity: capacity.clamp(1, MAX_SAMPLES),
            printed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn collected(&self) -> usize {
        self.samples.len()
    }

    pub fn printed(&self) -> usize {
        self.printed
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Every collected record has been emitted.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.printed == self.samples.len()
    }

    /// Append a sample. Returns `false` (and stores nothing) when full.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.is_full() {
            return false;
        }
        self.samples.push(sample).is_ok()
    }

    /// Next record to emit, advancing the drain cursor.
    pub fn next_record(&mut self) -> Option<Sample> {
        let sample = self.samples.get(self.printed).copied()?;
        self.printed += 1;
        Some(sample)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.printed = 0;
    }
}

/// Destination of drained records: the console plus an optional append file.
#[derive(Debug, Clone, Default)]
pub struct CsvSink {
    file: Option<PathBuf>,
}

impl CsvSink {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    /// Write one record. The file is opened in append mode and closed before
    /// returning. The console line is written even if the file fails.
    pub fn emit(&self, console: &dyn Console, sample: &Sample) -> io::Result<()> {
        self.emit_to(console, sample, true)
    }

    /// As [`emit`](Self::emit), skipping the file when `to_file` is false.
    pub fn emit_to(&self, console: &dyn Console, sample: &Sample, to_file: bool) -> io::Result<()> {
        let line = sample.to_string();
        console.write_line(&line);
        if let Some(path) = self.file.as_ref().filter(|_| to_file) {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;
    use tempfile::TempDir;

    fn sample(t: f32) -> Sample {
        Sample {
            time: t,
            ..Sample::default()
        }
    }

    #[test]
    fn buffer_never_overflows() {
        let mut c = Collector::new(3);
        assert!(c.push(sample(0.0)));
        assert!(c.push(sample(0.1)));
        assert!(!c.is_full());
        assert!(c.push(sample(0.2)));
        assert!(c.is_full());
        assert!(!c.push(sample(0.3)));
        assert_eq!(c.collected(), 3);
    }

    #[test]
    fn capacity_is_capped() {
        assert_eq!(Collector::new(10_000).capacity(), MAX_SAMPLES);
        assert_eq!(Collector::new(0).capacity(), 1);
    }

    #[test]
    fn drain_emits_each_record_once() {
        let mut c = Collector::new(5);
        c.push(sample(0.0));
        c.push(sample(0.5));
        assert!(!c.is_drained());
        assert_eq!(c.next_record().map(|s| s.time), Some(0.0));
        assert_eq!(c.next_record().map(|s| s.time), Some(0.5));
        assert!(c.is_drained());
        assert_eq!(c.next_record(), None);
        assert_eq!(c.printed(), 2);

        c.reset();
        assert_eq!(c.collected(), 0);
        assert!(c.is_drained());
    }

    #[test]
    fn csv_line_has_ten_fields() {
        let line = sample(1.25).to_string();
        assert_eq!(line.split(',').count(), 10);
        assert!(line.starts_with("1.2500,"));
    }

    #[test]
    fn sink_appends_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Data.csv");
        let sink = CsvSink::new(Some(path.clone()));
        let console = MemoryConsole::new();

        sink.emit(&console, &sample(0.0)).unwrap();
        sink.emit(&console, &sample(0.01)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(console.output().lines().count(), 2);
    }

    #[test]
    fn sink_reports_unwritable_file_after_console() {
        let dir = TempDir::new().unwrap();
        let sink = CsvSink::new(Some(dir.path().join("missing").join("Data.csv")));
        let console = MemoryConsole::new();
        assert!(sink.emit(&console, &sample(0.0)).is_err());
        assert_eq!(console.output().lines().count(), 1);
    }
}
