//! User-interface task: single-character commands, numeric entry, data
//! collection and the CSV drain.
//!
//! One input byte is consumed per due step at most. Collection stores one
//! sample per step and the drain emits one record per step.

use std::path::PathBuf;

use cotask_common::consts::CHANNELS;
use cotask_common::system::{LoopGains, SystemConfig};
use tracing::{info, warn};

use crate::console::ConsoleHandle;
use crate::system::Shares;
use crate::task::{StateMachine, StepContext, TaskError, TaskState};
use crate::ticks::{Tick, ticks_to_secs};
use crate::ui::{Collector, CsvSink, EntryEvent, NumericEntry, Sample, clamp_entry};

const NAME: &str = "user";

const HELP: &[&str] = &[
    "+------------------------------------------------+",
    "| Commands                                       |",
    "|  h   show this help                            |",
    "|  p   print Euler angles                        |",
    "|  v   print angular velocity                    |",
    "|  n   print encoder position, delta, velocity   |",
    "|  z   zero the encoder                          |",
    "|  g   start data collection                     |",
    "|  s   stop data collection early                |",
    "|  w   toggle closed-loop control                |",
    "|  m/M set duty for motor 1/2 [%]                |",
    "|  k   set inner-loop gains Kp, Kd, Ki           |",
    "|  K   set outer-loop gains Kp, Kd, Ki           |",
    "|  y/Y set angle setpoint for channel 1/2 [deg]  |",
    "|  q   release angle setpoints                   |",
    "|  d/D print actuation of channel 1/2            |",
    "|  c   clear motor driver faults                 |",
    "+------------------------------------------------+",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    Init,
    Cmd,
    DigitEntry,
    Collect,
    Drain,
    Zero,
}

impl TaskState for UserState {
    fn label(self) -> &'static str {
        match self {
            Self::Init => "S_INIT",
            Self::Cmd => "S_CMD",
            Self::DigitEntry => "S_DIGIT_ENTRY",
            Self::Collect => "S_COLLECT",
            Self::Drain => "S_PRINT",
            Self::Zero => "S_ZERO",
        }
    }
}

/// One term of a gain triple, entered in Kp → Kd → Ki order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainTerm {
    Kp,
    Kd,
    Ki,
}

impl GainTerm {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Kp => "Kp",
            Self::Kd => "Kd",
            Self::Ki => "Ki",
        }
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Kp => Some(Self::Kd),
            Self::Kd => Some(Self::Ki),
            Self::Ki => None,
        }
    }

    fn set(self, gains: &mut LoopGains, value: f32) {
        match self {
            Self::Kp => gains.kp = value,
            Self::Kd => gains.kd = value,
            Self::Ki => gains.ki = value,
        }
    }
}

/// Which loop a gain entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainLoop {
    Inner,
    Outer,
}

/// Cell a pending numeric entry will be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTarget {
    Duty(usize),
    Gain(GainLoop, GainTerm),
    Setpoint(usize),
}

/// Limits and outputs the user task needs from configuration.
#[derive(Debug, Clone)]
pub struct UserSettings {
    pub duty_limit: f32,
    pub setpoint_limit: f32,
    pub gain_limit: f32,
    pub collect_capacity: usize,
    pub data_file: Option<PathBuf>,
}

impl UserSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            duty_limit: config.control.duty_limit,
            setpoint_limit: config.control.setpoint_limit,
            gain_limit: config.control.gain_limit,
            collect_capacity: config.ui.collect_capacity,
            data_file: config.ui.data_file.as_ref().map(PathBuf::from),
        }
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

pub struct UserTask {
    state: UserState,
    console: ConsoleHandle,
    shares: Shares,
    settings: UserSettings,
    entry: NumericEntry,
    target: Option<EntryTarget>,
    draft: LoopGains,
    collector: Collector,
    sink: CsvSink,
    /// File append failed during the current drain; retried on the next `g`.
    file_failed: bool,
    collect_start: Tick,
}

impl UserTask {
    pub fn new(console: ConsoleHandle, shares: &Shares, settings: UserSettings) -> Self {
        Self {
            state: UserState::Init,
            console,
            shares: shares.clone(),
            collector: Collector::new(settings.collect_capacity),
            sink: CsvSink::new(settings.data_file.clone()),
            file_failed: false,
            settings,
            entry: NumericEntry::new(),
            target: None,
            draft: LoopGains::default(),
            collect_start: 0,
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn target(&self) -> Option<EntryTarget> {
        self.target
    }

    fn print_help(&self) {
        for line in HELP {
            self.console.write_line(line);
        }
    }

    fn begin_entry(&mut self, target: EntryTarget) {
        self.entry.clear();
        self.target = Some(target);
        self.prompt(target);
        self.state = UserState::DigitEntry;
    }

    fn prompt(&self, target: EntryTarget) {
        let text = match target {
            EntryTarget::Duty(ch) => format!("Enter duty for motor {} [%]: ", ch + 1),
            EntryTarget::Gain(GainLoop::Inner, term) => format!("Enter inner {}: ", term.label()),
            EntryTarget::Gain(GainLoop::Outer, term) => format!("Enter outer {}: ", term.label()),
            EntryTarget::Setpoint(ch) => {
                format!("Enter angle setpoint for channel {} [deg]: ", ch + 1)
            }
        };
        self.console.write_str(&text);
    }

    fn dispatch(&mut self, byte: u8) {
        let sh = &self.shares;
        match byte {
            b'h' => self.print_help(),
            b'p' => {
                let [heading, roll, pitch] = sh.euler.read();
                self.console.write_line(&format!(
                    "Euler angles [deg]: heading {heading:.2}, roll {roll:.2}, pitch {pitch:.2}"
                ));
            }
            b'v' => {
                let [x, y, z] = sh.omega.read();
                self.console.write_line(&format!(
                    "Angular velocity [deg/s]: x {x:.2}, y {y:.2}, z {z:.2}"
                ));
            }
            b'n' => {
                let e = sh.encoder.read();
                self.console.write_line(&format!(
                    "Encoder: position {:.3} rad, delta {:.4} rad, velocity {:.3} rad/s",
                    e.position, e.delta, e.velocity
                ));
            }
            b'z' => {
                sh.zero_encoder.write(true);
                self.console.write_line("Zeroing encoder...");
                self.state = UserState::Zero;
            }
            b'g' => {
                self.collector.reset();
                self.file_failed = false;
                sh.collect_stop.write(false);
                self.console
                    .write_line("Collecting data, press s to stop early...");
                info!(capacity = self.collector.capacity(), "data collection started");
                self.state = UserState::Collect;
            }
            b's' => self.console.write_line("Not collecting data."),
            b'w' => {
                let enabled = !sh.closed_loop.read();
                sh.closed_loop.write(enabled);
                let word = if enabled { "enabled" } else { "disabled" };
                self.console
                    .write_line(&format!("Closed-loop control {word}."));
                if enabled && !sh.imu_ready.read() {
                    self.console
                        .write_line("IMU not calibrated yet, control starts once it is ready.");
                }
                info!(enabled, "closed-loop control toggled");
            }
            b'm' | b'M' => {
                if sh.closed_loop.read() {
                    self.console
                        .write_line("Disable closed-loop control (w) before setting duty.");
                } else {
                    self.begin_entry(EntryTarget::Duty(channel_of(byte)));
                }
            }
            b'k' => {
                self.draft = sh.inner_gains.read();
                self.begin_entry(EntryTarget::Gain(GainLoop::Inner, GainTerm::Kp));
            }
            b'K' => {
                self.draft = sh.outer_gains.read();
                self.begin_entry(EntryTarget::Gain(GainLoop::Outer, GainTerm::Kp));
            }
            b'y' | b'Y' => self.begin_entry(EntryTarget::Setpoint(channel_of(byte))),
            b'q' => {
                sh.direct_setpoint.write(false);
                for sp in &sh.setpoints {
                    sp.write(0.0);
                }
                self.console.write_line("Angle setpoints released.");
            }
            b'd' | b'D' => sh.print_request[channel_of(byte)].write(true),
            b'c' => {
                for flag in &sh.clear_fault {
                    flag.write(true);
                }
                self.console.write_line("Clearing motor driver faults.");
            }
            b'\r' | b'\n' | b' ' => {}
            other => {
                self.console.write_line(&format!(
                    "Invalid character {:?}. Press h for help.",
                    char::from(other)
                ));
            }
        }
    }

    fn digit_entry(&mut self) -> Result<(), TaskError> {
        let Some(target) = self.target else {
            return Err(TaskError::InvalidState {
                task: NAME,
                state: self.state.label(),
                detail: "no entry target pending".into(),
            });
        };
        let Some(byte) = self.console.poll_byte() else {
            return Ok(());
        };
        match self.entry.feed(byte) {
            EntryEvent::Echo(c) => {
                let mut buf = [0u8; 4];
                self.console.write_str(c.encode_utf8(&mut buf));
            }
            EntryEvent::Erased => self.console.write_str("\x08 \x08"),
            EntryEvent::Rejected | EntryEvent::Ignored => {}
            EntryEvent::Invalid => {
                self.console.write_line("");
                self.console.write_str("Invalid number, try again: ");
            }
            EntryEvent::Done(value) => {
                self.console.write_line("");
                self.complete_entry(target, value);
            }
        }
        Ok(())
    }

    fn complete_entry(&mut self, target: EntryTarget, value: f32) {
        let s = &self.settings;
        match target {
            EntryTarget::Duty(ch) => {
                let duty = clamp_entry(self.console.as_ref(), "Duty", value, -s.duty_limit, s.duty_limit);
                self.shares.duty[ch].write(duty);
                self.console
                    .write_line(&format!("Motor {} duty set to {duty}%", ch + 1));
            }
            EntryTarget::Setpoint(ch) => {
                let sp = clamp_entry(
                    self.console.as_ref(),
                    "Setpoint",
                    value,
                    -s.setpoint_limit,
                    s.setpoint_limit,
                );
                self.shares.setpoints[ch].write(sp);
                self.shares.direct_setpoint.write(true);
                self.console
                    .write_line(&format!("Channel {} setpoint set to {sp} deg", ch + 1));
            }
            EntryTarget::Gain(which, term) => {
                let gain = clamp_entry(self.console.as_ref(), term.label(), value, 0.0, s.gain_limit);
                term.set(&mut self.draft, gain);
                if let Some(next) = term.next() {
                    let next_target = EntryTarget::Gain(which, next);
                    self.target = Some(next_target);
                    self.prompt(next_target);
                    return;
                }
                let (cell, word) = match which {
                    GainLoop::Inner => (&self.shares.inner_gains, "Inner"),
                    GainLoop::Outer => (&self.shares.outer_gains, "Outer"),
                };
                cell.write(self.draft);
                let g = self.draft;
                self.console.write_line(&format!(
                    "{word} gains set: Kp {}, Kd {}, Ki {}",
                    g.kp, g.kd, g.ki
                ));
                info!(loop_ = word, kp = g.kp, kd = g.kd, ki = g.ki, "gains updated");
            }
        }
        self.target = None;
        self.state = UserState::Cmd;
    }

    fn collect(&mut self, ctx: StepContext) {
        if self.console.poll_byte() == Some(b's') {
            self.shares.collect_stop.write(true);
        }
        if self.shares.collect_stop.read() {
            self.finish_collect();
            return;
        }

        if self.collector.collected() == 0 {
            self.collect_start = ctx.now;
        }
        let sample = self.sample(ctx);
        self.collector.push(sample);
        if self.collector.is_full() {
            self.finish_collect();
        }
    }

    fn finish_collect(&mut self) {
        self.console.write_line(&format!(
            "Collection ended, {} samples.",
            self.collector.collected()
        ));
        self.state = UserState::Drain;
    }

    fn sample(&self, ctx: StepContext) -> Sample {
        let sh = &self.shares;
        let ball = sh.ball.read();
        let euler = sh.euler.read();
        let omega = sh.omega.read();
        Sample {
            time: ticks_to_secs(ctx.width.diff(ctx.now, self.collect_start)),
            x: ball.x,
            vx: ball.vx,
            y: ball.y,
            vy: ball.vy,
            roll: euler[1],
            roll_rate: omega[0],
            pitch: euler[2],
            pitch_rate: omega[1],
            encoder: sh.encoder.read().position,
        }
    }

    fn drain(&mut self) {
        if let Some(sample) = self.collector.next_record() {
            let to_file = !self.file_failed;
            if let Err(e) = self.sink.emit_to(self.console.as_ref(), &sample, to_file) {
                warn!("data file write failed, rest of this drain on console only: {e}");
                self.console
                    .write_line(&format!("Could not write data file: {e}"));
                self.file_failed = true;
            }
        }
        if self.collector.is_drained() {
            self.console.write_line(&format!(
                "Done printing {} samples.",
                self.collector.printed()
            ));
            self.shares.collect_stop.write(false);
            self.state = UserState::Cmd;
        }
    }
}

fn channel_of(byte: u8) -> usize {
    if byte.is_ascii_uppercase() { CHANNELS - 1 } else { 0 }
}

impl StateMachine for UserTask {
    type State = UserState;

    fn state(&self) -> UserState {
        self.state
    }

    fn advance(&mut self, ctx: StepContext) -> Result<(), TaskError> {
        match self.state {
            UserState::Init => {
                self.console.write_line("Balance platform ready.");
                self.print_help();
                self.state = UserState::Cmd;
            }
            UserState::Cmd => {
                if let Some(byte) = self.console.poll_byte() {
                    self.dispatch(byte);
                }
            }
            UserState::DigitEntry => self.digit_entry()?,
            UserState::Collect => self.collect(ctx),
            UserState::Drain => self.drain(),
            UserState::Zero => {
                if !self.shares.zero_encoder.read() {
                    self.console.write_line("Encoder zeroed.");
                    self.state = UserState::Cmd;
                }
            }
        }
        Ok(())
    }
}
