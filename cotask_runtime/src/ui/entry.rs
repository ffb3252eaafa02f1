//! One-character-per-tick numeric entry.
//!
//! Accepts digits, one optional leading sign and one decimal point. A second
//! decimal point is rejected and locks the entry: further digits are refused
//! until backspace or the terminating carriage return. Backspace on an empty
//! buffer does nothing.

use cotask_common::consts::ENTRY_CAPACITY;
use heapless::String;
use tracing::warn;

pub const BACKSPACE: u8 = 0x08;
pub const DELETE: u8 = 0x7F;

/// Result of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryEvent {
    /// Character appended; echo it.
    Echo(char),
    /// Last character removed.
    Erased,
    /// Character refused; nothing to echo.
    Rejected,
    /// Byte had no effect (backspace or CR on an empty buffer).
    Ignored,
    /// Entry terminated with a parsed value.
    Done(f32),
    /// Entry terminated but did not parse (e.g. a lone sign). Buffer cleared.
    Invalid,
}

/// Numeric entry buffer.
#[derive(Debug, Default)]
pub struct NumericEntry {
    buf: String<ENTRY_CAPACITY>,
    locked: bool,
}

impl NumericEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.locked = false;
    }

    pub fn feed(&mut self, byte: u8) -> EntryEvent {
        match byte {
            b'0'..=b'9' => {
                if self.locked {
                    EntryEvent::Rejected
                } else {
                    self.push(byte)
                }
            }
            b'-' | b'+' => {
                if self.buf.is_empty() && !self.locked {
                    self.push(byte)
                } else {
                    EntryEvent::Rejected
                }
            }
            b'.' => {
                if self.buf.contains('.') {
                    self.locked = true;
                    EntryEvent::Rejected
                } else if self.locked {
                    EntryEvent::Rejected
                } else {
                    self.push(byte)
                }
            }
            BACKSPACE | DELETE => match self.buf.pop() {
                Some(_) => {
                    self.locked = false;
                    EntryEvent::Erased
                }
                None => EntryEvent::Ignored,
            },
            b'\r' | b'\n' => {
                if self.buf.is_empty() {
                    return EntryEvent::Ignored;
                }
                let parsed = self.buf.parse::<f32>();
                let event = match parsed {
                    Ok(value) => EntryEvent::Done(value),
                    Err(_) => {
                        warn!(entry = self.buf.as_str(), "numeric entry did not parse");
                        EntryEvent::Invalid
                    }
                };
                self.clear();
                event
            }
            _ => EntryEvent::Rejected,
        }
    }

    fn push(&mut self, byte: u8) -> EntryEvent {
        let c = char::from(byte);
        match self.buf.push(c) {
            Ok(()) => EntryEvent::Echo(c),
            Err(_) => EntryEvent::Rejected,
        }
    }
}
