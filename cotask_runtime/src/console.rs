//! Character-stream command interface.
//!
//! Input is polled one byte at a time and never blocks. Output is plain
//! text. Handles are shared between the tasks that print, so both methods
//! take `&self`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, warn};

/// Byte-oriented console.
pub trait Console {
    /// Next pending input byte, if any. Never blocks.
    fn poll_byte(&self) -> Option<u8>;

    fn write_str(&self, text: &str);

    fn write_line(&self, text: &str) {
        self.write_str(text);
        self.write_str("\n");
    }
}

/// Shared console handle.
pub type ConsoleHandle = Rc<dyn Console>;

// ─── Host Console ───────────────────────────────────────────────────

/// Process stdin/stdout. A background thread reads stdin and forwards bytes
/// over a channel so polling never blocks the scheduler.
///
/// Terminals deliver input line by line unless put in raw mode, so commands
/// arrive after Enter. The trailing newline is ignored by the command parser.
pub struct StdinConsole {
    rx: Receiver<u8>,
}

impl StdinConsole {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("console-reader".into())
            .spawn(move || {
                for byte in io::stdin().lock().bytes() {
                    match byte {
                        Ok(b) => {
                            if tx.send(b).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("stdin read failed: {e}");
                            break;
                        }
                    }
                }
                debug!("console reader finished");
            })?;
        Ok(Self { rx })
    }
}

impl Console for StdinConsole {
    fn poll_byte(&self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(b) => Some(b),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn write_str(&self, text: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!("console write failed: {e}");
        }
    }
}

// ─── Memory Console ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    input: VecDeque<u8>,
    output: String,
}

/// In-memory console for tests and scripted runs. Clones share buffers.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue input bytes.
    pub fn push_input(&self, text: &str) {
        self.inner.borrow_mut().input.extend(text.bytes());
    }

    pub fn push_byte(&self, byte: u8) {
        self.inner.borrow_mut().input.push_back(byte);
    }

    /// Bytes not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.inner.borrow().input.len()
    }

    /// Everything written so far.
    pub fn output(&self) -> String {
        self.inner.borrow().output.clone()
    }

    /// Return and clear the output buffer.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.inner.borrow_mut().output)
    }

    /// Handle usable by tasks.
    pub fn handle(&self) -> ConsoleHandle {
        Rc::new(self.clone())
    }
}

impl Console for MemoryConsole {
    fn poll_byte(&self) -> Option<u8> {
        self.inner.borrow_mut().input.pop_front()
    }

    fn write_str(&self, text: &str) {
        self.inner.borrow_mut().output.push_str(text);
    }
}
