//! Single-slot shared cells for inter-task communication.
//!
//! A [`Share`] is a named handle to one value. Cloning the handle shares the
//! slot. Writes replace the whole value, reads copy it out. There is no
//! history, no notification and no compare-and-swap: readers poll on their
//! own schedule.
//!
//! Handles are `!Send`. The scheduler runs every task on one thread and never
//! interleaves two `step()` calls, so a plain `Cell` is enough. Moving tasks
//! onto several threads would require an atomic or mutex-backed cell instead,
//! and the compiler refuses to let these handles cross threads.
//!
//! By convention each cell has exactly one writer task. The type does not
//! enforce it.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use static_assertions::assert_not_impl_any;

/// Named, cloneable handle to a single shared value.
pub struct Share<T: Copy> {
    name: &'static str,
    slot: Rc<Cell<T>>,
}

impl<T: Copy> Share<T> {
    /// Create a cell holding `initial`.
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            slot: Rc::new(Cell::new(initial)),
        }
    }

    /// Replace the stored value.
    #[inline]
    pub fn write(&self, value: T) {
        self.slot.set(value);
    }

    /// Current value, or the initial value if nothing was written yet.
    #[inline]
    pub fn read(&self) -> T {
        self.slot.get()
    }

    /// Diagnostic name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of live handles to this cell.
    pub fn handles(&self) -> usize {
        Rc::strong_count(&self.slot)
    }
}

impl<T: Copy> Clone for Share<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Share<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("name", &self.name)
            .field("value", &self.read())
            .finish()
    }
}

// Cells are confined to the scheduler thread.
assert_not_impl_any!(Share<f32>: Send, Sync);
