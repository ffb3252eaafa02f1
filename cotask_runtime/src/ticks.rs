//! Wraparound-safe elapsed-time arithmetic over a fixed-width tick counter.
//!
//! Ticks are microseconds from a free-running counter `bits` wide. All
//! arithmetic is modulo `2^bits`. [`TickWidth::diff`] is only meaningful
//! while the true distance between the two ticks is below half the counter
//! range; beyond that the sign flips. That limit is inherent to the counter
//! and is not widened here.
//!
//! ## Due check
//!
//! A task with deadline `d` is due at `now` when `diff(now, d) >= 0`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use cotask_common::consts::{DEFAULT_TICK_BITS, MAX_TICK_BITS};

/// One counter value.
pub type Tick = u32;

/// Counter frequency [Hz].
pub const TICKS_PER_SECOND: u32 = 1_000_000;

/// Width of the tick counter and the modular arithmetic over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWidth {
    bits: u32,
    mask: u32,
}

impl TickWidth {
    /// Full 32-bit counter.
    pub const U32: Self = Self {
        bits: 32,
        mask: u32::MAX,
    };

    /// Create a counter width. Returns `None` outside `1..=32`.
    pub const fn new(bits: u32) -> Option<Self> {
        if bits == 0 || bits > MAX_TICK_BITS {
            return None;
        }
        let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        Some(Self { bits, mask })
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// Largest representable tick.
    #[inline]
    pub const fn mask(self) -> Tick {
        self.mask
    }

    /// Half the counter range: the largest distance `diff` resolves.
    #[inline]
    pub const fn half_range(self) -> u32 {
        1u32 << (self.bits - 1)
    }

    /// Reduce a wide counter value into this width.
    #[inline]
    pub const fn wrap(self, raw: u64) -> Tick {
        (raw & self.mask as u64) as Tick
    }

    /// `base + delta` modulo the counter width.
    #[inline]
    pub const fn add(self, base: Tick, delta: u32) -> Tick {
        base.wrapping_add(delta) & self.mask
    }

    /// Signed `a - b` modulo the counter width.
    #[inline]
    pub const fn diff(self, a: Tick, b: Tick) -> i64 {
        let d = a.wrapping_sub(b) & self.mask;
        if d & self.half_range() != 0 {
            d as i64 - (1i64 << self.bits)
        } else {
            d as i64
        }
    }

    /// True when `deadline` has been reached or passed at `now`.
    #[inline]
    pub const fn is_due(self, now: Tick, deadline: Tick) -> bool {
        self.diff(now, deadline) >= 0
    }
}

impl Default for TickWidth {
    fn default() -> Self {
        match Self::new(DEFAULT_TICK_BITS) {
            Some(w) => w,
            None => Self::U32,
        }
    }
}

/// Convert a signed tick distance to seconds.
#[inline]
pub fn ticks_to_secs(ticks: i64) -> f32 {
    ticks as f32 / TICKS_PER_SECOND as f32
}

/// Source of the current tick.
pub trait Clock {
    fn now(&self) -> Tick;
    fn width(&self) -> TickWidth;
}

/// Monotonic host clock, microseconds since construction, truncated to the
/// configured width.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    width: TickWidth,
}

impl SystemClock {
    pub fn new(width: TickWidth) -> Self {
        Self {
            origin: Instant::now(),
            width,
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Tick {
        let micros = self.origin.elapsed().as_micros();
        self.width.wrap(micros as u64)
    }

    fn width(&self) -> TickWidth {
        self.width
    }
}

/// Settable clock shared between clones. Drives tests and the simulated
/// plant deterministically.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Tick>>,
    width: TickWidth,
}

impl ManualClock {
    pub fn new(width: TickWidth, start: Tick) -> Self {
        Self {
            now: Rc::new(Cell::new(start & width.mask())),
            width,
        }
    }

    pub fn set(&self, tick: Tick) {
        self.now.set(tick & self.width.mask());
    }

    /// Move the clock forward, wrapping at the counter width.
    pub fn advance(&self, delta: u32) {
        self.now.set(self.width.add(self.now.get(), delta));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.now.get()
    }

    fn width(&self) -> TickWidth {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w16() -> TickWidth {
        TickWidth::new(16).unwrap()
    }

    #[test]
    fn width_bounds() {
        assert!(TickWidth::new(0).is_none());
        assert!(TickWidth::new(33).is_none());
        assert_eq!(TickWidth::new(32), Some(TickWidth::U32));
        assert_eq!(w16().mask(), 0xFFFF);
        assert_eq!(w16().half_range(), 0x8000);
    }

    #[test]
    fn add_wraps_at_width() {
        assert_eq!(w16().add(65_530, 10), 4);
        assert_eq!(TickWidth::U32.add(u32::MAX, 1), 0);
    }

    #[test]
    fn diff_across_wrap_is_positive() {
        assert_eq!(w16().diff(5, 65_533), 8);
        assert!(w16().is_due(5, 65_533));
    }

    #[test]
    fn diff_before_deadline_is_negative() {
        assert_eq!(w16().diff(65_533, 5), -8);
        assert!(!w16().is_due(65_533, 5));
        assert_eq!(TickWidth::U32.diff(10, 20), -10);
    }

    #[test]
    fn diff_at_half_range_flips_sign() {
        let w = w16();
        assert_eq!(w.diff(0x7FFF, 0), 0x7FFF);
        assert_eq!(w.diff(0x8000, 0), -0x8000);
    }

    #[test]
    fn due_exactly_at_deadline() {
        assert!(TickWidth::U32.is_due(1_000, 1_000));
    }

    #[test]
    fn manual_clock_shared_between_clones() {
        let clock = ManualClock::new(w16(), 65_530);
        let other = clock.clone();
        clock.advance(10);
        assert_eq!(other.now(), 4);
        other.set(70_000);
        assert_eq!(clock.now(), 70_000 & 0xFFFF);
    }

    #[test]
    fn ticks_to_secs_scales() {
        assert!((ticks_to_secs(10_000) - 0.01).abs() < 1e-9);
        assert!((ticks_to_secs(-500_000) + 0.5).abs() < 1e-9);
    }

    #[test]
    fn system_clock_stays_within_width() {
        let clock = SystemClock::new(w16());
        assert!(clock.now() <= 0xFFFF);
    }
}
