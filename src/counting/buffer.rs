//! Fixed-length circular counter buffer for moving-rate estimation.
//!
//! One slot per fixed interval (1 s for the dose counter, 1 min for the
//! coincidence detector).  Pulse ISRs increment the slot that is current at
//! the time of the edge; a hardware timer advances the write index exactly
//! once per interval, clearing the newly-entered slot before it accumulates.
//!
//! ## Concurrency
//!
//! - `record_pulse` is called from GPIO ISR context.
//! - `advance` is called from the periodic timer callback.
//! - `window_sum` is called from the main loop.
//!
//! On the single application core, the two interrupt-side writers never
//! interleave with each other mid-operation.  The main-loop reader validates
//! its multi-slot sums against a generation counter bumped on every advance
//! and retries if an advance landed mid-sum, so no torn window is observed.

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicUsize, Ordering};

/// How many times `window_sum` re-reads after a concurrent advance before
/// settling for the value it has.  Advances are at most 1 Hz, so a second
/// collision in a row essentially never happens.
const SUM_RETRIES: usize = 3;

/// Circular buffer of `N` per-interval pulse counters.
///
/// Slot counters are `u16`: with the dead-time filter in front of the tubes
/// a slot physically cannot reach 65535 counts per interval on this
/// hardware, so saturation is not a concern.
pub struct RollingBuffer<const N: usize> {
    slots: [AtomicU16; N],
    index: AtomicUsize,
    generation: AtomicU32,
}

impl<const N: usize> RollingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU16::new(0) }; N],
            index: AtomicUsize::new(0),
            generation: AtomicU32::new(0),
        }
    }

    /// Number of slots (the averaging window length).
    pub const fn len(&self) -> usize {
        N
    }

    /// Add one count to the slot current at the time of the call.
    ///
    /// ISR context; lock-free, O(1).
    pub fn record_pulse(&self) {
        let idx = self.index.load(Ordering::Acquire);
        self.slots[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Move the write index to the next slot, clearing it first.
    ///
    /// Called exactly once per interval from the timer callback.  The clear
    /// is published before the index moves, so a pulse arriving right after
    /// the advance lands in a zeroed slot.
    pub fn advance(&self) {
        let next = (self.index.load(Ordering::Relaxed) + 1) % N;
        self.slots[next].store(0, Ordering::Relaxed);
        self.index.store(next, Ordering::Release);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Zero every slot and reset the index.  Main-loop only (enable path).
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
        self.index.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Sum the last `window` slots, ending at the slot before the current
    /// write position.  `window` is clamped to [1, N]; `window == N` wraps
    /// all the way around and therefore includes the in-progress slot.
    ///
    /// Retries on a concurrent advance so the result is never a torn mix of
    /// two different windows.
    pub fn window_sum(&self, window: usize) -> u32 {
        let window = window.clamp(1, N);
        let mut sum = 0u32;

        for _ in 0..=SUM_RETRIES {
            let gen_before = self.generation.load(Ordering::Acquire);
            let idx = self.index.load(Ordering::Acquire);

            sum = 0;
            for i in 1..=window {
                let wrapped = (idx + N - i) % N;
                sum += u32::from(self.slots[wrapped].load(Ordering::Relaxed));
            }

            if self.generation.load(Ordering::Acquire) == gen_before {
                break;
            }
        }

        sum
    }

    /// Current write index (diagnostics / tests).
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_and_clears() {
        let buf: RollingBuffer<4> = RollingBuffer::new();
        for _ in 0..3 {
            buf.record_pulse();
        }
        assert_eq!(buf.window_sum(4), 3);

        for _ in 0..4 {
            buf.advance();
        }
        // Full wrap: every slot was re-entered and cleared along the way,
        // including the one holding the three counts.
        assert_eq!(buf.index(), 0);
        assert_eq!(buf.window_sum(4), 0);
    }

    #[test]
    fn window_excludes_current_slot() {
        let buf: RollingBuffer<8> = RollingBuffer::new();
        buf.record_pulse();
        buf.record_pulse();
        buf.advance();
        // The two counts are now in the completed slot behind the index;
        // the current slot holds a fresh count that a 1-slot window must
        // not see.
        buf.record_pulse();
        assert_eq!(buf.window_sum(1), 2);
    }

    #[test]
    fn unwritten_slots_sum_as_zero() {
        let buf: RollingBuffer<60> = RollingBuffer::new();
        buf.record_pulse();
        buf.advance();
        // 59 slots never written: the wide window still only sees 1 count
        // (plus the empty current slot on full wrap).
        assert_eq!(buf.window_sum(60), 1);
        assert_eq!(buf.window_sum(10), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let buf: RollingBuffer<4> = RollingBuffer::new();
        buf.record_pulse();
        buf.advance();
        buf.record_pulse();
        buf.clear();
        assert_eq!(buf.index(), 0);
        assert_eq!(buf.window_sum(4), 0);
    }

    #[test]
    fn window_is_clamped() {
        let buf: RollingBuffer<4> = RollingBuffer::new();
        buf.record_pulse();
        buf.advance();
        assert_eq!(buf.window_sum(0), buf.window_sum(1));
        assert_eq!(buf.window_sum(100), buf.window_sum(4));
    }
}
