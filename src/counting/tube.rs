//! Debounced pulse input for one detector trigger line.
//!
//! The analog front end stretches each GM discharge into a clean logic
//! pulse, but cable ringing and EMI can still produce bursts of edges.
//! A dead-time filter drops any edge that arrives closer to the previous
//! accepted pulse than the configured minimum spacing.
//!
//! The edge handler is the sole writer of `last_pulse_us` and `counts`;
//! the main loop only reads them and only writes the configuration fields
//! (`enabled`, `dead_time_us`).  That single-writer split is what makes
//! `enable`/`disable` safe to call at any time: a handler already in
//! flight sees the cleared flag and backs out before touching state.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// One debounced pulse line with a lifetime count.
pub struct PulseTube {
    /// GPIO line identity (diagnostics; the ISR binding happens in the
    /// platform layer).
    line: i32,
    /// Minimum spacing between accepted pulses, microseconds.
    dead_time_us: AtomicU64,
    enabled: AtomicBool,
    /// Timestamp of the last accepted pulse (0 = none yet).
    last_pulse_us: AtomicU64,
    /// Lifetime accepted-pulse count.  Monotonic; survives disable/enable.
    counts: AtomicU64,
}

impl PulseTube {
    pub const fn new(line: i32, dead_time_us: u64) -> Self {
        Self {
            line,
            dead_time_us: AtomicU64::new(dead_time_us),
            enabled: AtomicBool::new(false),
            last_pulse_us: AtomicU64::new(0),
            counts: AtomicU64::new(0),
        }
    }

    /// Offer an edge to the tube.  ISR context; O(1), no allocation.
    ///
    /// Returns `true` if the pulse was accepted (counted), `false` if the
    /// tube is disabled or the edge fell inside the dead time.
    pub fn accept(&self, now_us: u64) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }

        // last == 0 means no pulse accepted yet — nothing to debounce against.
        let last = self.last_pulse_us.load(Ordering::Relaxed);
        if last != 0 && now_us.wrapping_sub(last) < self.dead_time_us.load(Ordering::Relaxed) {
            return false;
        }

        self.last_pulse_us.store(now_us, Ordering::Relaxed);
        self.counts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Start accepting pulses.  Idempotent; main-loop only.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop accepting pulses.  Idempotent; safe to call while an edge
    /// handler is in flight.  Accumulated counts are preserved.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Lifetime accepted-pulse count.
    pub fn counts(&self) -> u64 {
        self.counts.load(Ordering::Relaxed)
    }

    /// Timestamp of the last accepted pulse (0 if none yet).
    pub fn last_pulse_us(&self) -> u64 {
        self.last_pulse_us.load(Ordering::Relaxed)
    }

    /// Reconfigure the dead-time filter.  Main-loop only.
    pub fn set_dead_time(&self, us: u64) {
        self.dead_time_us.store(us, Ordering::Relaxed);
    }

    pub fn line(&self) -> i32 {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_spaced_pulses() {
        let tube = PulseTube::new(42, 200);
        tube.enable();
        for i in 0..10u64 {
            assert!(tube.accept(1_000 + i * 500));
        }
        assert_eq!(tube.counts(), 10);
    }

    #[test]
    fn dead_time_drops_close_edges() {
        let tube = PulseTube::new(42, 200);
        tube.enable();
        assert!(tube.accept(1_000));
        assert!(!tube.accept(1_100)); // 100 us after the accepted pulse
        assert!(!tube.accept(1_199));
        assert!(tube.accept(1_200)); // exactly the dead time is enough
        assert_eq!(tube.counts(), 2);
    }

    #[test]
    fn disabled_tube_ignores_edges() {
        let tube = PulseTube::new(42, 200);
        assert!(!tube.accept(1_000));
        assert_eq!(tube.counts(), 0);
        assert_eq!(tube.last_pulse_us(), 0);
    }

    #[test]
    fn counts_survive_disable_enable() {
        let tube = PulseTube::new(42, 200);
        tube.enable();
        assert!(tube.accept(1_000));
        assert!(tube.accept(2_000));
        tube.disable();
        assert!(!tube.accept(3_000));
        tube.enable();
        assert!(tube.accept(4_000));
        assert_eq!(tube.counts(), 3);
    }

    #[test]
    fn burst_saturates_at_dead_time_rate() {
        let tube = PulseTube::new(42, 200);
        tube.enable();
        // 1 ms of edges every 10 us: only every 20th edge clears the filter.
        let mut accepted = 0;
        for i in 0..100u64 {
            if tube.accept(10_000 + i * 10) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 5);
    }
}
