//! Decay-timing entropy source.
//!
//! Radioactive decay intervals are exponentially distributed and mutually
//! independent, so comparing two successive inter-pulse intervals yields an
//! unbiased bit: the tube fires at t1, t2, t3, and whether (t2 − t1) is
//! shorter or longer than (t3 − t2) is a fair coin up to detector dead-time
//! effects.
//!
//! The edge handler owns the capture state machine (stage 0→1→2, then bit
//! emission) and is the only writer of the capture fields; the main loop
//! consumes emitted bits and is the only side that clears the ready flag.
//! A capture that stalls mid-triplet is discarded by the timeout poll
//! rather than aging silently.
//!
//! Bit convention: with A = t2 − t1 and B = t3 − t2, the emitted bit is
//! 0 when A < B and 1 when A ≥ B.  Equal intervals emit 1.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

/// Discard a capture stuck waiting for its second or third pulse after
/// this long.  Background activity on the RNG tube is a few pulses per
/// second; half a minute of silence means the capture is stale.
pub const CAPTURE_TIMEOUT_US: u64 = 30_000_000;

/// One random bit per pulse triplet on a dedicated tube line.
pub struct EntropySource {
    line: i32,
    /// Minimum spacing between accepted edges, microseconds.
    dead_time_us: AtomicU64,
    enabled: AtomicBool,

    // Capture state — edge handler is the sole writer (except the timeout
    // reset, see `poll_timeout`).
    stage: AtomicU8,
    first_us: AtomicU64,
    second_us: AtomicU64,
    last_edge_us: AtomicU64,

    // Handoff to the main loop: handler sets `bit_ready`, consumer clears.
    latest_bit: AtomicU8,
    bit_ready: AtomicBool,

    // Diagnostics.
    bits_emitted: AtomicU64,
    captures_timed_out: AtomicU32,
}

impl EntropySource {
    pub const fn new(line: i32, dead_time_us: u64) -> Self {
        Self {
            line,
            dead_time_us: AtomicU64::new(dead_time_us),
            enabled: AtomicBool::new(false),
            stage: AtomicU8::new(0),
            first_us: AtomicU64::new(0),
            second_us: AtomicU64::new(0),
            last_edge_us: AtomicU64::new(0),
            latest_bit: AtomicU8::new(0),
            bit_ready: AtomicBool::new(false),
            bits_emitted: AtomicU64::new(0),
            captures_timed_out: AtomicU32::new(0),
        }
    }

    // ── Edge handler (ISR context) ────────────────────────────

    /// Rising edge on the RNG tube line.  O(1), no allocation.
    pub fn on_edge(&self, now_us: u64) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }

        // Same dead-time discrimination as a counting tube.
        let last = self.last_edge_us.load(Ordering::Relaxed);
        if last != 0 && now_us.wrapping_sub(last) < self.dead_time_us.load(Ordering::Relaxed) {
            return;
        }
        self.last_edge_us.store(now_us, Ordering::Relaxed);

        match self.stage.load(Ordering::Relaxed) {
            0 => {
                self.first_us.store(now_us, Ordering::Relaxed);
                self.stage.store(1, Ordering::Relaxed);
            }
            1 => {
                self.second_us.store(now_us, Ordering::Relaxed);
                self.stage.store(2, Ordering::Relaxed);
            }
            _ => {
                let t1 = self.first_us.load(Ordering::Relaxed);
                let t2 = self.second_us.load(Ordering::Relaxed);
                let interval_a = t2.wrapping_sub(t1);
                let interval_b = now_us.wrapping_sub(t2);

                // A < B -> 0, A >= B -> 1 (ties emit 1).
                let bit = u8::from(interval_a >= interval_b);
                self.latest_bit.store(bit, Ordering::Relaxed);
                self.bit_ready.store(true, Ordering::Release);
                self.bits_emitted.fetch_add(1, Ordering::Relaxed);
                self.stage.store(0, Ordering::Relaxed);
            }
        }
    }

    // ── Consumer side (main loop) ─────────────────────────────

    /// True exactly while an emitted bit has not been consumed.
    pub fn available(&self) -> bool {
        self.bit_ready.load(Ordering::Acquire)
    }

    /// Consume the pending bit, if any.  Each emitted bit is returned at
    /// most once; a second call before the next triplet completes returns
    /// `None`.
    pub fn take_bit(&self) -> Option<u8> {
        if self.bit_ready.swap(false, Ordering::AcqRel) {
            Some(self.latest_bit.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Discard a capture that has sat in stage 1 or 2 for longer than
    /// [`CAPTURE_TIMEOUT_US`].  Called from the main loop each cycle.
    ///
    /// The compare-exchange only fires when the stage still holds the
    /// observed value, so a triplet that completes concurrently wins over
    /// the reset.
    pub fn poll_timeout(&self, now_us: u64) {
        let stage = self.stage.load(Ordering::Relaxed);
        let started = match stage {
            1 => self.first_us.load(Ordering::Relaxed),
            2 => self.second_us.load(Ordering::Relaxed),
            _ => return,
        };

        if now_us.wrapping_sub(started) > CAPTURE_TIMEOUT_US
            && self
                .stage
                .compare_exchange(stage, 0, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.captures_timed_out.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ── Lifecycle (main loop) ─────────────────────────────────

    /// Start capturing.  Resets the capture state so the first triplet is
    /// built from fresh pulses.
    pub fn enable(&self) {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stage.store(0, Ordering::Relaxed);
        self.bit_ready.store(false, Ordering::Relaxed);
    }

    /// Stop capturing.  Safe at any time.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_dead_time(&self, us: u64) {
        self.dead_time_us.store(us, Ordering::Relaxed);
    }

    pub fn line(&self) -> i32 {
        self.line
    }

    /// Total bits emitted since boot.
    pub fn bits_emitted(&self) -> u64 {
        self.bits_emitted.load(Ordering::Relaxed)
    }

    /// Captures discarded by the timeout poll since boot.
    pub fn captures_timed_out(&self) -> u32 {
        self.captures_timed_out.load(Ordering::Relaxed)
    }
}
