//! Rejection-sampling random number generator.
//!
//! Accumulates decay-timing bits into a candidate value of exactly
//! ceil(log2(range)) bits and rejects candidates outside the range instead
//! of folding them back with modulo, so every value in [minimum, maximum]
//! is equally likely.  Draws are asynchronous: `roll()` starts one, and the
//! main loop calls `update()` until enough bits have trickled in.
//!
//! This component lives entirely in the main loop — it has no interrupt
//! side, so its fields are plain values behind `&mut self`.

use super::source::EntropySource;

/// Bounded uniform integer generator fed by an [`EntropySource`].
pub struct RandomNumberGenerator<'a> {
    source: &'a EntropySource,
    enabled: bool,

    minimum: u8,
    maximum: u8,

    // Draw state, recomputed by `roll()`.  `range` spans up to 256 and
    // `candidate` up to 2^required_bits − 1, so both need 16 bits.
    rolling: bool,
    range: u16,
    required_bits: u8,
    captured_bits: u8,
    candidate: u16,
    result: u8,

    // Latest-bit passthrough for diagnostics; `stale` flips once the bit
    // has been read and stays set until a fresh triplet completes.
    latest_bit: u8,
    stale: bool,
}

impl<'a> RandomNumberGenerator<'a> {
    pub fn new(source: &'a EntropySource) -> Self {
        Self {
            source,
            enabled: false,
            minimum: 1,
            maximum: 6,
            rolling: false,
            range: 6,
            required_bits: 3,
            captured_bits: 0,
            candidate: 0,
            result: 0,
            latest_bit: 0,
            stale: true,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the generator: enables the entropy tube and resets any draw
    /// in progress.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.source.enable();
        self.reset_draw();
        self.enabled = true;
    }

    /// Stop the generator and its entropy tube.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.source.disable();
        self.reset_draw();
        self.enabled = false;
    }

    pub fn set_state(&mut self, on: bool) {
        if on {
            self.enable();
        } else {
            self.disable();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ── Draw control ──────────────────────────────────────────

    /// Begin an asynchronous draw.  No-op while a draw is in progress.
    pub fn roll(&mut self) {
        if self.rolling {
            return;
        }
        self.candidate = 0;
        self.captured_bits = 0;
        self.calculate_range();
        self.rolling = true;
    }

    /// Poll for a fresh entropy bit and advance the draw.
    ///
    /// Returns the consumed bit, if any, so the caller can log it.  Also
    /// expires stalled captures in the entropy source.
    pub fn update(&mut self, now_us: u64) -> Option<u8> {
        if !self.enabled {
            return None;
        }

        self.source.poll_timeout(now_us);

        // A single-value range needs no entropy: complete immediately.
        if self.rolling && self.required_bits == 0 {
            self.result = self.minimum;
            self.rolling = false;
        }

        let bit = self.source.take_bit()?;
        self.latest_bit = bit;
        self.stale = false;

        if self.rolling {
            self.accumulate(bit);
        }

        Some(bit)
    }

    // ── Configuration ─────────────────────────────────────────

    /// Set the lower bound.  Rejected (state unchanged) if it would
    /// exceed the current maximum.
    pub fn set_minimum(&mut self, minimum: u8) -> bool {
        if minimum > self.maximum {
            return false;
        }
        self.minimum = minimum;
        true
    }

    /// Set the upper bound.  Rejected (state unchanged) if it would fall
    /// below the current minimum.
    pub fn set_maximum(&mut self, maximum: u8) -> bool {
        if maximum < self.minimum {
            return false;
        }
        self.maximum = maximum;
        true
    }

    pub fn minimum(&self) -> u8 {
        self.minimum
    }

    pub fn maximum(&self) -> u8 {
        self.maximum
    }

    // ── Readouts ──────────────────────────────────────────────

    /// While rolling: draw progress as a percentage, capped at 99.
    /// Once the draw completes: the accepted result.
    pub fn value(&self) -> u8 {
        if !self.rolling {
            return self.result;
        }
        if self.required_bits == 0 {
            return 99;
        }
        let progress = (u16::from(self.captured_bits) * 100 + u16::from(self.required_bits) / 2)
            / u16::from(self.required_bits);
        (progress as u8).min(99)
    }

    pub fn rolling(&self) -> bool {
        self.rolling
    }

    /// True if the latest bit has already been read (or none has arrived
    /// yet).  Callers must check this before trusting `random_bit()`.
    pub fn stale(&self) -> bool {
        self.stale
    }

    /// Read the latest bit and mark it stale.
    pub fn random_bit(&mut self) -> u8 {
        self.stale = true;
        self.latest_bit
    }

    // ── Internal ──────────────────────────────────────────────

    fn reset_draw(&mut self) {
        self.rolling = false;
        self.stale = true;
        self.result = 0;
        self.captured_bits = 0;
        self.candidate = 0;
        self.latest_bit = 0;
    }

    /// range = maximum − minimum + 1; required bits = ceil(log2(range)).
    /// Bounds are validated at the setters, so range ≥ 1 always holds.
    fn calculate_range(&mut self) {
        self.range = u16::from(self.maximum) - u16::from(self.minimum) + 1;
        self.required_bits = if self.range <= 1 {
            0
        } else {
            (u16::BITS - (self.range - 1).leading_zeros()) as u8
        };
    }

    /// Shift one bit into the candidate; accept or reject once complete.
    fn accumulate(&mut self, bit: u8) {
        if self.captured_bits < self.required_bits {
            self.candidate = (self.candidate << 1) | u16::from(bit);
            self.captured_bits += 1;
        }

        if self.captured_bits >= self.required_bits {
            if self.candidate < self.range {
                // candidate < range <= 256 and minimum + candidate <= maximum.
                self.result = self.minimum + self.candidate as u8;
                self.rolling = false;
            } else {
                // Out of range: discard and re-accumulate.  Mapping it back
                // with modulo would skew the distribution.
                self.candidate = 0;
                self.captured_bits = 0;
            }
        }
    }
}
