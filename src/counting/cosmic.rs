//! Cosmic-ray detector: coincidence counting across the tube stack.
//!
//! A muon punching through both GM tubes fires them within microseconds of
//! each other; ambient radiation almost never does.  The front end ANDs the
//! two pulse shapers onto the coincidence line, and this module additionally
//! verifies in software that *both* trigger tubes saw an accepted pulse
//! within the coincidence window of the coincidence-line edge.  A lone pulse
//! on any single line therefore never registers an event, even if noise
//! couples onto the coincidence line itself.
//!
//! Events are counted into an hourly rolling buffer (60 one-minute slots,
//! advanced by a 1/min timer) and a lifetime total.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::buffer::RollingBuffer;
use super::tube::PulseTube;

/// Length of the per-minute rolling buffer.
pub const COINCIDENCE_WINDOW_MINUTES: usize = 60;

/// Coincidence-confirmed event counter.
pub struct CosmicRayDetector {
    coincidence_tube: PulseTube,
    buffer: RollingBuffer<COINCIDENCE_WINDOW_MINUTES>,
    enabled: AtomicBool,
    /// Maximum separation between the trigger pulses and the coincidence
    /// edge, microseconds.  Main loop is the sole writer.
    window_us: AtomicU64,
    /// Lifetime count at the last enable transition; the difference gives
    /// events-since-enable.
    enable_offset: AtomicU64,
}

impl CosmicRayDetector {
    pub const fn new(line: i32, dead_time_us: u64, window_us: u64) -> Self {
        Self {
            coincidence_tube: PulseTube::new(line, dead_time_us),
            buffer: RollingBuffer::new(),
            enabled: AtomicBool::new(false),
            window_us: AtomicU64::new(window_us),
            enable_offset: AtomicU64::new(0),
        }
    }

    // ── Edge handler (ISR context) ────────────────────────────

    /// Rising edge on the coincidence line.
    ///
    /// `main_last_us` / `follower_last_us` are the trigger tubes' last
    /// accepted pulse timestamps, read by the trampoline at the edge.
    /// Returns `true` if a coincidence event was registered.
    pub fn on_coincidence_edge(
        &self,
        now_us: u64,
        main_last_us: u64,
        follower_last_us: u64,
    ) -> bool {
        let window = self.window_us.load(Ordering::Relaxed);

        // Both trigger tubes must have fired within the window.  A zero
        // timestamp means that tube has never pulsed — reject outright
        // rather than comparing against the epoch.
        if main_last_us == 0 || now_us.abs_diff(main_last_us) > window {
            return false;
        }
        if follower_last_us == 0 || now_us.abs_diff(follower_last_us) > window {
            return false;
        }

        if !self.coincidence_tube.accept(now_us) {
            return false;
        }

        self.buffer.record_pulse();
        true
    }

    /// 1/min timer callback: advance the hourly buffer.
    pub fn on_minute_tick(&self) {
        if self.enabled.load(Ordering::Acquire) {
            self.buffer.advance();
        }
    }

    // ── Lifecycle (main loop) ─────────────────────────────────

    /// Arm the detector.  Clears the hourly buffer and snapshots the
    /// lifetime count so events-since-enable starts at zero.
    pub fn enable(&self) {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.buffer.clear();
        self.enable_offset
            .store(self.coincidence_tube.counts(), Ordering::Relaxed);
        self.coincidence_tube.enable();
    }

    /// Disarm the detector.  Safe at any time.
    pub fn disable(&self) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        self.coincidence_tube.disable();
    }

    pub fn set_state(&self, on: bool) {
        if on {
            self.enable();
        } else {
            self.disable();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_window(&self, us: u64) {
        self.window_us.store(us, Ordering::Relaxed);
    }

    pub fn set_dead_time(&self, us: u64) {
        self.coincidence_tube.set_dead_time(us);
    }

    // ── Readouts (main loop) ──────────────────────────────────

    /// Coincidence events since the detector was last armed.
    pub fn events_since_enable(&self) -> u64 {
        self.coincidence_tube
            .counts()
            .saturating_sub(self.enable_offset.load(Ordering::Relaxed))
    }

    /// Lifetime coincidence event count.
    pub fn events_total(&self) -> u64 {
        self.coincidence_tube.counts()
    }

    /// Events over the last hour: sum of all 60 one-minute slots.
    pub fn events_per_hour(&self) -> u32 {
        self.buffer.window_sum(COINCIDENCE_WINDOW_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_US: u64 = 100;

    fn detector() -> CosmicRayDetector {
        let d = CosmicRayDetector::new(40, 200, WINDOW_US);
        d.enable();
        d
    }

    #[test]
    fn pulses_on_all_lines_within_window_count_once() {
        let d = detector();
        // Trigger tubes fired 40 us and 60 us before the coincidence edge.
        assert!(d.on_coincidence_edge(10_000, 9_960, 9_940));
        assert_eq!(d.events_total(), 1);
        assert_eq!(d.events_per_hour(), 1);
    }

    #[test]
    fn lone_trigger_pulse_is_rejected() {
        let d = detector();
        // Follower never fired.
        assert!(!d.on_coincidence_edge(10_000, 9_960, 0));
        // Follower fired, but far outside the window.
        assert!(!d.on_coincidence_edge(20_000, 19_960, 10_000));
        assert_eq!(d.events_total(), 0);
        assert_eq!(d.events_per_hour(), 0);
    }

    #[test]
    fn trigger_after_coincidence_edge_still_matches() {
        // ISR ordering can deliver the coincidence edge before the second
        // tube's own handler ran; the window check is symmetric.
        let d = detector();
        assert!(d.on_coincidence_edge(10_000, 10_020, 9_990));
        assert_eq!(d.events_total(), 1);
    }

    #[test]
    fn dead_time_applies_to_coincidence_line() {
        let d = detector();
        assert!(d.on_coincidence_edge(10_000, 10_000, 10_000));
        // Ringing 50 us later: both trigger stamps still in window, but the
        // coincidence tube's own dead time drops the edge.
        assert!(!d.on_coincidence_edge(10_050, 10_000, 10_000));
        assert_eq!(d.events_total(), 1);
    }

    #[test]
    fn events_since_enable_resets_on_rearm() {
        let d = detector();
        assert!(d.on_coincidence_edge(10_000, 10_000, 10_000));
        assert_eq!(d.events_since_enable(), 1);

        d.disable();
        d.enable();
        assert_eq!(d.events_since_enable(), 0);
        assert_eq!(d.events_total(), 1);

        assert!(d.on_coincidence_edge(20_000, 20_000, 20_000));
        assert_eq!(d.events_since_enable(), 1);
        assert_eq!(d.events_total(), 2);
    }

    #[test]
    fn hourly_buffer_ages_out_after_sixty_minutes() {
        let d = detector();
        assert!(d.on_coincidence_edge(10_000, 10_000, 10_000));
        assert_eq!(d.events_per_hour(), 1);

        for _ in 0..COINCIDENCE_WINDOW_MINUTES {
            d.on_minute_tick();
        }
        assert_eq!(d.events_per_hour(), 0);
        assert_eq!(d.events_total(), 1);
    }

    #[test]
    fn disarmed_detector_registers_nothing() {
        let d = CosmicRayDetector::new(40, 200, WINDOW_US);
        assert!(!d.on_coincidence_edge(10_000, 10_000, 10_000));
        assert_eq!(d.events_total(), 0);
    }
}
