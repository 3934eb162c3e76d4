//! Property and fuzz-style tests for robustness of the counting and
//! entropy cores.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32
//! targets.  On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;

use radmeter::counting::{GeigerCounter, PulseTube, RollingBuffer};
use radmeter::entropy::{EntropySource, RandomNumberGenerator};

// ── Debounce properties ───────────────────────────────────────

proptest! {
    /// Pulses spaced at least the dead time apart are all counted,
    /// whatever the exact gaps are.
    #[test]
    fn spaced_pulse_trains_count_exactly(
        gaps in proptest::collection::vec(200u64..10_000, 1..200),
    ) {
        let tube = PulseTube::new(42, 200);
        tube.enable();
        let mut now = 1_000u64;
        for gap in &gaps {
            now += gap;
            prop_assert!(tube.accept(now));
        }
        prop_assert_eq!(tube.counts(), gaps.len() as u64);
    }

    /// An arbitrary edge train never yields more accepted pulses than the
    /// dead time allows for the spanned interval, and never panics.
    #[test]
    fn arbitrary_trains_saturate_at_dead_time_rate(
        gaps in proptest::collection::vec(1u64..1_000, 1..300),
    ) {
        const DEAD_TIME: u64 = 200;
        let tube = PulseTube::new(42, DEAD_TIME);
        tube.enable();

        let mut now = 1_000u64;
        let mut last_accepted: Option<u64> = None;
        for gap in &gaps {
            now += gap;
            let accepted = tube.accept(now);
            if accepted {
                if let Some(last) = last_accepted {
                    prop_assert!(now - last >= DEAD_TIME);
                }
                last_accepted = Some(now);
            }
        }

        let span = now - 1_000;
        prop_assert!(tube.counts() <= span / DEAD_TIME + 1);
    }
}

// ── Rolling buffer properties ─────────────────────────────────

proptest! {
    /// The windowed sum never exceeds the total number of recorded pulses,
    /// and the full-window sum equals it while nothing has aged out.
    #[test]
    fn window_sums_are_bounded_by_recorded_pulses(
        per_slot in proptest::collection::vec(0u32..50, 1..60),
    ) {
        let buf: RollingBuffer<60> = RollingBuffer::new();
        let mut total = 0u32;
        for count in &per_slot {
            for _ in 0..*count {
                buf.record_pulse();
            }
            total += count;
            buf.advance();
        }

        for window in 1..=60 {
            prop_assert!(buf.window_sum(window) <= total);
        }
        prop_assert_eq!(buf.window_sum(60), total);
    }

    /// After a full wrap, only the most recent slots contribute: each
    /// advance clears the slot it enters, so the full window holds the
    /// last 59 completed intervals plus the (empty) current one.
    #[test]
    fn old_slots_age_out(
        per_slot in proptest::collection::vec(0u32..50, 61..120),
    ) {
        let buf: RollingBuffer<60> = RollingBuffer::new();
        for count in &per_slot {
            for _ in 0..*count {
                buf.record_pulse();
            }
            buf.advance();
        }

        let recent: u32 = per_slot[per_slot.len() - 59..].iter().sum();
        prop_assert_eq!(buf.window_sum(60), recent);
    }
}

// ── Entropy bit convention ────────────────────────────────────

proptest! {
    /// For any strictly increasing triplet the emitted bit matches the
    /// documented interval comparison (A >= B -> 1).
    #[test]
    fn triplet_bit_matches_interval_comparison(
        t1 in 1_000u64..1_000_000,
        a in 1u64..100_000,
        b in 1u64..100_000,
    ) {
        let source = EntropySource::new(39, 0);
        source.enable();
        source.on_edge(t1);
        source.on_edge(t1 + a);
        source.on_edge(t1 + a + b);

        let expected = u8::from(a >= b);
        prop_assert_eq!(source.take_bit(), Some(expected));
    }
}

// ── Rejection sampling properties ─────────────────────────────

proptest! {
    /// Whatever bits arrive and whatever valid bounds are configured, a
    /// completed draw lies inside [minimum, maximum].
    #[test]
    fn completed_draws_always_lie_in_bounds(
        minimum in 0u8..=250,
        span in 0u8..=5,
        bits in proptest::collection::vec(0u8..=1, 64),
    ) {
        let maximum = minimum + span;
        let source = EntropySource::new(39, 0);
        let mut rng = RandomNumberGenerator::new(&source);
        rng.enable();
        // Widen first so the intermediate states stay valid.
        prop_assert!(rng.set_maximum(255));
        prop_assert!(rng.set_minimum(minimum));
        prop_assert!(rng.set_maximum(maximum));
        rng.roll();

        let mut now = 1_000u64;
        for bit in bits {
            if !rng.rolling() {
                break;
            }
            // Synthesise a triplet with the desired comparison outcome.
            source.on_edge(now);
            if bit == 0 {
                source.on_edge(now + 100);
                source.on_edge(now + 300);
            } else {
                source.on_edge(now + 300);
                source.on_edge(now + 400);
            }
            now += 1_000;
            let _ = rng.update(now);
        }

        if !rng.rolling() {
            let value = rng.value();
            prop_assert!(value >= minimum && value <= maximum,
                "value {} outside [{}, {}]", value, minimum, maximum);
        }
    }

    /// Bound setters either apply cleanly or reject without touching state.
    #[test]
    fn bound_setters_never_invert_the_range(
        ops in proptest::collection::vec((any::<bool>(), any::<u8>()), 1..50),
    ) {
        let source = EntropySource::new(39, 0);
        let mut rng = RandomNumberGenerator::new(&source);
        for (set_min, value) in ops {
            if set_min {
                let _ = rng.set_minimum(value);
            } else {
                let _ = rng.set_maximum(value);
            }
            prop_assert!(rng.minimum() <= rng.maximum());
        }
    }
}

// ── Dose counter glue ─────────────────────────────────────────

proptest! {
    /// CPM is non-negative and bounded by what the window physically holds
    /// for any integration time and any pulse pattern.
    #[test]
    fn cpm_is_sane_for_arbitrary_patterns(
        integration in 0u8..=255,
        pulses_per_sec in proptest::collection::vec(0u32..30, 0..80),
    ) {
        let geiger = GeigerCounter::new(42, 41, 200);
        geiger.enable();
        geiger.set_integration_time(integration);

        let mut now = 1_000_000u64;
        for count in &pulses_per_sec {
            for _ in 0..*count {
                geiger.on_main_edge(now);
                now += 1_000;
            }
            geiger.on_second_tick();
            now += 1_000_000;
        }

        let cpm = geiger.counts_per_minute();
        prop_assert!(cpm >= 0.0);
        // Upper bound: the densest second seen, scaled to a minute.
        let peak = pulses_per_sec.iter().copied().max().unwrap_or(0);
        prop_assert!(cpm <= f64::from(peak) * 60.0 + 1e-9);
    }
}
