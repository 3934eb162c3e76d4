//! Dose counter: two GM tubes feeding one shared per-second rolling buffer.
//!
//! The main and follower tubes discharge independently; every accepted
//! pulse on either line lands in the slot of the shared buffer that is
//! current at the edge.  A 1 Hz hardware timer advances the buffer, and the
//! main loop derives counts-per-minute, equivalent dose and the radiation
//! rating from the completed slots.
//!
//! Early readings after enabling average over slots that have never been
//! written and therefore read low until the buffer has wrapped once.  This
//! warm-up bias is inherent to the moving-average design and is not
//! compensated.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use super::buffer::RollingBuffer;
use super::tube::PulseTube;

/// Length of the per-second rolling buffer.
pub const DOSE_WINDOW_SECONDS: usize = 60;

/// Length of the dose-history series (one CPM sample per minute).
pub const HISTORY_LENGTH_MINUTES: usize = 60;

/// Radiation rating thresholds, microsieverts per hour.
const RATING_ELEVATED_USVH: f64 = 0.5;
const RATING_MEDIUM_USVH: f64 = 10.0;
const RATING_HIGH_USVH: f64 = 100.0;
const RATING_EXTREME_USVH: f64 = 1000.0;

/// Auto-range breakpoints: switch to the next metric prefix at 500 of it.
const AUTO_RANGE_MILLI: f64 = 500.0;
const AUTO_RANGE_BASE: f64 = 500_000.0;

/// Measurement unit selected for the equivalent dose readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MeasurementUnit {
    Sieverts = 0,
    Rem = 1,
    Rontgen = 2,
    Gray = 3,
}

impl MeasurementUnit {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Rem,
            2 => Self::Rontgen,
            3 => Self::Gray,
            _ => Self::Sieverts,
        }
    }
}

/// Concrete unit of an auto-ranged equivalent dose value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseUnit {
    MicroSievertsPerHour,
    MilliSievertsPerHour,
    SievertsPerHour,
    MicroRemPerHour,
    MilliRemPerHour,
    RemPerHour,
    MicroRontgenPerHour,
    MilliRontgenPerHour,
    RontgenPerHour,
    MicroGrayPerHour,
    MilliGrayPerHour,
    GrayPerHour,
}

impl DoseUnit {
    /// Display abbreviation, as printed on the telemetry line.
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::MicroSievertsPerHour => "uSv/h",
            Self::MilliSievertsPerHour => "mSv/h",
            Self::SievertsPerHour => "Sv/h",
            Self::MicroRemPerHour => "urem/h",
            Self::MilliRemPerHour => "mrem/h",
            Self::RemPerHour => "rem/h",
            Self::MicroRontgenPerHour => "uR/h",
            Self::MilliRontgenPerHour => "mR/h",
            Self::RontgenPerHour => "R/h",
            Self::MicroGrayPerHour => "uGy/h",
            Self::MilliGrayPerHour => "mGy/h",
            Self::GrayPerHour => "Gy/h",
        }
    }
}

/// Coarse severity classification of the current dose rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RadiationRating {
    Normal,
    Elevated,
    Medium,
    High,
    Extreme,
}

/// An equivalent dose value together with the unit it is expressed in.
#[derive(Debug, Clone, Copy)]
pub struct DoseReading {
    pub value: f64,
    pub unit: DoseUnit,
}

/// Two-tube dose counter.
///
/// Constructed `const` so an instance can live in a `static` reachable
/// from the ISR trampolines; calibration is applied afterwards from the
/// loaded configuration via [`apply_config`](Self::apply_config).
pub struct GeigerCounter {
    main_tube: PulseTube,
    follower_tube: PulseTube,
    buffer: RollingBuffer<DOSE_WINDOW_SECONDS>,
    enabled: AtomicBool,

    // Configuration fields — main loop is the sole writer.
    integration_time_secs: AtomicU8,
    /// Calibration factor as f64 bits (uSv/h per CPM).
    conversion_factor_bits: AtomicU64,
    tube_count: AtomicU8,
    measurement_unit: AtomicU8,
    auto_range: AtomicBool,

    // Dose history: one CPM sample per minute, written by the main loop
    // on the per-second tick.
    history: [AtomicU32; HISTORY_LENGTH_MINUTES],
    history_index: AtomicUsize,
    history_seconds: AtomicU8,
}

impl GeigerCounter {
    pub const fn new(main_line: i32, follower_line: i32, dead_time_us: u64) -> Self {
        Self {
            main_tube: PulseTube::new(main_line, dead_time_us),
            follower_tube: PulseTube::new(follower_line, dead_time_us),
            buffer: RollingBuffer::new(),
            enabled: AtomicBool::new(false),
            integration_time_secs: AtomicU8::new(30),
            conversion_factor_bits: AtomicU64::new(f64::to_bits(0.0057)),
            tube_count: AtomicU8::new(2),
            measurement_unit: AtomicU8::new(MeasurementUnit::Sieverts as u8),
            auto_range: AtomicBool::new(true),
            history: [const { AtomicU32::new(0) }; HISTORY_LENGTH_MINUTES],
            history_index: AtomicUsize::new(0),
            history_seconds: AtomicU8::new(0),
        }
    }

    // ── Edge handlers (ISR context) ───────────────────────────

    /// Rising edge on the main tube line.
    pub fn on_main_edge(&self, now_us: u64) {
        if self.main_tube.accept(now_us) {
            self.buffer.record_pulse();
        }
    }

    /// Rising edge on the follower tube line.
    pub fn on_follower_edge(&self, now_us: u64) {
        if self.follower_tube.accept(now_us) {
            self.buffer.record_pulse();
        }
    }

    /// 1 Hz timer callback: advance the rolling buffer.
    pub fn on_second_tick(&self) {
        if self.enabled.load(Ordering::Acquire) {
            self.buffer.advance();
        }
    }

    // ── Lifecycle (main loop) ─────────────────────────────────

    /// Start counting.  Clears the rolling buffer so the rate estimate
    /// restarts from a clean window; accumulated counts are untouched.
    pub fn enable(&self) {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.buffer.clear();
        self.history_seconds.store(0, Ordering::Relaxed);
        self.main_tube.enable();
        self.follower_tube.enable();
    }

    /// Stop counting.  Safe at any time; an edge handler in flight sees
    /// the cleared tube flags and backs out.
    pub fn disable(&self) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        self.main_tube.disable();
        self.follower_tube.disable();
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

    // ── Configuration (main loop) ─────────────────────────────

    /// Set the integration time, clamped to [1, 60] seconds.
    pub fn set_integration_time(&self, secs: u8) {
        let clamped = secs.clamp(1, DOSE_WINDOW_SECONDS as u8);
        self.integration_time_secs.store(clamped, Ordering::Relaxed);
    }

    pub fn integration_time(&self) -> u8 {
        self.integration_time_secs.load(Ordering::Relaxed)
    }

    pub fn set_conversion_factor(&self, usvh_per_cpm: f64) {
        self.conversion_factor_bits
            .store(usvh_per_cpm.to_bits(), Ordering::Relaxed);
    }

    pub fn set_tube_count(&self, count: u8) {
        self.tube_count.store(count.max(1), Ordering::Relaxed);
    }

    pub fn set_measurement_unit(&self, unit: MeasurementUnit) {
        self.measurement_unit.store(unit as u8, Ordering::Relaxed);
    }

    pub fn measurement_unit(&self) -> MeasurementUnit {
        MeasurementUnit::from_u8(self.measurement_unit.load(Ordering::Relaxed))
    }

    pub fn set_auto_range(&self, on: bool) {
        self.auto_range.store(on, Ordering::Relaxed);
    }

    pub fn auto_range(&self) -> bool {
        self.auto_range.load(Ordering::Relaxed)
    }

    pub fn set_dead_time(&self, us: u64) {
        self.main_tube.set_dead_time(us);
        self.follower_tube.set_dead_time(us);
    }

    // ── Readouts (main loop) ──────────────────────────────────

    /// Combined lifetime count of both tubes.
    pub fn counts(&self) -> u64 {
        self.main_tube.counts() + self.follower_tube.counts()
    }

    pub fn main_tube_counts(&self) -> u64 {
        self.main_tube.counts()
    }

    pub fn follower_tube_counts(&self) -> u64 {
        self.follower_tube.counts()
    }

    /// Counts per minute over the configured integration window.
    ///
    /// Sums the last `t` completed one-second slots and scales by `60 / t`.
    /// `t` is clamped to [1, 60], so there is no division by zero.
    pub fn counts_per_minute(&self) -> f64 {
        let t = usize::from(self.integration_time());
        let sum = f64::from(self.buffer.window_sum(t));
        (sum / t as f64) * 60.0
    }

    /// Equivalent dose rate in microsieverts per hour.
    ///
    /// Linear in CPM: the calibration factor is per tube model, and the
    /// shared buffer carries pulses from `tube_count` tubes.
    pub fn microsieverts_per_hour(&self) -> f64 {
        let factor = f64::from_bits(self.conversion_factor_bits.load(Ordering::Relaxed));
        let tubes = f64::from(self.tube_count.load(Ordering::Relaxed).max(1));
        self.counts_per_minute() * factor / tubes
    }

    /// Equivalent dose in the selected measurement unit, auto-ranged to a
    /// metric prefix when auto-ranging is on.
    pub fn equivalent_dose(&self) -> DoseReading {
        let usvh = self.microsieverts_per_hour();

        // Micro-prefixed magnitude in the selected unit system.
        let (micro_value, units) = match self.measurement_unit() {
            MeasurementUnit::Sieverts => (
                usvh,
                [
                    DoseUnit::MicroSievertsPerHour,
                    DoseUnit::MilliSievertsPerHour,
                    DoseUnit::SievertsPerHour,
                ],
            ),
            MeasurementUnit::Rem => (
                usvh * 100.0,
                [
                    DoseUnit::MicroRemPerHour,
                    DoseUnit::MilliRemPerHour,
                    DoseUnit::RemPerHour,
                ],
            ),
            MeasurementUnit::Rontgen => (
                usvh * 100.0,
                [
                    DoseUnit::MicroRontgenPerHour,
                    DoseUnit::MilliRontgenPerHour,
                    DoseUnit::RontgenPerHour,
                ],
            ),
            MeasurementUnit::Gray => (
                usvh,
                [
                    DoseUnit::MicroGrayPerHour,
                    DoseUnit::MilliGrayPerHour,
                    DoseUnit::GrayPerHour,
                ],
            ),
        };

        if !self.auto_range() {
            return DoseReading {
                value: micro_value,
                unit: units[0],
            };
        }

        if micro_value >= AUTO_RANGE_BASE {
            DoseReading {
                value: micro_value / 1_000_000.0,
                unit: units[2],
            }
        } else if micro_value >= AUTO_RANGE_MILLI {
            DoseReading {
                value: micro_value / 1_000.0,
                unit: units[1],
            }
        } else {
            DoseReading {
                value: micro_value,
                unit: units[0],
            }
        }
    }

    /// Coarse severity classification of the current dose rate.
    pub fn radiation_rating(&self) -> RadiationRating {
        let usvh = self.microsieverts_per_hour();
        if usvh >= RATING_EXTREME_USVH {
            RadiationRating::Extreme
        } else if usvh >= RATING_HIGH_USVH {
            RadiationRating::High
        } else if usvh >= RATING_MEDIUM_USVH {
            RadiationRating::Medium
        } else if usvh >= RATING_ELEVATED_USVH {
            RadiationRating::Elevated
        } else {
            RadiationRating::Normal
        }
    }

    // ── Dose history (main loop) ──────────────────────────────

    /// Count one elapsed second towards the per-minute history series;
    /// every 60th call records the current CPM.  Driven by the main loop
    /// on the dose tick event, not from interrupt context, because it
    /// sums the whole window.
    pub fn update_history(&self) {
        let secs = self.history_seconds.load(Ordering::Relaxed) + 1;
        if usize::from(secs) < DOSE_WINDOW_SECONDS {
            self.history_seconds.store(secs, Ordering::Relaxed);
            return;
        }
        self.history_seconds.store(0, Ordering::Relaxed);

        let cpm = self.counts_per_minute();
        let idx = self.history_index.load(Ordering::Relaxed);
        self.history[idx].store(cpm as u32, Ordering::Relaxed);
        self.history_index
            .store((idx + 1) % HISTORY_LENGTH_MINUTES, Ordering::Relaxed);
    }

    /// Copy of the dose-history series and the next write index.
    pub fn history(&self) -> ([u32; HISTORY_LENGTH_MINUTES], usize) {
        let mut out = [0u32; HISTORY_LENGTH_MINUTES];
        for (slot, value) in self.history.iter().zip(out.iter_mut()) {
            *value = slot.load(Ordering::Relaxed);
        }
        (out, self.history_index.load(Ordering::Relaxed))
    }

    /// Shared access to the tube last-pulse timestamps for the coincidence
    /// check (read-only).
    pub fn main_tube(&self) -> &PulseTube {
        &self.main_tube
    }

    pub fn follower_tube(&self) -> &PulseTube {
        &self.follower_tube
    }
}
