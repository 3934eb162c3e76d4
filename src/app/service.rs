//! Application service — the orchestration core.
//!
//! [`AppService`] wires the dose counter, cosmic-ray detector and random
//! number generator together, reacts to queue events, dispatches inbound
//! commands, and emits structured records through the event-sink port.
//!
//! ```text
//!  queue events ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  AppCommand  ──▶ │          AppService           │
//!                  │  GeigerCounter · CosmicRay    │ ──▶ ConfigPort
//!                  │  Detector · Rng               │
//!                  └──────────────────────────────┘
//! ```
//!
//! The detector components themselves are `static` (the ISR trampolines
//! need them); the service borrows them, so in tests it runs against
//! locally-constructed instances just the same.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::counting::{CosmicRayDetector, GeigerCounter};
use crate::entropy::{EntropySource, RandomNumberGenerator};
use crate::events::Event;

use super::commands::AppCommand;
use super::events::{AppEvent, Subsystem, TelemetryData};
use super::ports::{ConfigPort, EventSink};

/// Auto-save debounce: persist a dirty config once it has been stable for
/// this many poll ticks (5 s at the default 4 Hz loop).
const AUTO_SAVE_DEBOUNCE_TICKS: u64 = 20;

/// The application service orchestrates all domain logic.
pub struct AppService<'a> {
    geiger: &'a GeigerCounter,
    cosmic: &'a CosmicRayDetector,
    rng: RandomNumberGenerator<'a>,
    entropy: &'a EntropySource,
    config: SystemConfig,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_tick: u64,
    /// Skip the debounce on the next save opportunity.
    save_requested: bool,
    /// Set while a draw is in flight; used to detect completion.
    draw_in_flight: bool,
}

impl<'a> AppService<'a> {
    /// Construct the service and push the loaded configuration into every
    /// component.  Does **not** enable anything — call [`start`] next.
    ///
    /// [`start`]: Self::start
    pub fn new(
        geiger: &'a GeigerCounter,
        cosmic: &'a CosmicRayDetector,
        entropy: &'a EntropySource,
        config: SystemConfig,
    ) -> Self {
        let mut service = Self {
            geiger,
            cosmic,
            rng: RandomNumberGenerator::new(entropy),
            entropy,
            config: config.clone(),
            tick_count: 0,
            config_dirty: false,
            dirty_since_tick: 0,
            save_requested: false,
            draw_in_flight: false,
        };
        service.apply_config(&config);
        service
    }

    /// Push every configuration value into the owning component.
    fn apply_config(&mut self, config: &SystemConfig) {
        self.geiger.set_integration_time(config.integration_time_secs);
        self.geiger
            .set_conversion_factor(config.conversion_factor_usvh_per_cpm);
        self.geiger.set_tube_count(config.tube_count);
        self.geiger.set_measurement_unit(config.measurement_unit);
        self.geiger.set_auto_range(config.auto_range);
        self.geiger.set_dead_time(config.tube_dead_time_us);

        self.cosmic.set_window(config.coincidence_window_us);
        self.cosmic.set_dead_time(config.tube_dead_time_us);

        self.entropy.set_dead_time(config.tube_dead_time_us);
        if config.rng_minimum <= config.rng_maximum {
            // Widen first so the intermediate states pass the pairwise
            // check regardless of the previous bounds.
            let _ = self.rng.set_maximum(u8::MAX);
            let _ = self.rng.set_minimum(config.rng_minimum);
            let _ = self.rng.set_maximum(config.rng_maximum);
        } else {
            // A stored config that fails the pairwise check keeps the
            // previous valid bounds; storage validation should have caught
            // this before it was ever written.
            warn!(
                "config: rejected RNG bounds {}..{}",
                config.rng_minimum, config.rng_maximum
            );
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the subsystems to their configured states and announce start.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started);

        if self.config.geiger_enabled {
            self.set_geiger_state(true, sink);
        }
        if self.config.cosmic_enabled {
            self.set_cosmic_state(true, sink);
        }
        if self.config.rng_enabled {
            self.set_rng_state(true, sink);
        }
        info!("AppService started");
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run one main-loop cycle: expire stalled entropy captures, consume a
    /// fresh bit if one arrived, and report draw completion.
    pub fn poll(&mut self, now_us: u64, sink: &mut impl EventSink) {
        self.tick_count += 1;

        if let Some(bit) = self.rng.update(now_us) {
            sink.emit(&AppEvent::RandomBit { bit });
        }

        if self.draw_in_flight && !self.rng.rolling() {
            self.draw_in_flight = false;
            sink.emit(&AppEvent::DrawCompleted {
                value: self.rng.value(),
                minimum: self.rng.minimum(),
                maximum: self.rng.maximum(),
            });
        }
    }

    /// React to one queue event drained by the main loop.
    pub fn handle_event(&mut self, event: Event, sink: &mut impl EventSink) {
        match event {
            Event::DoseSecondTick => {
                // The buffer advance already happened in the timer callback;
                // here we only do the O(window) history bookkeeping that has
                // no business running in interrupt context.
                self.geiger.update_history();
            }

            Event::CoincidenceMinuteTick => {}

            Event::CoincidenceDetected => {
                sink.emit(&AppEvent::CoincidenceEvent {
                    events_per_hour: self.cosmic.events_per_hour(),
                    events_total: self.cosmic.events_total(),
                });
            }

            Event::TelemetryTick => {
                sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
            }

            Event::CommandReceived => {
                // Commands are delivered by the transport collaborator via
                // handle_command(); the queue event only wakes the loop.
            }
        }
    }

    /// Apply one inbound command.
    pub fn handle_command(&mut self, command: AppCommand, sink: &mut impl EventSink) {
        match command {
            AppCommand::SetGeigerState(on) => {
                self.set_geiger_state(on, sink);
                self.config.geiger_enabled = on;
                self.mark_dirty();
            }

            AppCommand::SetCosmicState(on) => {
                self.set_cosmic_state(on, sink);
                self.config.cosmic_enabled = on;
                self.mark_dirty();
            }

            AppCommand::SetRngState(on) => {
                self.set_rng_state(on, sink);
                self.config.rng_enabled = on;
                self.mark_dirty();
            }

            AppCommand::SetIntegrationTime(secs) => {
                self.geiger.set_integration_time(secs);
                // Store the clamped value, not the raw request.
                self.config.integration_time_secs = self.geiger.integration_time();
                self.mark_dirty();
            }

            AppCommand::SetMeasurementUnit(unit) => {
                self.geiger.set_measurement_unit(unit);
                self.config.measurement_unit = unit;
                self.mark_dirty();
            }

            AppCommand::SetAutoRange(on) => {
                self.geiger.set_auto_range(on);
                self.config.auto_range = on;
                self.mark_dirty();
            }

            AppCommand::SetRngMinimum(minimum) => {
                if self.rng.set_minimum(minimum) {
                    self.config.rng_minimum = minimum;
                    self.mark_dirty();
                } else {
                    warn!(
                        "rng: minimum {} rejected (maximum is {})",
                        minimum,
                        self.rng.maximum()
                    );
                }
            }

            AppCommand::SetRngMaximum(maximum) => {
                if self.rng.set_maximum(maximum) {
                    self.config.rng_maximum = maximum;
                    self.mark_dirty();
                } else {
                    warn!(
                        "rng: maximum {} rejected (minimum is {})",
                        maximum,
                        self.rng.minimum()
                    );
                }
            }

            AppCommand::Roll => {
                self.rng.roll();
                self.draw_in_flight = self.rng.rolling();
            }

            AppCommand::UpdateConfig(config) => {
                self.apply_config(&config);
                self.config = config;
                self.mark_dirty();
            }

            AppCommand::SaveConfig => {
                self.config_dirty = true;
                self.save_requested = true;
            }
        }
    }

    // ── Config persistence ────────────────────────────────────

    /// Persist the config once it has been dirty and stable long enough,
    /// or immediately after an explicit save request.
    pub fn auto_save_if_needed(&mut self, port: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        let debounced =
            self.tick_count.saturating_sub(self.dirty_since_tick) >= AUTO_SAVE_DEBOUNCE_TICKS;
        if self.save_requested || debounced {
            self.save(port);
        }
    }

    /// Persist immediately if dirty (shutdown path).
    pub fn force_save_if_dirty(&mut self, port: &impl ConfigPort) {
        if self.config_dirty {
            self.save(port);
        }
    }

    fn save(&mut self, port: &impl ConfigPort) {
        match port.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_requested = false;
                info!("config: saved");
            }
            Err(e) => {
                // Keep the dirty flag: the next debounce window retries.
                warn!("config: save failed ({})", e);
            }
        }
    }

    fn mark_dirty(&mut self) {
        self.config_dirty = true;
        self.dirty_since_tick = self.tick_count;
    }

    // ── Subsystem state transitions ───────────────────────────

    fn set_geiger_state(&mut self, on: bool, sink: &mut impl EventSink) {
        if on == self.geiger.is_enabled() {
            return;
        }
        self.geiger.set_state(on);
        sink.emit(&AppEvent::SubsystemState {
            subsystem: Subsystem::DoseCounter,
            enabled: on,
        });
    }

    fn set_cosmic_state(&mut self, on: bool, sink: &mut impl EventSink) {
        if on == self.cosmic.is_enabled() {
            return;
        }
        if on && !self.geiger.is_enabled() {
            // The coincidence check reads the trigger tubes' last-pulse
            // timestamps, and the tube stack shares one HV supply: arming
            // the detector implies counting.
            self.set_geiger_state(true, sink);
        }
        self.cosmic.set_state(on);
        sink.emit(&AppEvent::SubsystemState {
            subsystem: Subsystem::CosmicRayDetector,
            enabled: on,
        });
    }

    fn set_rng_state(&mut self, on: bool, sink: &mut impl EventSink) {
        if on == self.rng.is_enabled() {
            return;
        }
        self.rng.set_state(on);
        self.draw_in_flight = false;
        sink.emit(&AppEvent::SubsystemState {
            subsystem: Subsystem::RandomNumberGenerator,
            enabled: on,
        });
    }

    // ── Readouts ──────────────────────────────────────────────

    /// Build the periodic telemetry snapshot.
    pub fn build_telemetry(&self) -> TelemetryData {
        let dose = self.geiger.equivalent_dose();
        TelemetryData {
            counts_per_minute: self.geiger.counts_per_minute(),
            microsieverts_per_hour: self.geiger.microsieverts_per_hour(),
            dose_value: dose.value,
            dose_unit: dose.unit,
            rating: self.geiger.radiation_rating(),
            counts: self.geiger.counts(),
            main_tube_counts: self.geiger.main_tube_counts(),
            follower_tube_counts: self.geiger.follower_tube_counts(),
            coincidence_events_per_hour: self.cosmic.events_per_hour(),
            coincidence_events: self.cosmic.events_total(),
            rng_rolling: self.rng.rolling(),
            entropy_bits: self.entropy.bits_emitted(),
        }
    }

    /// Current configuration (reflects applied commands).
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// RNG readout passthrough for the UI collaborator.
    pub fn rng(&self) -> &RandomNumberGenerator<'a> {
        &self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::AppEvent;

    struct RecordingSink(Vec<AppEvent>);

    impl EventSink for RecordingSink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn fixtures() -> (GeigerCounter, CosmicRayDetector, EntropySource) {
        (
            GeigerCounter::new(42, 41, 200),
            CosmicRayDetector::new(40, 200, 100),
            EntropySource::new(39, 0),
        )
    }

    #[test]
    fn start_enables_configured_subsystems() {
        let (geiger, cosmic, entropy) = fixtures();
        let config = SystemConfig {
            geiger_enabled: true,
            cosmic_enabled: false,
            rng_enabled: false,
            ..SystemConfig::default()
        };
        let mut service = AppService::new(&geiger, &cosmic, &entropy, config);
        let mut sink = RecordingSink(Vec::new());
        service.start(&mut sink);

        assert!(geiger.is_enabled());
        assert!(!cosmic.is_enabled());
        assert!(matches!(sink.0[0], AppEvent::Started));
    }

    #[test]
    fn arming_cosmic_detector_enables_counting() {
        let (geiger, cosmic, entropy) = fixtures();
        let config = SystemConfig {
            geiger_enabled: false,
            ..SystemConfig::default()
        };
        let mut service = AppService::new(&geiger, &cosmic, &entropy, config);
        let mut sink = RecordingSink(Vec::new());
        service.start(&mut sink);
        assert!(!geiger.is_enabled());

        service.handle_command(AppCommand::SetCosmicState(true), &mut sink);
        assert!(cosmic.is_enabled());
        assert!(geiger.is_enabled());
    }

    #[test]
    fn rejected_rng_bounds_leave_config_untouched() {
        let (geiger, cosmic, entropy) = fixtures();
        let mut service =
            AppService::new(&geiger, &cosmic, &entropy, SystemConfig::default());
        let mut sink = RecordingSink(Vec::new());

        service.handle_command(AppCommand::SetRngMaximum(0), &mut sink);
        assert_eq!(service.config().rng_maximum, 6);
        assert_eq!(service.rng().maximum(), 6);
    }

    #[test]
    fn integration_time_command_stores_clamped_value() {
        let (geiger, cosmic, entropy) = fixtures();
        let mut service =
            AppService::new(&geiger, &cosmic, &entropy, SystemConfig::default());
        let mut sink = RecordingSink(Vec::new());

        service.handle_command(AppCommand::SetIntegrationTime(200), &mut sink);
        assert_eq!(service.config().integration_time_secs, 60);
        assert_eq!(geiger.integration_time(), 60);
    }

    #[test]
    fn roll_completes_and_reports_through_sink() {
        let (geiger, cosmic, entropy) = fixtures();
        let config = SystemConfig {
            rng_enabled: true,
            ..SystemConfig::default()
        };
        let mut service = AppService::new(&geiger, &cosmic, &entropy, config);
        let mut sink = RecordingSink(Vec::new());
        service.start(&mut sink);
        service.handle_command(AppCommand::Roll, &mut sink);

        // Feed triplets emitting 1, 0, 1 -> candidate 5 -> result 6.
        // Edge spacing stays above the configured 200 us dead time.
        let mut now = 10_000u64;
        for bit in [1u8, 0, 1] {
            entropy.on_edge(now);
            if bit == 0 {
                entropy.on_edge(now + 300);
                entropy.on_edge(now + 700);
            } else {
                entropy.on_edge(now + 700);
                entropy.on_edge(now + 1_000);
            }
            now += 5_000;
            service.poll(now, &mut sink);
        }

        assert!(!service.rng().rolling());
        let completed = sink
            .0
            .iter()
            .find_map(|e| match e {
                AppEvent::DrawCompleted { value, .. } => Some(*value),
                _ => None,
            })
            .expect("draw completion event");
        assert_eq!(completed, 6);
        // Every consumed bit was also reported.
        let bits: Vec<u8> = sink
            .0
            .iter()
            .filter_map(|e| match e {
                AppEvent::RandomBit { bit } => Some(*bit),
                _ => None,
            })
            .collect();
        assert_eq!(bits, vec![1, 0, 1]);
    }

    #[test]
    fn coincidence_event_is_reported() {
        let (geiger, cosmic, entropy) = fixtures();
        let config = SystemConfig {
            cosmic_enabled: true,
            ..SystemConfig::default()
        };
        let mut service = AppService::new(&geiger, &cosmic, &entropy, config);
        let mut sink = RecordingSink(Vec::new());
        service.start(&mut sink);

        assert!(cosmic.on_coincidence_edge(10_000, 10_000, 10_000));
        service.handle_event(Event::CoincidenceDetected, &mut sink);

        assert!(sink.0.iter().any(|e| matches!(
            e,
            AppEvent::CoincidenceEvent { events_total: 1, .. }
        )));
    }

    #[test]
    fn telemetry_snapshot_reflects_counters() {
        let (geiger, cosmic, entropy) = fixtures();
        let mut service =
            AppService::new(&geiger, &cosmic, &entropy, SystemConfig::default());
        let mut sink = RecordingSink(Vec::new());
        service.start(&mut sink);

        geiger.on_main_edge(10_000);
        geiger.on_follower_edge(20_000);
        let telemetry = service.build_telemetry();
        assert_eq!(telemetry.counts, 2);
        assert_eq!(telemetry.main_tube_counts, 1);
        assert_eq!(telemetry.follower_tube_counts, 1);
    }
}
