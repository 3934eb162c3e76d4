//! Radmeter Firmware — Main Entry Point
//!
//! Hexagonal architecture with event-driven execution: the GPIO and timer
//! interrupts fold pulses into the detector statics, and the cooperative
//! main loop drains the event queue, polls the RNG and feeds telemetry to
//! the structured log sink.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LogEventSink     NvsAdapter      time                          │
//! │  (EventSink)      (ConfigPort)    (monotonic clock)             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  GeigerCounter · CosmicRayDetector · Rng               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  drivers: hw_init (edge ISRs) · hw_timer (1s/1min) · watchdog  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use radmeter::adapters::log_sink::LogEventSink;
use radmeter::adapters::nvs::NvsAdapter;
use radmeter::adapters::time;
use radmeter::app::ports::ConfigPort;
use radmeter::app::service::AppService;
use radmeter::config::SystemConfig;
use radmeter::drivers;
use radmeter::events::{self, push_event, Event};
use radmeter::instrument::{COSMIC, ENTROPY, GEIGER};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }
    #[cfg(not(target_os = "espidf"))]
    {
        // Host simulation: logging goes straight to stderr.
        let _ = simple_logger_init();
    }

    info!("╔══════════════════════════════════════╗");
    info!("║  Radmeter v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware bring-up ──────────────────────────────────
    //
    // Any failure here leaves the affected detector without edges or
    // ticks; the instrument keeps running degraded rather than halting.
    if let Err(e) = drivers::hw_init::init_peripherals() {
        error!("GPIO init failed: {} — detectors will read zero", e);
    }
    if let Err(e) = drivers::hw_init::attach_detector_isrs() {
        error!("ISR attach failed: {} — detectors will read zero", e);
    }
    if let Err(e) = drivers::hw_timer::start_timers() {
        error!("Timer start failed: {} — rate estimates frozen", e);
    }
    let watchdog = drivers::watchdog::Watchdog::new();

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 4. Construct the application core ─────────────────────
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(&GEIGER, &COSMIC, &ENTROPY, config.clone());
    app.start(&mut sink);

    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    let mut telemetry_seconds: u64 = 0;

    #[cfg(not(target_os = "espidf"))]
    let mut sim_last_second: u64 = time::uptime_secs();
    #[cfg(not(target_os = "espidf"))]
    let mut sim_minute_seconds: u64 = 0;

    loop {
        // On real hardware the CPU sits in the FreeRTOS idle task between
        // interrupts; on the host we sleep and synthesise the timer ticks
        // from wall time.
        #[cfg(target_os = "espidf")]
        esp_idf_hal::delay::FreeRtos::delay_ms(config.control_loop_interval_ms);

        #[cfg(not(target_os = "espidf"))]
        {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(
                config.control_loop_interval_ms,
            )));
            let now_secs = time::uptime_secs();
            while sim_last_second < now_secs {
                sim_last_second += 1;
                GEIGER.on_second_tick();
                push_event(Event::DoseSecondTick);
                sim_minute_seconds += 1;
                if sim_minute_seconds >= 60 {
                    sim_minute_seconds = 0;
                    COSMIC.on_minute_tick();
                    push_event(Event::CoincidenceMinuteTick);
                }
            }
        }

        // Process all pending events.
        events::drain_events(|event| {
            if event == Event::DoseSecondTick {
                telemetry_seconds += 1;
                if telemetry_seconds >= u64::from(config.telemetry_interval_secs) {
                    telemetry_seconds = 0;
                    push_event(Event::TelemetryTick);
                }
            }
            app.handle_event(event, &mut sink);
        });

        // RNG bit consumption, draw progress, capture timeouts.
        app.poll(time::now_us(), &mut sink);

        // Config auto-save (debounced after the last change).
        app.auto_save_if_needed(&nvs);

        // Feed watchdog on every iteration.
        watchdog.feed();
    }
}

/// Minimal stderr logger for host simulation runs.
#[cfg(not(target_os = "espidf"))]
fn simple_logger_init() -> Result<()> {
    struct StderrLogger;

    impl log::Log for StderrLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            eprintln!("{:5} {}", record.level(), record.args());
        }
        fn flush(&self) {}
    }

    static LOGGER: StderrLogger = StderrLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Info);
    Ok(())
}
