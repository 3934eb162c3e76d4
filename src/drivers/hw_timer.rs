//! Periodic hardware timers using ESP-IDF's esp_timer API.
//!
//! Two timers drive the rolling buffers:
//! - 1 Hz: advance the dose counter's per-second buffer
//! - 1/min: advance the cosmic-ray detector's per-minute buffer
//!
//! Each callback performs the O(1) buffer advance itself (the advance must
//! happen exactly once per tick, at tick time) and then pushes an event so
//! the main loop can do the non-time-critical follow-up work (history,
//! telemetry cadence).
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so the
//! atomic buffer operations and push_event() are both safe there.
//!
//! On host targets the timers do not exist; the simulation loop in
//! `main()` calls the same advance + push sequence from wall time.

use crate::error::InitError;

#[cfg(target_os = "espidf")]
use crate::events::{push_event, Event};
#[cfg(target_os = "espidf")]
use crate::instrument;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
static mut DOSE_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut COSMIC_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn dose_tick_cb(_arg: *mut core::ffi::c_void) {
    instrument::GEIGER.on_second_tick();
    push_event(Event::DoseSecondTick);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn cosmic_tick_cb(_arg: *mut core::ffi::c_void) {
    instrument::COSMIC.on_minute_tick();
    push_event(Event::CoincidenceMinuteTick);
}

#[cfg(target_os = "espidf")]
unsafe fn create_periodic(
    name: &'static [u8],
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    period_us: u64,
    slot: *mut esp_timer_handle_t,
) -> Result<(), InitError> {
    let args = esp_timer_create_args_t {
        callback: Some(callback),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr() as *const _,
        skip_unhandled_events: false,
    };
    // SAFETY: slot points at a static handle written once at boot from the
    // single main-task context before any callback fires.
    let ret = unsafe { esp_timer_create(&args, slot) };
    if ret != ESP_OK {
        return Err(InitError::TimerFailed(ret));
    }
    let ret = unsafe { esp_timer_start_periodic(*slot, period_us) };
    if ret != ESP_OK {
        return Err(InitError::TimerFailed(ret));
    }
    Ok(())
}

/// Start the buffer-advance timers: dose @ 1 Hz, cosmic @ 1/min.
#[cfg(target_os = "espidf")]
pub fn start_timers() -> Result<(), InitError> {
    // SAFETY: boot-time single-task context, see create_periodic.
    unsafe {
        create_periodic(b"dose\0", dose_tick_cb, 1_000_000, &raw mut DOSE_TIMER)?;
        create_periodic(
            b"cosmic\0",
            cosmic_tick_cb,
            60_000_000,
            &raw mut COSMIC_TIMER,
        )?;
    }
    info!("hw_timer: dose@1Hz + cosmic@1/min started");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers() -> Result<(), InitError> {
    log::info!("hw_timer(sim): timers not started (ticks driven by sleep loop)");
    Ok(())
}

/// Stop the buffer-advance timers.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: handles are valid if start_timers() succeeded; null-check
    // prevents touching timers that were never created.
    unsafe {
        let dose = DOSE_TIMER;
        if !dose.is_null() {
            esp_timer_stop(dose);
        }
        let cosmic = COSMIC_TIMER;
        if !cosmic.is_null() {
            esp_timer_stop(cosmic);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
