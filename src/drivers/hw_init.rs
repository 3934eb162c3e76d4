//! One-shot GPIO bring-up and ISR trampolines for the detector lines.
//!
//! Configures the four trigger inputs, installs the GPIO ISR service and
//! attaches a rising-edge handler per line.  The trampolines stamp the edge
//! with the monotonic microsecond clock and hand it straight to the owning
//! component — an O(1) path with no allocation and no logging, as required
//! in interrupt context.
//!
//! Attach failures propagate as [`InitError`]; the affected detector then
//! simply never sees edges and stays at zero, while the rest of the
//! firmware keeps running.

use crate::error::InitError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::adapters::time;
#[cfg(target_os = "espidf")]
use crate::events::{push_event, Event};
#[cfg(target_os = "espidf")]
use crate::instrument;
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Edge trampolines (ISR context) ────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn main_trg_isr(_arg: *mut core::ffi::c_void) {
    instrument::GEIGER.on_main_edge(time::now_us());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn follower_trg_isr(_arg: *mut core::ffi::c_void) {
    instrument::GEIGER.on_follower_edge(time::now_us());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn coincidence_trg_isr(_arg: *mut core::ffi::c_void) {
    let now_us = time::now_us();
    let main_last = instrument::GEIGER.main_tube().last_pulse_us();
    let follower_last = instrument::GEIGER.follower_tube().last_pulse_us();
    if instrument::COSMIC.on_coincidence_edge(now_us, main_last, follower_last) {
        push_event(Event::CoincidenceDetected);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn random_trg_isr(_arg: *mut core::ffi::c_void) {
    instrument::ENTROPY.on_edge(time::now_us());
}

// ── Bring-up ──────────────────────────────────────────────────

/// Configure the four trigger lines as floating inputs with a rising-edge
/// interrupt type.  The front end drives the lines push-pull, so no
/// internal pulls are wanted.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), InitError> {
    let mask = (1u64 << pins::MAIN_TRG_GPIO)
        | (1u64 << pins::FOLLOWER_TRG_GPIO)
        | (1u64 << pins::COINCIDENCE_TRG_GPIO)
        | (1u64 << pins::RANDOM_TRG_GPIO);

    let cfg = gpio_config_t {
        pin_bit_mask: mask,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_POSEDGE,
    };

    // SAFETY: called once from the single main task before the event loop.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK {
        return Err(InitError::GpioConfigFailed(ret));
    }

    info!("hw_init: trigger inputs configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), InitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

/// Install the GPIO ISR service and attach the per-line trampolines.
#[cfg(target_os = "espidf")]
pub fn attach_detector_isrs() -> Result<(), InitError> {
    // SAFETY: single main-task context; handlers are attached before any
    // detector is enabled, and each handler checks its component's enabled
    // flag before touching state.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(InitError::IsrInstallFailed(ret));
        }

        type IsrFn = unsafe extern "C" fn(*mut core::ffi::c_void);
        for (gpio, handler) in [
            (pins::MAIN_TRG_GPIO, main_trg_isr as IsrFn),
            (pins::FOLLOWER_TRG_GPIO, follower_trg_isr as IsrFn),
            (pins::COINCIDENCE_TRG_GPIO, coincidence_trg_isr as IsrFn),
            (pins::RANDOM_TRG_GPIO, random_trg_isr as IsrFn),
        ] {
            let ret = gpio_isr_handler_add(gpio, Some(handler), core::ptr::null_mut());
            if ret != ESP_OK {
                return Err(InitError::IsrAttachFailed(ret));
            }
        }
    }

    info!("hw_init: edge handlers attached to 4 trigger lines");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn attach_detector_isrs() -> Result<(), InitError> {
    log::info!("hw_init(sim): edge handlers not attached");
    Ok(())
}

/// Detach every trigger-line handler (shutdown / test hook).
#[cfg(target_os = "espidf")]
pub fn detach_detector_isrs() {
    // SAFETY: main-task only; removing a handler that was never added is a
    // harmless ESP_ERR_INVALID_STATE.
    unsafe {
        for gpio in [
            pins::MAIN_TRG_GPIO,
            pins::FOLLOWER_TRG_GPIO,
            pins::COINCIDENCE_TRG_GPIO,
            pins::RANDOM_TRG_GPIO,
        ] {
            gpio_isr_handler_remove(gpio);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn detach_detector_isrs() {}
