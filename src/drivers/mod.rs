//! Platform layer: GPIO bring-up, ISR trampolines, hardware timers and the
//! task watchdog.  Everything ESP-IDF-specific lives here behind
//! `#[cfg(target_os = "espidf")]`; host builds get no-op stand-ins.

pub mod hw_init;
pub mod hw_timer;
pub mod watchdog;
