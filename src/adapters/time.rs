//! Monotonic time source.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic,
//!   ISR-safe — the edge trampolines stamp pulses with it).
//! - **`not(target_os = "espidf")`** — uses `std::time::Instant` for
//!   host-side simulation.  Tests never call this; they pass explicit
//!   timestamps into the components instead.

/// Microseconds since boot (monotonic).
#[cfg(target_os = "espidf")]
pub fn now_us() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
}

/// Microseconds since boot (monotonic).
#[cfg(not(target_os = "espidf"))]
pub fn now_us() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// Seconds since boot (monotonic).
pub fn uptime_secs() -> u64 {
    now_us() / 1_000_000
}
