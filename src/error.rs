//! Unified error types for the radmeter firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level control loop's error handling
//! uniform.  All variants are `Copy` so they can be cheaply passed around
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peripheral initialisation failed (GPIO config, ISR service, timer).
    Init(InitError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Peripheral initialisation errors
// ---------------------------------------------------------------------------

/// Errors during one-shot peripheral bring-up.
///
/// A component whose interrupt source failed to attach stays in the
/// Disabled state; the firmware keeps running with the remaining detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// GPIO direction/pull configuration failed (raw IDF return code).
    GpioConfigFailed(i32),
    /// GPIO ISR service install failed.
    IsrInstallFailed(i32),
    /// Attaching an edge handler to a trigger line failed.
    IsrAttachFailed(i32),
    /// Creating or starting a periodic hardware timer failed.
    TimerFailed(i32),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={rc})"),
            Self::IsrAttachFailed(rc) => write!(f, "edge handler attach failed (rc={rc})"),
            Self::TimerFailed(rc) => write!(f, "hardware timer setup failed (rc={rc})"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
