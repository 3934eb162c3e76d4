//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (touch UI,
//! serial console, web interface) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.
//! Setter commands carry raw values; range policy (clamping, rejection)
//! lives in the components themselves.

use crate::config::SystemConfig;
use crate::counting::geiger::MeasurementUnit;

/// Commands that external collaborators can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Enable or disable pulse counting on both GM tubes.
    SetGeigerState(bool),
    /// Arm or disarm the cosmic-ray detector.
    SetCosmicState(bool),
    /// Start or stop the random number generator and its entropy tube.
    SetRngState(bool),

    /// Set the dose integration time in seconds (clamped to [1, 60]).
    SetIntegrationTime(u8),
    /// Select the equivalent-dose measurement unit.
    SetMeasurementUnit(MeasurementUnit),
    /// Toggle metric auto-ranging of the equivalent dose.
    SetAutoRange(bool),

    /// Set the RNG range minimum (rejected if above the maximum).
    SetRngMinimum(u8),
    /// Set the RNG range maximum (rejected if below the minimum).
    SetRngMaximum(u8),
    /// Begin an asynchronous random draw.
    Roll,

    /// Hot-reload a full configuration (e.g. restored from storage).
    UpdateConfig(SystemConfig),
    /// Explicitly persist the current config immediately.
    SaveConfig,
}
