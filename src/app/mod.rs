//! Application core — orchestration of the detector components.
//!
//! The [`service::AppService`] ties the dose counter, cosmic-ray detector
//! and random number generator together and speaks to the outside world
//! (settings store, structured log transport, UI) exclusively through the
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
