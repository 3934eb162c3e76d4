//! Process-wide detector instances.
//!
//! The GPIO edge and timer trampolines are plain `extern "C"` functions and
//! cannot capture, so the components they feed live in `static`s, built
//! `const` with default calibration.  `main()` owns the wiring: it loads
//! the stored configuration, pushes it into these instances through the
//! [`AppService`](crate::app::service::AppService), and hands out borrows.
//! Nothing else reaches for these statics directly — tests construct their
//! own local instances instead.

use crate::counting::{CosmicRayDetector, GeigerCounter};
use crate::entropy::EntropySource;
use crate::{config, pins};

/// Two-tube dose counter on the main and follower trigger lines.
pub static GEIGER: GeigerCounter = GeigerCounter::new(
    pins::MAIN_TRG_GPIO,
    pins::FOLLOWER_TRG_GPIO,
    config::DEFAULT_TUBE_DEAD_TIME_US,
);

/// Coincidence detector on the hardware-AND trigger line.
pub static COSMIC: CosmicRayDetector = CosmicRayDetector::new(
    pins::COINCIDENCE_TRG_GPIO,
    config::DEFAULT_TUBE_DEAD_TIME_US,
    config::DEFAULT_COINCIDENCE_WINDOW_US,
);

/// Decay-timing entropy source on the RNG tube line.
pub static ENTROPY: EntropySource = EntropySource::new(
    pins::RANDOM_TRG_GPIO,
    config::DEFAULT_TUBE_DEAD_TIME_US,
);
