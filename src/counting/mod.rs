//! Pulse-counting subsystem — rolling buffers, GM tubes and the two
//! detectors built from them.
//!
//! Everything in here is shared between interrupt context (GPIO edge and
//! timer callbacks) and the main loop, so all cross-domain state is atomic
//! with a single designated writer per field.  The modules are pure logic:
//! timestamps come in as plain `u64` microseconds, which is what makes the
//! whole subsystem host-testable without hardware.

pub mod buffer;
pub mod cosmic;
pub mod geiger;
pub mod tube;

pub use buffer::RollingBuffer;
pub use cosmic::CosmicRayDetector;
pub use geiger::GeigerCounter;
pub use tube::PulseTube;
