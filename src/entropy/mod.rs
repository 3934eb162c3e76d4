//! True-randomness subsystem: decay-timing bit extraction and the
//! rejection-sampling number generator built on top of it.

pub mod rng;
pub mod source;

pub use rng::RandomNumberGenerator;
pub use source::EntropySource;
