//! GPIO pin assignments for the radmeter main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.
//!
//! All four detector inputs are open-collector pulse lines from the analog
//! front end, pulled up on the board and driven low between pulses.

// ---------------------------------------------------------------------------
// Detector trigger lines (rising-edge interrupt inputs)
// ---------------------------------------------------------------------------

/// Main GM tube trigger output.
pub const MAIN_TRG_GPIO: i32 = 42;

/// Follower GM tube trigger output.
pub const FOLLOWER_TRG_GPIO: i32 = 41;

/// Coincidence trigger: the front end ANDs the main and follower pulse
/// shapers, so this line only pulses when both tubes fire together.
pub const COINCIDENCE_TRG_GPIO: i32 = 40;

/// RNG tube trigger output (dedicated low-activity tube for decay timing).
pub const RANDOM_TRG_GPIO: i32 = 39;

// ---------------------------------------------------------------------------
// UART debug
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;
