//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - GPIO ISRs (a registered coincidence event)
//! - Timer callbacks (per-second dose tick, per-minute coincidence tick)
//! - Software (telemetry cadence, inbound commands)
//!
//! Events are consumed by the main loop, which drains the queue once per
//! iteration and reacts in FIFO order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ GPIO ISR    │────▶│              │     │              │
//! │ Timer ISR   │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Software    │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types, ordered by rough priority.
/// Lower discriminant = higher priority when multiple events
/// are pending simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// The coincidence line registered a confirmed cosmic-ray event.
    CoincidenceDetected = 0,

    /// The 1 Hz dose timer advanced the per-second rolling buffer.
    DoseSecondTick = 10,
    /// The 1/min cosmic timer advanced the per-minute rolling buffer.
    CoincidenceMinuteTick = 11,

    /// Telemetry report timer fired.
    TelemetryTick = 30,
    /// Incoming command from an external collaborator (serial console, UI).
    CommandReceived = 31,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// ISRs write (produce), main loop reads (consume).
// Uses atomic head/tail indices.  The buffer is intentionally
// kept in a static so ISR callbacks can access it.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: EVENT_BUFFER slots are written only by the single producer side
// (ISR / timer-task context) at positions the consumer has not yet claimed,
// and read only by the single main-loop consumer.  The Acquire/Release
// pairs on EVENT_HEAD/EVENT_TAIL publish each slot before it is read.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from ISR context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    // SAFETY: single producer; this slot is outside the consumer's
    // published range until the Release store below.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::CoincidenceDetected),
        10 => Some(Event::DoseSecondTick),
        11 => Some(Event::CoincidenceMinuteTick),
        30 => Some(Event::TelemetryTick),
        31 => Some(Event::CommandReceived),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The queue is a process-wide static, so exercise it in a single test
    // to avoid ordering dependencies between test threads.
    #[test]
    fn fifo_roundtrip_and_drain() {
        while pop_event().is_some() {}

        assert!(push_event(Event::DoseSecondTick));
        assert!(push_event(Event::CoincidenceDetected));
        assert!(push_event(Event::TelemetryTick));
        assert_eq!(queue_len(), 3);

        let mut seen = Vec::new();
        drain_events(|e| seen.push(e));
        assert_eq!(
            seen,
            vec![
                Event::DoseSecondTick,
                Event::CoincidenceDetected,
                Event::TelemetryTick
            ]
        );
        assert_eq!(pop_event(), None);
    }
}
