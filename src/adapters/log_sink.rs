//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each event's structured record
//! through the `log` facade (UART / USB-CDC in production).  An SD-card or
//! wireless adapter would implement the same trait and persist the records
//! instead; the core neither knows nor cares.

use core::fmt::Write as _;

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Upper bound on a rendered record line.
const LINE_CAP: usize = 256;

/// Adapter that logs every [`AppEvent`] as a `tag | key=value ...` line.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let record = event.to_record();

        let mut line: heapless::String<LINE_CAP> = heapless::String::new();
        // A record that overflows the line is truncated, not dropped.
        let _ = write!(line, "{}", record.tag);
        for (key, value) in &record.fields {
            let _ = write!(line, " | {}={}", key, value);
        }

        info!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::Subsystem;

    #[test]
    fn emit_does_not_panic_on_any_event() {
        let mut sink = LogEventSink::new();
        sink.emit(&AppEvent::Started);
        sink.emit(&AppEvent::RandomBit { bit: 1 });
        sink.emit(&AppEvent::SubsystemState {
            subsystem: Subsystem::DoseCounter,
            enabled: false,
        });
        sink.emit(&AppEvent::CoincidenceEvent {
            events_per_hour: 3,
            events_total: 99,
        });
    }
}
