//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them — log to serial, append to the SD card, hand
//! to the display collaborator.
//!
//! Every event lowers to a generic structured [`Record`]: a type tag plus a
//! fixed-capacity list of named, typed fields.  Sinks that only care about
//! transport can render records without knowing any event shape.

use heapless::Vec;

use crate::counting::geiger::{DoseUnit, RadiationRating};

/// Maximum number of fields a single record can carry.
pub const MAX_RECORD_FIELDS: usize = 16;

/// A typed field value inside a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U32(u32),
    U64(u64),
    F64(f64),
    Str(&'static str),
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::U8(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{:.4}", v),
            Self::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Type tag plus named fields — the transport-agnostic log format.
#[derive(Debug, Clone)]
pub struct Record {
    pub tag: &'static str,
    pub fields: Vec<(&'static str, Value), MAX_RECORD_FIELDS>,
}

impl Record {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            fields: Vec::new(),
        }
    }

    /// Append a field; silently drops fields past the capacity, which is
    /// sized so no event defined here can overflow it.
    fn push(mut self, key: &'static str, value: Value) -> Self {
        let _ = self.fields.push((key, value));
        self
    }
}

/// The subsystem an enable/disable event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    DoseCounter,
    CosmicRayDetector,
    RandomNumberGenerator,
}

impl Subsystem {
    const fn tag(self) -> &'static str {
        match self {
            Self::DoseCounter => "geigerCounter",
            Self::CosmicRayDetector => "cosmicRayDetector",
            Self::RandomNumberGenerator => "randomNumberGenerator",
        }
    }
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// A coincidence-confirmed cosmic-ray event was registered.
    CoincidenceEvent {
        events_per_hour: u32,
        events_total: u64,
    },

    /// One entropy bit was consumed from the decay-timing source.
    RandomBit { bit: u8 },

    /// An asynchronous draw completed.
    DrawCompleted { value: u8, minimum: u8, maximum: u8 },

    /// A subsystem was enabled or disabled.
    SubsystemState { subsystem: Subsystem, enabled: bool },

    /// The application service has started.
    Started,
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone)]
pub struct TelemetryData {
    pub counts_per_minute: f64,
    pub microsieverts_per_hour: f64,
    pub dose_value: f64,
    pub dose_unit: DoseUnit,
    pub rating: RadiationRating,
    pub counts: u64,
    pub main_tube_counts: u64,
    pub follower_tube_counts: u64,
    pub coincidence_events_per_hour: u32,
    pub coincidence_events: u64,
    pub rng_rolling: bool,
    pub entropy_bits: u64,
}

impl AppEvent {
    /// Lower the event to its generic structured record.
    pub fn to_record(&self) -> Record {
        match self {
            Self::Telemetry(t) => Record::new("telemetry")
                .push("cpm", Value::F64(t.counts_per_minute))
                .push("usvh", Value::F64(t.microsieverts_per_hour))
                .push("dose", Value::F64(t.dose_value))
                .push("doseUnit", Value::Str(t.dose_unit.abbreviation()))
                .push("rating", Value::Str(rating_name(t.rating)))
                .push("counts", Value::U64(t.counts))
                .push("mainTubeCounts", Value::U64(t.main_tube_counts))
                .push("followerTubeCounts", Value::U64(t.follower_tube_counts))
                .push("coincidencePerHour", Value::U32(t.coincidence_events_per_hour))
                .push("coincidenceEvents", Value::U64(t.coincidence_events))
                .push("rngRolling", Value::Bool(t.rng_rolling))
                .push("entropyBits", Value::U64(t.entropy_bits)),

            Self::CoincidenceEvent {
                events_per_hour,
                events_total,
            } => Record::new("coincidenceEvent")
                .push("eventsPerHour", Value::U32(*events_per_hour))
                .push("eventsTotal", Value::U64(*events_total)),

            Self::RandomBit { bit } => Record::new("randomNumberGenerator")
                .push("bit", Value::U8(*bit)),

            Self::DrawCompleted {
                value,
                minimum,
                maximum,
            } => Record::new("randomNumberGenerator")
                .push("result", Value::U8(*value))
                .push("minimum", Value::U8(*minimum))
                .push("maximum", Value::U8(*maximum)),

            Self::SubsystemState { subsystem, enabled } => Record::new("event")
                .push("source", Value::Str(subsystem.tag()))
                .push("enabled", Value::Bool(*enabled)),

            Self::Started => Record::new("event").push("source", Value::Str("started")),
        }
    }
}

fn rating_name(rating: RadiationRating) -> &'static str {
    match rating {
        RadiationRating::Normal => "normal",
        RadiationRating::Elevated => "elevated",
        RadiationRating::Medium => "medium",
        RadiationRating::High => "high",
        RadiationRating::Extreme => "extreme",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_record_has_all_fields() {
        let event = AppEvent::Telemetry(TelemetryData {
            counts_per_minute: 120.0,
            microsieverts_per_hour: 0.34,
            dose_value: 0.34,
            dose_unit: DoseUnit::MicroSievertsPerHour,
            rating: RadiationRating::Normal,
            counts: 7200,
            main_tube_counts: 3600,
            follower_tube_counts: 3600,
            coincidence_events_per_hour: 2,
            coincidence_events: 15,
            rng_rolling: false,
            entropy_bits: 42,
        });
        let record = event.to_record();
        assert_eq!(record.tag, "telemetry");
        assert_eq!(record.fields.len(), 12);
        assert!(record.fields.iter().any(|(k, _)| *k == "cpm"));
        assert!(record.fields.iter().any(|(k, _)| *k == "doseUnit"));
    }

    #[test]
    fn subsystem_state_record_names_the_source() {
        let record = AppEvent::SubsystemState {
            subsystem: Subsystem::CosmicRayDetector,
            enabled: true,
        }
        .to_record();
        assert_eq!(record.tag, "event");
        assert_eq!(
            record.fields[0],
            ("source", Value::Str("cosmicRayDetector"))
        );
        assert_eq!(record.fields[1], ("enabled", Value::Bool(true)));
    }
}
