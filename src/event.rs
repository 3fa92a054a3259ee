//! Core value types for the bike-trip event stream.
//!
//! Events are immutable once constructed and are never copied after
//! ingestion — `PartialMatch` chains hold `Arc<Event>` references so that a
//! single trip can participate in many simultaneously-live chains without
//! duplicating its payload (see `index.rs`).

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// An interned location identifier. Bike-share station ids repeat constantly
/// across a run, so we intern them behind `Arc<str>` rather than allocating
/// a fresh `String` per event.
pub type Location = Arc<str>;

/// The correlation key events are grouped by (the bike id in the reference
/// scenario). Kept as an interned string so ingestion does not need to know
/// whether the source data uses numeric or alphanumeric ids.
pub type CorrelationKey = Arc<str>;

/// A single bike-trip event, as handed from ingestion to the matcher.
///
/// `start_time`/`end_time` are logical timestamps from the data source and
/// are never compared against wall-clock time; `ingest_seq` is the
/// monotonic arrival index the driver assigns on admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_id: u64,
    pub correlation_key: CorrelationKey,
    pub start_loc: Location,
    pub end_loc: Location,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub ingest_seq: u64,
}

impl Event {
    pub fn new(
        event_id: u64,
        correlation_key: impl Into<CorrelationKey>,
        start_loc: impl Into<Location>,
        end_loc: impl Into<Location>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        ingest_seq: u64,
    ) -> Self {
        Self {
            event_id,
            correlation_key: correlation_key.into(),
            start_loc: start_loc.into(),
            end_loc: end_loc.into(),
            start_time,
            end_time,
            ingest_seq,
        }
    }

    /// Elapsed logical time from `start_time` to `end_time`, in seconds.
    /// Never negative: `end_time < start_time` is rejected at ingestion.
    pub fn duration_seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}

/// A completed Kleene-plus match `(a1, …, ak, b)`.
///
/// `detected_at` is the wall-clock instant the terminator closed the chain,
/// used only for latency accounting — never for pattern semantics.
#[derive(Debug, Clone)]
pub struct Match {
    pub events: Vec<Arc<Event>>,
    pub detected_at: Instant,
}

impl Match {
    pub fn projection(&self) -> Projection {
        let a1 = &self.events[0];
        let last_a = &self.events[self.events.len() - 2];
        let b = &self.events[self.events.len() - 1];
        Projection {
            a1_start: a1.start_loc.clone(),
            last_a_end: last_a.end_loc.clone(),
            b_end: b.end_loc.clone(),
        }
    }

    /// Kleene length k: the number of `a[i]` events, excluding the terminator.
    pub fn kleene_len(&self) -> usize {
        self.events.len() - 1
    }
}

/// The externally observable triple emitted per `Match`; the recall
/// evaluation universe is a set of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Projection {
    pub a1_start: String,
    pub last_a_end: String,
    pub b_end: String,
}

impl From<(Location, Location, Location)> for Projection {
    fn from((a1_start, last_a_end, b_end): (Location, Location, Location)) -> Self {
        Self {
            a1_start: a1_start.to_string(),
            last_a_end: last_a_end.to_string(),
            b_end: b_end.to_string(),
        }
    }
}

// `Projection` is serialized with plain `String`s (Arc<str> has no direct
// serde impl pulled in here); build it explicitly rather than deriving from
// the Arc<str> fields of Match.
impl Projection {
    pub fn new(a1_start: &str, last_a_end: &str, b_end: &str) -> Self {
        Self {
            a1_start: a1_start.to_string(),
            last_a_end: last_a_end.to_string(),
            b_end: b_end.to_string(),
        }
    }
}
