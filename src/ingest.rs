//! CSV ingestion and schema mapping (SPEC_FULL §4.7).
//!
//! A pure adapter from a bike-trip CSV (`event_id,bike_id,start_loc,end_loc,
//! start_time,end_time`, epoch-second timestamps) to `Event` values. Rejects
//! are classified and handed back to the caller rather than silently
//! dropped, so the driver can count `malformed`/`window_underflow`
//! separately (spec §7).

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::event::{Event, Location};

#[derive(Debug, Deserialize)]
struct RawRecord {
    event_id: String,
    bike_id: String,
    start_loc: String,
    end_loc: String,
    start_time: String,
    end_time: String,
}

/// Why a row was rejected before reaching the matcher (spec §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestReject {
    Malformed(String),
    WindowUnderflow,
}

impl std::fmt::Display for IngestReject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestReject::Malformed(msg) => write!(f, "malformed event: {msg}"),
            IngestReject::WindowUnderflow => write!(f, "window underflow"),
        }
    }
}

/// Interns repeated location/key strings behind `Arc<str>` so a
/// million-row run doesn't re-allocate the same station id over and over.
#[derive(Default)]
struct Interner {
    table: HashMap<String, Arc<str>>,
}

impl Interner {
    fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.table.get(s) {
            return existing.clone();
        }
        let arc: Arc<str> = Arc::from(s);
        self.table.insert(s.to_string(), arc.clone());
        arc
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Streams `Event`s out of a CSV reader in file order, assigning monotonic
/// `ingest_seq` values and rejecting malformed/out-of-order rows.
pub struct EventIngestor<R: Read> {
    reader: csv::Reader<R>,
    interner: Interner,
    next_ingest_seq: u64,
    last_start_time: Option<DateTime<Utc>>,
}

impl<R: Read> EventIngestor<R> {
    pub fn new(reader: R) -> crate::error::Result<Self> {
        let reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        Ok(Self {
            reader,
            interner: Interner::default(),
            next_ingest_seq: 0,
            last_start_time: None,
        })
    }

    fn to_event(&mut self, raw: RawRecord) -> Result<Arc<Event>, IngestReject> {
        let event_id = raw
            .event_id
            .trim()
            .parse::<u64>()
            .map_err(|_| IngestReject::Malformed(format!("bad event_id: {}", raw.event_id)))?;

        if raw.start_loc.trim().is_empty() || raw.end_loc.trim().is_empty() {
            return Err(IngestReject::Malformed("empty location".into()));
        }
        if raw.bike_id.trim().is_empty() {
            return Err(IngestReject::Malformed("empty correlation key".into()));
        }

        let start_time = parse_timestamp(&raw.start_time)
            .ok_or_else(|| IngestReject::Malformed(format!("bad start_time: {}", raw.start_time)))?;
        let end_time = parse_timestamp(&raw.end_time)
            .ok_or_else(|| IngestReject::Malformed(format!("bad end_time: {}", raw.end_time)))?;

        if end_time < start_time {
            return Err(IngestReject::Malformed("end_time < start_time".into()));
        }

        if let Some(last) = self.last_start_time {
            if start_time < last {
                return Err(IngestReject::WindowUnderflow);
            }
        }
        self.last_start_time = Some(start_time);

        let correlation_key = self.interner.intern(raw.bike_id.trim());
        let start_loc: Location = self.interner.intern(raw.start_loc.trim());
        let end_loc: Location = self.interner.intern(raw.end_loc.trim());

        let seq = self.next_ingest_seq;
        self.next_ingest_seq += 1;

        Ok(Arc::new(Event::new(
            event_id,
            correlation_key,
            start_loc,
            end_loc,
            start_time,
            end_time,
            seq,
        )))
    }
}

impl<R: Read> Iterator for EventIngestor<R> {
    type Item = Result<Arc<Event>, IngestReject>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = csv::StringRecord::new();
        loop {
            match self.reader.read_record(&mut record) {
                Ok(true) => {
                    let headers = match self.reader.headers() {
                        Ok(h) => h.clone(),
                        Err(e) => return Some(Err(IngestReject::Malformed(e.to_string()))),
                    };
                    let raw: RawRecord = match record.deserialize(Some(&headers)) {
                        Ok(r) => r,
                        Err(e) => return Some(Err(IngestReject::Malformed(e.to_string()))),
                    };
                    return Some(self.to_event(raw));
                }
                Ok(false) => return None,
                Err(e) => return Some(Err(IngestReject::Malformed(e.to_string()))),
            }
        }
    }
}
