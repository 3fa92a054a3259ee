//! The partial-match index: per-correlation-key queues of live, growing
//! Kleene chains, with window-based eviction.
//!
//! Grounded on the correlation-buffer idiom in the CEP event-correlation
//! engine this module descends from (a `HashMap<key, Vec<Event>>` with a
//! window-based `retain`). A per-key queue is still append-only on
//! `install`, but non-destructive extension (`PartialMatch::extended`)
//! appends a chain that *inherits its parent's anchor_time* at the back of
//! the queue, behind siblings seeded later with a newer anchor_time — so
//! anchor_time is not guaranteed non-decreasing front-to-back within a key.
//! Eviction therefore scans the whole per-key queue with `retain` rather
//! than popping only from the front.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::event::{CorrelationKey, Event, Location};

/// A non-empty, in-progress `a[1..k]` prefix of the pattern.
#[derive(Debug, Clone)]
pub struct PartialMatch {
    pub key: CorrelationKey,
    pub anchor_time: DateTime<Utc>,
    pub tail_end_loc: Location,
    pub tail_end_time: DateTime<Utc>,
    pub events: Vec<Arc<Event>>,
}

impl PartialMatch {
    /// Seed a new length-1 chain from `event`.
    pub fn seed(event: Arc<Event>) -> Self {
        Self {
            key: event.correlation_key.clone(),
            anchor_time: event.start_time,
            tail_end_loc: event.end_loc.clone(),
            tail_end_time: event.end_time,
            events: vec![event],
        }
    }

    /// Extend this chain with `event`, producing a new, longer chain.
    /// Non-destructive: `self` is left untouched so the caller can keep it
    /// live for other branches.
    pub fn extended(&self, event: Arc<Event>) -> Self {
        let mut events = Vec::with_capacity(self.events.len() + 1);
        events.extend(self.events.iter().cloned());
        events.push(event.clone());
        Self {
            key: self.key.clone(),
            anchor_time: self.anchor_time,
            tail_end_loc: event.end_loc.clone(),
            tail_end_time: event.end_time,
            events,
        }
    }

    pub fn length(&self) -> usize {
        self.events.len()
    }
}

/// Eviction/observability counters owned by the index.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexCounters {
    pub evictions: u64,
}

/// Per-correlation-key ordered lists of live partial matches. No cross-key
/// interaction: every operation is scoped to a single key's FIFO.
#[derive(Default)]
pub struct PartialMatchIndex {
    chains: HashMap<CorrelationKey, VecDeque<PartialMatch>>,
    window: chrono::Duration,
    counters: IndexCounters,
}

impl PartialMatchIndex {
    pub fn new(window: chrono::Duration) -> Self {
        Self {
            chains: HashMap::new(),
            window,
            counters: IndexCounters::default(),
        }
    }

    /// Remove every partial match, across all keys, whose window has
    /// expired as of `now_event_time`. Must run before extension/closure
    /// consider the current event.
    ///
    /// Scans each key's whole queue rather than only its front: an extended
    /// chain keeps its parent's (older) anchor_time but is appended at the
    /// back, so a stale chain can sit behind a newer sibling and would be
    /// missed by front-only popping.
    pub fn evict_expired(&mut self, now_event_time: DateTime<Utc>) {
        let window = self.window;
        for chains in self.chains.values_mut() {
            let before = chains.len();
            chains.retain(|pm| now_event_time <= pm.anchor_time + window);
            self.counters.evictions += (before - chains.len()) as u64;
        }
    }

    /// Live chains for `key`, oldest anchor first. Empty if there are none.
    pub fn candidates_for(&self, key: &CorrelationKey) -> impl Iterator<Item = &PartialMatch> {
        self.chains.get(key).into_iter().flatten()
    }

    /// Append a freshly constructed partial match for its key.
    pub fn install(&mut self, pm: PartialMatch) {
        self.chains.entry(pm.key.clone()).or_default().push_back(pm);
    }

    pub fn counters(&self) -> IndexCounters {
        self.counters
    }

    #[cfg(test)]
    pub fn live_count(&self, key: &CorrelationKey) -> usize {
        self.chains.get(key).map(VecDeque::len).unwrap_or(0)
    }
}
