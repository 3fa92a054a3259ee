//! The per-event pattern-matching driver (spec §4.3).
//!
//! Implements the four-step contract verbatim: window eviction, Kleene
//! continuation, terminator closure, and seeding — in that order, with
//! extensions and closures both processed in index-insertion order so that
//! output is deterministic for a given input stream (spec §5's ordering
//! guarantee).
//!
//! The current `kleene_cap` is checked both when extending a chain and
//! again when closing one on a terminator: a chain already longer than the
//! cap can be sitting in the index after a hybrid-mode shrink (the
//! controller adjusts the cap without touching already-installed
//! `PartialMatch`es), so closure re-checks `pm.length() <= kleene_cap`
//! rather than trusting the cap that was in effect when the chain grew.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PatternConfig;
use crate::error::Result;
use crate::event::{Event, Match};
use crate::index::{IndexCounters, PartialMatch, PartialMatchIndex};

/// The three predicates from spec §9's "pluggable predicate bundle",
/// inlined here rather than exposed as trait objects — the pattern is
/// fixed, so dynamic dispatch buys nothing.
fn chain_ok(pm: &PartialMatch, event: &Event, window: chrono::Duration) -> bool {
    pm.tail_end_loc == event.start_loc
        && event.start_time >= pm.tail_end_time
        && event.end_time - pm.anchor_time <= window
}

fn terminator_ok(event: &Event, targets: &HashSet<String>) -> bool {
    targets.contains(event.end_loc.as_ref())
}

pub struct Matcher {
    index: PartialMatchIndex,
    target_end_locs: HashSet<String>,
    window: chrono::Duration,
}

impl Matcher {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            index: PartialMatchIndex::new(config.window()),
            target_end_locs: config.target_end_locs.clone(),
            window: config.window(),
        }
    }

    pub fn index_counters(&self) -> IndexCounters {
        self.index.counters()
    }

    /// Advance the state machine for one admitted event. `kleene_cap` is
    /// read once at the start of the step, per spec §4.4's "the matcher
    /// reads the current k as KleeneCap each event".
    pub fn process_event(&mut self, event: Arc<Event>, kleene_cap: usize) -> Result<Vec<Match>> {
        // Step 1: window eviction.
        self.index.evict_expired(event.start_time);

        let key = event.correlation_key.clone();

        // Snapshot the chains that existed before this event, in their
        // stable insertion order.
        let before: Vec<PartialMatch> = self.index.candidates_for(&key).cloned().collect();

        // Step 2: Kleene continuation (non-destructive).
        let mut extended = Vec::new();
        for pm in &before {
            if chain_ok(pm, &event, self.window) && pm.length() + 1 <= kleene_cap {
                let pm2 = pm.extended(event.clone());
                self.index.install(pm2.clone());
                extended.push(pm2);
            }
        }

        // Step 3: terminator closure, over existing chains plus the chains
        // just installed in step 2, in insertion order.
        let mut matches = Vec::new();
        if terminator_ok(&event, &self.target_end_locs) {
            for pm in before.iter().chain(extended.iter()) {
                if chain_ok(pm, &event, self.window) && pm.length() <= kleene_cap {
                    let mut events = Vec::with_capacity(pm.events.len() + 1);
                    events.extend(pm.events.iter().cloned());
                    events.push(event.clone());
                    matches.push(Match {
                        events,
                        detected_at: Instant::now(),
                    });
                }
            }
        }

        // Step 4: seeding, performed last so the new length-1 chain cannot
        // close on the same event.
        if 1 <= kleene_cap {
            self.index.install(PartialMatch::seed(event));
        }

        Ok(matches)
    }
}
