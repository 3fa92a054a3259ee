//! The stream driver: ingress → shedder → matcher → output (spec §4.5).
//!
//! Single-threaded cooperative scheduling per spec §5 — the driver, shedder,
//! matcher, and index all run on one logical worker with no locks. The only
//! suspension point is the optional burst-mode sleep, used purely as a
//! load-injection facility for tests and never touched by pattern semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::{PatternConfig, SheddingConfig};
use crate::error::Result;
use crate::event::{Event, Projection};
use crate::ingest::IngestReject;
use crate::matcher::Matcher;
use crate::shedding::SheddingController;

/// Run counters, exposed at end of run (spec §6's "Counters (collaborator)").
#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RunCounters {
    pub ingested: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub matches: u64,
    pub evictions: u64,
    pub malformed: u64,
    pub window_underflow: u64,
}

/// A single per-event wall-clock latency sample, from pre-shed to
/// post-matcher, feeding both the controller's EWMA and the end-of-run
/// percentile report (spec §4.6).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct LatencySample {
    pub ingest_seq: u64,
    pub latency_ms: f64,
}

/// Optional load-injection facility: purely a test/demo knob, never part of
/// pattern semantics (spec §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct BurstConfig {
    pub burst_every: Option<u64>,
    pub burst_sleep: Option<Duration>,
}

impl BurstConfig {
    pub fn from_shedding(config: &SheddingConfig) -> Self {
        Self {
            burst_every: config.burst_every,
            burst_sleep: config.burst_sleep_ms.map(Duration::from_millis),
        }
    }
}

/// Everything a run produces: matched projections, per-event latencies, and
/// final counters.
pub struct RunOutput {
    pub projections: Vec<Projection>,
    pub latencies: Vec<LatencySample>,
    pub counters: RunCounters,
}

pub struct StreamDriver {
    matcher: Matcher,
    shedder: SheddingController,
    burst: BurstConfig,
    counters: RunCounters,
    latencies: Vec<LatencySample>,
    projections: Vec<Projection>,
    events_seen: u64,
    cancel: Arc<AtomicBool>,
    clock: Box<dyn Clock>,
}

impl StreamDriver {
    pub fn new(pattern: &PatternConfig, shedding: &SheddingConfig, burst: BurstConfig) -> Self {
        Self::with_clock(pattern, shedding, burst, Box::new(SystemClock))
    }

    /// Inject an explicit clock — the `run`/`score` binaries always use the
    /// real system clock; tests script a [`crate::clock::FakeClock`] to make
    /// shedding decisions reproducible.
    pub fn with_clock(
        pattern: &PatternConfig,
        shedding: &SheddingConfig,
        burst: BurstConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            matcher: Matcher::new(pattern),
            shedder: SheddingController::new(shedding, pattern.max_kleene),
            burst,
            counters: RunCounters::default(),
            latencies: Vec::new(),
            projections: Vec::new(),
            events_seen: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// A handle the caller can flip to stop the run between events
    /// (cooperative cancellation, spec §5 — the matcher never preempts
    /// mid-event).
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Drive the full pipeline over an ingestion iterator, returning once
    /// the source is exhausted or cancellation is requested.
    pub fn run<I>(mut self, events: I) -> Result<RunOutput>
    where
        I: Iterator<Item = std::result::Result<Arc<Event>, IngestReject>>,
    {
        info!("stream driver starting");
        for item in events {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }

            match item {
                Err(IngestReject::Malformed(_)) => {
                    self.counters.malformed += 1;
                    continue;
                }
                Err(IngestReject::WindowUnderflow) => {
                    self.counters.window_underflow += 1;
                    continue;
                }
                Ok(event) => self.process_one(event)?,
            }
        }

        self.counters.evictions = self.matcher.index_counters().evictions;

        info!(
            ingested = self.counters.ingested,
            forwarded = self.counters.forwarded,
            dropped = self.counters.dropped,
            matches = self.counters.matches,
            evictions = self.counters.evictions,
            "stream driver finished"
        );

        Ok(RunOutput {
            projections: self.projections,
            latencies: self.latencies,
            counters: self.counters,
        })
    }

    fn process_one(&mut self, event: Arc<Event>) -> Result<()> {
        self.counters.ingested += 1;
        self.events_seen += 1;

        if let Some(every) = self.burst.burst_every {
            if every > 0 && self.events_seen % every == 0 {
                if let Some(sleep) = self.burst.burst_sleep {
                    std::thread::sleep(sleep);
                }
            }
        }

        let start = self.clock.now();

        let admit = self.shedder.should_admit();
        if admit {
            self.counters.forwarded += 1;
            let cap = self.shedder.current_cap();
            let matches = self.matcher.process_event(event.clone(), cap)?;
            self.counters.matches += matches.len() as u64;
            self.projections
                .extend(matches.iter().map(|m| m.projection()));
        } else {
            self.counters.dropped += 1;
        }

        let latency_ms = self.clock.now().duration_since(start).as_secs_f64() * 1000.0;
        self.shedder.record_latency(latency_ms);
        self.latencies.push(LatencySample {
            ingest_seq: event.ingest_seq,
            latency_ms,
        });

        Ok(())
    }
}
