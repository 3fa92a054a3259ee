//! Baseline / recall harness and latency percentile reporting (spec §4.6).
//!
//! Recall is computed off the hot path, after a run completes: it compares
//! the projections a shedded run emitted against a baseline run of the same
//! input under `mode = off` (spec's Testable Property 6, "seeding preserves
//! baseline"). Percentiles are an ambient addition for the `score` CLI
//! subcommand, reusing the pack's order-statistics approach via `statrs`.

use std::collections::HashSet;

use statrs::statistics::{Data, OrderStatistics};

use crate::driver::LatencySample;
use crate::event::Projection;

/// Recall of a shedded run `r` against baseline `b`: `|R ∩ B| / |B|`,
/// computed via exact tuple equality over projections. A `b` of zero
/// matches defines recall as `1.0` (nothing to have missed).
pub fn recall(shedded: &[Projection], baseline: &[Projection]) -> f64 {
    if baseline.is_empty() {
        return 1.0;
    }
    let r: HashSet<&Projection> = shedded.iter().collect();
    let b: HashSet<&Projection> = baseline.iter().collect();
    let intersection = r.intersection(&b).count();
    intersection as f64 / b.len() as f64
}

/// p50/p95/p99 of a run's per-event latency samples, nearest-rank method.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct PercentileSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl PercentileSummary {
    pub fn from_samples(samples: &[LatencySample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut data = Data::new(samples.iter().map(|s| s.latency_ms).collect::<Vec<_>>());
        Some(Self {
            p50_ms: data.percentile(50),
            p95_ms: data.percentile(95),
            p99_ms: data.percentile(99),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proj(a: &str, b: &str, c: &str) -> Projection {
        Projection::new(a, b, c)
    }

    fn sample(seq: u64, ms: f64) -> LatencySample {
        LatencySample {
            ingest_seq: seq,
            latency_ms: ms,
        }
    }

    #[test]
    fn recall_is_one_when_baseline_is_empty() {
        assert_eq!(recall(&[], &[]), 1.0);
    }

    #[test]
    fn recall_is_one_when_shedded_matches_baseline_exactly() {
        let baseline = vec![proj("A", "B", "9"), proj("B", "C", "9")];
        let shedded = baseline.clone();
        assert_eq!(recall(&shedded, &baseline), 1.0);
    }

    #[test]
    fn recall_reflects_dropped_matches() {
        let baseline = vec![proj("A", "B", "9"), proj("B", "C", "9")];
        let shedded = vec![proj("A", "B", "9")];
        assert_eq!(recall(&shedded, &baseline), 0.5);
    }

    #[test]
    fn recall_ignores_spurious_extra_matches_not_in_baseline() {
        let baseline = vec![proj("A", "B", "9")];
        let shedded = vec![proj("A", "B", "9"), proj("X", "Y", "9")];
        assert_eq!(recall(&shedded, &baseline), 1.0);
    }

    #[test]
    fn percentile_summary_is_none_for_empty_samples() {
        assert!(PercentileSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn percentile_summary_orders_correctly_for_uniform_samples() {
        let samples: Vec<_> = (1..=100).map(|i| sample(i, i as f64)).collect();
        let summary = PercentileSummary::from_samples(&samples).unwrap();
        assert!(summary.p50_ms < summary.p95_ms);
        assert!(summary.p95_ms < summary.p99_ms);
        assert!(summary.p99_ms <= 100.0);
    }
}
