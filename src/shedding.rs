//! Dual-mode (event / hybrid) load-shedding controller (spec §4.4).
//!
//! Drives both probabilistic ingress admission and, in hybrid mode, the
//! dynamic Kleene cap the matcher reads each event. The controller never
//! errors: a missing latency sample (the very first event) is treated as a
//! zero EWMA seed, matching spec §7's error-propagation note.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::{ShedMode, SheddingConfig};

const EWMA_ALPHA: f64 = 0.2;
const OVERLOAD_HYSTERESIS_RATIO: f64 = 0.8;
const MAX_DROP_PROB: f64 = 0.9;
const CONSECUTIVE_OVERLOAD_TO_SHRINK: u32 = 3;
const CONSECUTIVE_CALM_TO_GROW: u32 = 10;

pub struct SheddingController {
    mode: ShedMode,
    target_latency_ms: f64,
    base_drop_prob: f64,
    ewma_latency: f64,
    overloaded: bool,
    consecutive_overloaded: u32,
    consecutive_calm: u32,
    current_kleene_cap: usize,
    k_max: usize,
    rng: StdRng,
}

impl SheddingController {
    /// `k_max` is the pattern's configured `max_kleene` — the ceiling the
    /// hybrid cap can never exceed, and the constant cap used verbatim in
    /// `off`/`event` modes.
    pub fn new(config: &SheddingConfig, k_max: usize) -> Self {
        Self {
            mode: config.mode,
            target_latency_ms: config.target_latency_ms,
            base_drop_prob: config.base_drop_prob,
            ewma_latency: 0.0,
            overloaded: false,
            consecutive_overloaded: 0,
            consecutive_calm: 0,
            current_kleene_cap: k_max,
            k_max,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Update controller state from the latency sample of the event just
    /// processed. Must be called once per event, after the matcher step,
    /// before the next event's `should_admit`/`current_cap` are read.
    pub fn record_latency(&mut self, latency_ms: f64) {
        self.ewma_latency = EWMA_ALPHA * latency_ms + (1.0 - EWMA_ALPHA) * self.ewma_latency;

        if self.ewma_latency > self.target_latency_ms {
            if !self.overloaded {
                warn!(
                    ewma_latency = self.ewma_latency,
                    target_latency_ms = self.target_latency_ms,
                    "shedding controller entering overloaded state"
                );
            }
            self.overloaded = true;
        } else if self.ewma_latency < OVERLOAD_HYSTERESIS_RATIO * self.target_latency_ms {
            if self.overloaded {
                debug!(ewma_latency = self.ewma_latency, "shedding controller recovered");
            }
            self.overloaded = false;
        }

        if self.mode == ShedMode::Hybrid {
            self.adjust_kleene_cap();
        }
    }

    fn adjust_kleene_cap(&mut self) {
        if self.overloaded {
            self.consecutive_overloaded += 1;
            self.consecutive_calm = 0;
            if self.consecutive_overloaded >= CONSECUTIVE_OVERLOAD_TO_SHRINK
                && self.current_kleene_cap > 1
            {
                self.current_kleene_cap -= 1;
                warn!(
                    new_cap = self.current_kleene_cap,
                    "shrinking Kleene cap under sustained overload"
                );
                self.consecutive_overloaded = 0;
            }
        } else {
            self.consecutive_calm += 1;
            self.consecutive_overloaded = 0;
            if self.consecutive_calm >= CONSECUTIVE_CALM_TO_GROW
                && self.current_kleene_cap < self.k_max
            {
                self.current_kleene_cap += 1;
                debug!(
                    new_cap = self.current_kleene_cap,
                    "growing Kleene cap after sustained calm"
                );
                self.consecutive_calm = 0;
            }
        }
    }

    /// Decide whether to admit the event currently at the head of ingress.
    pub fn should_admit(&mut self) -> bool {
        match self.mode {
            ShedMode::Off => true,
            ShedMode::Event | ShedMode::Hybrid => {
                if !self.overloaded {
                    return true;
                }
                let overload_ratio = self.ewma_latency / self.target_latency_ms;
                let p = (self.base_drop_prob * overload_ratio).min(MAX_DROP_PROB);
                self.rng.random::<f64>() >= p
            }
        }
    }

    /// The Kleene cap the matcher should apply to the current event.
    pub fn current_cap(&self) -> usize {
        match self.mode {
            ShedMode::Hybrid => self.current_kleene_cap,
            ShedMode::Off | ShedMode::Event => self.k_max,
        }
    }

    pub fn is_overloaded(&self) -> bool {
        self.overloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(mode: ShedMode, target_ms: f64, base_drop: f64, seed: u64, k_max: usize) -> SheddingController {
        let cfg = SheddingConfig {
            mode,
            target_latency_ms: target_ms,
            base_drop_prob: base_drop,
            seed,
            burst_every: None,
            burst_sleep_ms: None,
        };
        SheddingController::new(&cfg, k_max)
    }

    #[test]
    fn off_mode_always_admits_regardless_of_latency() {
        let mut c = ctrl(ShedMode::Off, 10.0, 0.9, 1, 8);
        for _ in 0..50 {
            c.record_latency(1000.0);
        }
        assert!(c.should_admit());
        assert_eq!(c.current_cap(), 8);
    }

    #[test]
    fn event_mode_never_drops_below_target() {
        let mut c = ctrl(ShedMode::Event, 100.0, 0.9, 1, 8);
        c.record_latency(10.0);
        assert!(!c.is_overloaded());
        assert!(c.should_admit());
    }

    #[test]
    fn event_mode_sheds_once_overloaded() {
        let mut c = ctrl(ShedMode::Event, 10.0, 0.9, 7, 8);
        for _ in 0..20 {
            c.record_latency(200.0);
        }
        assert!(c.is_overloaded());
        // With base_drop_prob 0.9 and heavy overload, most draws should drop.
        let admits = (0..200).filter(|_| c.should_admit()).count();
        assert!(admits < 200);
    }

    #[test]
    fn hybrid_mode_shrinks_cap_after_sustained_overload() {
        let mut c = ctrl(ShedMode::Hybrid, 10.0, 0.5, 1, 8);
        for _ in 0..CONSECUTIVE_OVERLOAD_TO_SHRINK {
            c.record_latency(1000.0);
        }
        assert_eq!(c.current_cap(), 7);
    }

    #[test]
    fn hybrid_mode_cap_never_drops_below_one() {
        let mut c = ctrl(ShedMode::Hybrid, 10.0, 0.5, 1, 2);
        for _ in 0..(CONSECUTIVE_OVERLOAD_TO_SHRINK * 10) {
            c.record_latency(1000.0);
        }
        assert_eq!(c.current_cap(), 1);
    }

    #[test]
    fn hybrid_mode_grows_cap_back_after_sustained_calm() {
        let mut c = ctrl(ShedMode::Hybrid, 100.0, 0.5, 1, 8);
        for _ in 0..CONSECUTIVE_OVERLOAD_TO_SHRINK {
            c.record_latency(1000.0);
        }
        assert_eq!(c.current_cap(), 7);
        for _ in 0..CONSECUTIVE_CALM_TO_GROW {
            c.record_latency(1.0);
        }
        assert_eq!(c.current_cap(), 8);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let mut a = ctrl(ShedMode::Event, 10.0, 0.7, 42, 8);
        let mut b = ctrl(ShedMode::Event, 10.0, 0.7, 42, 8);
        for _ in 0..10 {
            a.record_latency(500.0);
            b.record_latency(500.0);
        }
        let seq_a: Vec<bool> = (0..50).map(|_| a.should_admit()).collect();
        let seq_b: Vec<bool> = (0..50).map(|_| b.should_admit()).collect();
        assert_eq!(seq_a, seq_b);
    }
}
