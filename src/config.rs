//! Pattern and shedding configuration: immutable per run, validated once at
//! startup (§7 `ConfigError` — fails fast, never partially applied).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CepError, Result};

/// `{ target_end_locs, window_seconds, max_kleene }` from spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub target_end_locs: HashSet<String>,
    pub window_seconds: i64,
    pub max_kleene: usize,
}

impl PatternConfig {
    pub fn new(target_end_locs: HashSet<String>, window_seconds: i64, max_kleene: usize) -> Result<Self> {
        let cfg = Self {
            target_end_locs,
            window_seconds,
            max_kleene,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_end_locs.is_empty() {
            return Err(CepError::Config(
                "target_end_locs must not be empty".into(),
            ));
        }
        if self.window_seconds <= 0 {
            return Err(CepError::Config("window_seconds must be > 0".into()));
        }
        if self.max_kleene < 1 {
            return Err(CepError::Config("max_kleene must be >= 1".into()));
        }
        Ok(())
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_seconds)
    }
}

/// Shedding controller mode (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShedMode {
    Off,
    Event,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheddingConfig {
    pub mode: ShedMode,
    pub target_latency_ms: f64,
    pub base_drop_prob: f64,
    pub seed: u64,
    pub burst_every: Option<u64>,
    pub burst_sleep_ms: Option<u64>,
}

impl SheddingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.base_drop_prob) {
            return Err(CepError::Config(
                "base_drop_prob must be within [0, 1]".into(),
            ));
        }
        if self.target_latency_ms <= 0.0 {
            return Err(CepError::Config("target_latency_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn off() -> Self {
        Self {
            mode: ShedMode::Off,
            target_latency_ms: f64::MAX,
            base_drop_prob: 0.0,
            seed: 0,
            burst_every: None,
            burst_sleep_ms: None,
        }
    }
}

/// Top-level run configuration, as deserialized from a TOML file; CLI flags
/// override individual fields after loading (see `cli.rs`/`main.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub pattern: PatternConfig,
    pub shedding: SheddingConfig,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: RunConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.pattern.validate()?;
        self.shedding.validate()?;
        Ok(())
    }
}
