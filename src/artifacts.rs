//! Artifact writing/reading for the `run` and `score` CLI subcommands
//! (SPEC_FULL §4.10): matched projections and latency samples as CSV,
//! counters (plus, optionally, percentiles) as JSON.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::baseline::PercentileSummary;
use crate::driver::{LatencySample, RunCounters};
use crate::error::Result;
use crate::event::Projection;

pub fn write_projections<W: Write>(w: W, projections: &[Projection]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for p in projections {
        wtr.serialize(p)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_projections<R: Read>(r: R) -> Result<Vec<Projection>> {
    let mut rdr = csv::Reader::from_reader(r);
    let mut out = Vec::new();
    for result in rdr.deserialize() {
        out.push(result?);
    }
    Ok(out)
}

pub fn write_latencies<W: Write>(w: W, latencies: &[LatencySample]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for sample in latencies {
        wtr.serialize(sample)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_latencies<R: Read>(r: R) -> Result<Vec<LatencySample>> {
    let mut rdr = csv::Reader::from_reader(r);
    let mut out = Vec::new();
    for result in rdr.deserialize() {
        out.push(result?);
    }
    Ok(out)
}

/// The JSON summary a `run` invocation drops next to its CSV artifacts, and
/// that `score` reads back to report recall against a baseline.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub counters: RunCounters,
    pub percentiles: Option<PercentileSummary>,
}

pub fn write_summary<W: Write>(w: W, summary: &RunSummary) -> Result<()> {
    serde_json::to_writer_pretty(w, summary)?;
    Ok(())
}

pub fn read_summary<R: Read>(r: R) -> Result<RunSummary> {
    Ok(serde_json::from_reader(r)?)
}
