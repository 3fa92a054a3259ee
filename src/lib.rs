//! Streaming complex-event-processing engine for bike-trip Kleene-plus
//! detection with adaptive load shedding.
//!
//! The pipeline is: [`ingest`] turns raw CSV rows into [`event::Event`]s,
//! [`driver::StreamDriver`] feeds them through [`shedding::SheddingController`]
//! and [`matcher::Matcher`] in lockstep, and [`baseline`]/[`artifacts`] turn
//! the resulting matches into recall scores and on-disk reports.

pub mod artifacts;
pub mod baseline;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod gen;
pub mod index;
pub mod ingest;
pub mod matcher;
pub mod shedding;

pub use error::{CepError, Result};
