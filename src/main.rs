//! `bikecep` — streaming CEP engine for bike-trip Kleene-plus detection
//! with adaptive load shedding (SPEC_FULL §4.9).
//!
//! Three subcommands: `run` drives a CSV stream through the matcher and
//! shedder and writes artifacts; `score` computes recall and percentiles
//! from a run's artifacts against a baseline run; `generate` emits a
//! synthetic fixture for local experimentation.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use bikecep::artifacts::{
    read_latencies, read_projections, write_latencies, write_projections, write_summary,
    RunSummary,
};
use bikecep::baseline::{recall, PercentileSummary};
use bikecep::config::RunConfig;
use bikecep::driver::{BurstConfig, StreamDriver};
use bikecep::gen::{generate_csv, GenConfig};
use bikecep::ingest::EventIngestor;
use bikecep::Result;

#[derive(Parser)]
#[command(name = "bikecep", version, about = "Bike-trip Kleene-plus CEP engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the matcher/shedder over a CSV input, writing projections,
    /// latencies, and a counters summary.
    Run {
        /// TOML file with `[pattern]` and `[shedding]` sections.
        #[arg(long)]
        config: PathBuf,
        /// Input CSV of bike-trip rows.
        #[arg(long)]
        input: PathBuf,
        /// Directory artifacts are written into (created if absent).
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Compute recall of one run's projections against a baseline run's,
    /// and print the shedded run's latency percentiles.
    Score {
        /// Output directory of the run being scored (from `run --out-dir`).
        #[arg(long)]
        run_dir: PathBuf,
        /// Output directory of the `mode = off` baseline run.
        #[arg(long)]
        baseline_dir: PathBuf,
    },
    /// Emit a synthetic bike-trip CSV fixture.
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 100)]
        bikes: u64,
        #[arg(long, default_value_t = 3)]
        chain_len: usize,
        #[arg(long, default_value = "9")]
        terminator: String,
        #[arg(long, default_value_t = 0.5)]
        closing_fraction: f64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            config,
            input,
            out_dir,
        } => run_cmd(config, input, out_dir),
        Command::Score {
            run_dir,
            baseline_dir,
        } => score_cmd(run_dir, baseline_dir),
        Command::Generate {
            out,
            seed,
            bikes,
            chain_len,
            terminator,
            closing_fraction,
        } => generate_cmd(out, seed, bikes, chain_len, terminator, closing_fraction),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bikecep failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_cmd(config_path: PathBuf, input_path: PathBuf, out_dir: PathBuf) -> Result<()> {
    let config_str = std::fs::read_to_string(&config_path)?;
    let config = RunConfig::from_toml_str(&config_str)?;

    info!(input = %input_path.display(), "starting run");
    let file = File::open(&input_path)?;
    let ingestor = EventIngestor::new(file)?;

    let burst = BurstConfig::from_shedding(&config.shedding);
    let driver = StreamDriver::new(&config.pattern, &config.shedding, burst);
    let output = driver.run(ingestor)?;

    std::fs::create_dir_all(&out_dir)?;
    write_projections(
        BufWriter::new(File::create(out_dir.join("projections.csv"))?),
        &output.projections,
    )?;
    write_latencies(
        BufWriter::new(File::create(out_dir.join("latencies.csv"))?),
        &output.latencies,
    )?;

    let summary = RunSummary {
        counters: output.counters,
        percentiles: PercentileSummary::from_samples(&output.latencies),
    };
    write_summary(
        BufWriter::new(File::create(out_dir.join("summary.json"))?),
        &summary,
    )?;

    info!(counters = ?summary.counters, "run complete");
    Ok(())
}

fn score_cmd(run_dir: PathBuf, baseline_dir: PathBuf) -> Result<()> {
    let shedded = read_projections(File::open(run_dir.join("projections.csv"))?)?;
    let baseline = read_projections(File::open(baseline_dir.join("projections.csv"))?)?;
    let latencies = read_latencies(File::open(run_dir.join("latencies.csv"))?)?;

    let recall_value = recall(&shedded, &baseline);
    let percentiles = PercentileSummary::from_samples(&latencies);

    println!("recall: {:.4}", recall_value);
    if let Some(p) = percentiles {
        println!(
            "latency p50={:.3}ms p95={:.3}ms p99={:.3}ms",
            p.p50_ms, p.p95_ms, p.p99_ms
        );
    } else {
        println!("latency: no samples");
    }
    Ok(())
}

fn generate_cmd(
    out: PathBuf,
    seed: u64,
    bikes: u64,
    chain_len: usize,
    terminator: String,
    closing_fraction: f64,
) -> Result<()> {
    let config = GenConfig {
        seed,
        bikes,
        chain_len,
        terminator,
        closing_fraction,
        ..GenConfig::default()
    };
    let mut file = BufWriter::new(File::create(&out)?);
    generate_csv(&mut file, &config)?;
    info!(out = %out.display(), bikes, "generated synthetic fixture");
    Ok(())
}
