// End-to-end integration tests: CSV -> StreamDriver -> artifacts on disk,
// exercising the full pipeline the `run`/`score` subcommands drive.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;

use bikecep::artifacts::{read_latencies, read_projections, write_latencies, write_projections};
use bikecep::baseline::recall;
use bikecep::config::{PatternConfig, ShedMode, SheddingConfig};
use bikecep::driver::{BurstConfig, StreamDriver};
use bikecep::event::Projection;
use bikecep::gen::{generate_csv, GenConfig};
use bikecep::ingest::EventIngestor;

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(locs: &[&str]) -> HashSet<String> {
        locs.iter().map(|s| s.to_string()).collect()
    }

    fn run_csv(
        csv: &str,
        pattern: &PatternConfig,
        shedding: &SheddingConfig,
    ) -> bikecep::driver::RunOutput {
        let ingestor = EventIngestor::new(std::io::Cursor::new(csv.as_bytes().to_vec())).unwrap();
        let driver = StreamDriver::new(pattern, shedding, BurstConfig::default());
        driver.run(ingestor).unwrap()
    }

    #[test]
    fn csv_to_driver_s1_round_trip() {
        let csv = "event_id,bike_id,start_loc,end_loc,start_time,end_time\n\
                   1,1,A,B,0,100\n\
                   2,1,B,C,100,200\n\
                   3,1,C,9,200,300\n";
        let pattern = PatternConfig::new(targets(&["9"]), 3600, 8).unwrap();
        let shedding = SheddingConfig::off();
        let out = run_csv(csv, &pattern, &shedding);

        assert_eq!(out.counters.ingested, 3);
        assert_eq!(out.counters.forwarded, 3);
        assert_eq!(out.counters.matches, 2);
        assert!(out.projections.contains(&Projection::new("A", "C", "9")));
        assert!(out.projections.contains(&Projection::new("B", "C", "9")));
    }

    #[test]
    fn projections_and_latencies_round_trip_through_tempfile_artifacts() {
        let csv = "event_id,bike_id,start_loc,end_loc,start_time,end_time\n\
                   1,1,A,B,0,100\n\
                   2,1,B,C,100,200\n\
                   3,1,C,9,200,300\n";
        let pattern = PatternConfig::new(targets(&["9"]), 3600, 8).unwrap();
        let shedding = SheddingConfig::off();
        let out = run_csv(csv, &pattern, &shedding);

        let dir = tempfile::tempdir().unwrap();
        let proj_path = dir.path().join("projections.csv");
        let lat_path = dir.path().join("latencies.csv");

        write_projections(
            BufWriter::new(File::create(&proj_path).unwrap()),
            &out.projections,
        )
        .unwrap();
        write_latencies(
            BufWriter::new(File::create(&lat_path).unwrap()),
            &out.latencies,
        )
        .unwrap();

        let read_back = read_projections(File::open(&proj_path).unwrap()).unwrap();
        let read_latencies_back = read_latencies(File::open(&lat_path).unwrap()).unwrap();

        assert_eq!(read_back.len(), out.projections.len());
        assert_eq!(read_latencies_back.len(), out.latencies.len());
        assert_eq!(read_latencies_back.len(), 3);
    }

    #[test]
    fn generated_fixture_run_has_expected_match_count_for_fully_closing_chains() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("fixture.csv");

        let gen_config = GenConfig {
            seed: 3,
            bikes: 20,
            chain_len: 3,
            terminator: "9".to_string(),
            closing_fraction: 1.0,
            ..GenConfig::default()
        };
        let mut file = BufWriter::new(File::create(&csv_path).unwrap());
        generate_csv(&mut file, &gen_config).unwrap();
        drop(file);

        let pattern = PatternConfig::new(targets(&["9"]), 3600, 8).unwrap();
        let shedding = SheddingConfig::off();
        let ingestor = EventIngestor::new(File::open(&csv_path).unwrap()).unwrap();
        let driver = StreamDriver::new(&pattern, &shedding, BurstConfig::default());
        let out = driver.run(ingestor).unwrap();

        // Every bike's 3-event chain closes on the terminator: each bike
        // contributes a length-2 match (a1,a2,b) and a length-1 match (a2,b).
        assert_eq!(out.counters.matches, 40);
        assert_eq!(out.counters.ingested, 60);
    }

    #[test]
    fn mode_off_recall_against_freshly_recomputed_baseline_is_one() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("fixture.csv");

        let gen_config = GenConfig {
            seed: 11,
            bikes: 15,
            chain_len: 4,
            terminator: "9".to_string(),
            closing_fraction: 0.6,
            ..GenConfig::default()
        };
        let mut file = BufWriter::new(File::create(&csv_path).unwrap());
        generate_csv(&mut file, &gen_config).unwrap();
        drop(file);

        let pattern = PatternConfig::new(targets(&["9"]), 3600, 8).unwrap();
        let shedding = SheddingConfig::off();

        let run_a = {
            let ingestor = EventIngestor::new(File::open(&csv_path).unwrap()).unwrap();
            StreamDriver::new(&pattern, &shedding, BurstConfig::default())
                .run(ingestor)
                .unwrap()
        };
        let run_b = {
            let ingestor = EventIngestor::new(File::open(&csv_path).unwrap()).unwrap();
            StreamDriver::new(&pattern, &shedding, BurstConfig::default())
                .run(ingestor)
                .unwrap()
        };

        assert_eq!(recall(&run_a.projections, &run_b.projections), 1.0);
    }

    #[test]
    fn event_mode_shedding_never_exceeds_baseline_recall() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("fixture.csv");

        let gen_config = GenConfig {
            seed: 21,
            bikes: 30,
            chain_len: 3,
            terminator: "9".to_string(),
            closing_fraction: 0.7,
            ..GenConfig::default()
        };
        let mut file = BufWriter::new(File::create(&csv_path).unwrap());
        generate_csv(&mut file, &gen_config).unwrap();
        drop(file);

        let pattern = PatternConfig::new(targets(&["9"]), 3600, 8).unwrap();
        let baseline = {
            let ingestor = EventIngestor::new(File::open(&csv_path).unwrap()).unwrap();
            StreamDriver::new(&pattern, &SheddingConfig::off(), BurstConfig::default())
                .run(ingestor)
                .unwrap()
        };

        let shedding = SheddingConfig {
            mode: ShedMode::Event,
            target_latency_ms: 0.0001,
            base_drop_prob: 0.9,
            seed: 5,
            burst_every: None,
            burst_sleep_ms: None,
        };
        let shedded = {
            let ingestor = EventIngestor::new(File::open(&csv_path).unwrap()).unwrap();
            StreamDriver::new(&pattern, &shedding, BurstConfig::default())
                .run(ingestor)
                .unwrap()
        };

        let recall_value = recall(&shedded.projections, &baseline.projections);
        assert!(recall_value <= 1.0);
    }
}
