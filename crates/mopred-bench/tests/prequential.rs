use mopred_bench::{
    EvaluationConfig, ExperimentConfig, ExperimentRunner, METRICS_CSV_HEADER, RunReport, Variant,
    VariantPipeline,
};
use mopred_core::{ArfConfig, FeaturePair, FeatureSet, ForestConfig, PairwiseFeatureExtractor};
use mopred_sim::{SimulationConfig, SimulationEngine};
use std::collections::BTreeMap;

fn small_experiment(seed: u64) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.simulation = SimulationConfig {
        seed,
        horizon_hours: 24.0,
        ..Default::default()
    };
    config.simulation.fleet.total_entities = 80;
    config.simulation.fleet.anomalous_fraction = 0.2;
    config.evaluation = EvaluationConfig {
        window_hours: 4.0,
        forest: ForestConfig {
            n_trees: 10,
            ..Default::default()
        },
        arf: ArfConfig {
            n_models: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    config
}

fn windows_of_pairs(config: &ExperimentConfig) -> Vec<Vec<FeaturePair>> {
    let out = SimulationEngine::new(config.simulation.clone())
        .unwrap()
        .run()
        .unwrap();
    let extractor = PairwiseFeatureExtractor::new(config.evaluation.extractor.clone());
    out.into_windows(config.evaluation.window_ms())
        .map(|w| extractor.extract_window(&w.events))
        .collect()
}

#[test]
fn every_window_gets_exactly_one_row_per_variant() {
    let outcome = ExperimentRunner::new(small_experiment(21))
        .unwrap()
        .run()
        .unwrap();
    let report = &outcome.report;
    assert!(report.windows > 0);
    assert_eq!(outcome.ledger.len(), 4 * report.windows);
    assert_eq!(outcome.ledger.window_count(), report.windows);

    let mut per_window: BTreeMap<usize, Vec<Variant>> = BTreeMap::new();
    for row in outcome.ledger.rows() {
        per_window.entry(row.window).or_default().push(row.variant);
    }
    for variants in per_window.values() {
        assert_eq!(variants, &Variant::ALL.to_vec());
    }
}

#[test]
fn warm_start_rows_are_null_but_counted() {
    let outcome = ExperimentRunner::new(small_experiment(22))
        .unwrap()
        .run()
        .unwrap();
    let warm = outcome.report.pipelines[0]
        .warm_start_window
        .expect("stream should contain pairs");
    for v in Variant::ALL {
        let row = outcome.ledger.get(warm, v).unwrap();
        assert_eq!(row.metrics.f1, None);
        assert!(row.metrics.n_samples > 0);
    }
    for row in outcome.ledger.rows().filter(|r| r.window < warm) {
        assert_eq!(row.metrics.n_samples, 0);
    }
}

#[test]
fn incremental_prediction_ignores_current_window_labels() {
    let config = small_experiment(23);
    let windows = windows_of_pairs(&config);
    let k = windows
        .iter()
        .enumerate()
        .filter(|(_, w)| !w.is_empty())
        .map(|(i, _)| i)
        .nth(2)
        .expect("need three non-empty windows");

    let mut original = VariantPipeline::new(FeatureSet::Basic, &config.evaluation, 5).unwrap();
    let mut flipped = VariantPipeline::new(FeatureSet::Basic, &config.evaluation, 5).unwrap();
    for (i, pairs) in windows.iter().enumerate().take(k) {
        original.process(i, pairs);
        flipped.process(i, pairs);
    }

    let inverted: Vec<FeaturePair> = windows[k]
        .iter()
        .cloned()
        .map(|mut p| {
            p.label = 1 - p.label;
            p
        })
        .collect();
    let a = original.process(k, &windows[k]);
    let b = flipped.process(k, &inverted);

    assert_eq!(a.traces.len(), 2);
    for (ta, tb) in a.traces.iter().zip(&b.traces) {
        assert_eq!(ta.variant, tb.variant);
        assert_eq!(ta.y_score, tb.y_score);
        assert_ne!(ta.y_true, tb.y_true);
    }
}

#[test]
fn identical_configs_produce_identical_metrics() {
    let a = ExperimentRunner::new(small_experiment(24)).unwrap().run().unwrap();
    let b = ExperimentRunner::new(small_experiment(24)).unwrap().run().unwrap();
    let rows_a: Vec<_> = a.ledger.rows().cloned().collect();
    let rows_b: Vec<_> = b.ledger.rows().cloned().collect();
    assert_eq!(rows_a, rows_b);
    assert_ne!(a.report.run_id, b.report.run_id);
}

#[test]
fn run_and_export_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_experiment(25);
    config.output.dir = dir.path().join("run");
    config.output.write_events = true;
    config.output.write_scores = true;

    let runner = ExperimentRunner::new(config).unwrap();
    let outcome = runner.run_and_export().unwrap();
    let run_dir = dir.path().join("run");

    let csv = std::fs::read_to_string(runner.metrics_path()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some(METRICS_CSV_HEADER));
    assert_eq!(lines.count(), outcome.ledger.len());

    let jsonl = std::fs::read_to_string(run_dir.join("metrics.jsonl")).unwrap();
    assert_eq!(jsonl.lines().count(), outcome.ledger.len());

    let events = std::fs::read_to_string(run_dir.join("events.csv")).unwrap();
    assert_eq!(events.lines().count(), outcome.report.simulation.events + 1);

    let scores = std::fs::read_to_string(run_dir.join("scores.jsonl")).unwrap();
    assert_eq!(scores.lines().count(), outcome.traces.len());

    let report: RunReport =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("report.json")).unwrap()).unwrap();
    assert_eq!(report.run_id, outcome.report.run_id);
    assert_eq!(report.rows, outcome.ledger.len());
}

#[test]
fn invalid_configuration_is_rejected_before_running() {
    let mut config = small_experiment(26);
    config.simulation.drift.scenario = "meteor_shower".to_string();
    let runner = ExperimentRunner::new(config).unwrap();
    assert!(runner.run().is_err());

    let mut config = small_experiment(26);
    config.evaluation.arf.n_models = 0;
    assert!(ExperimentRunner::new(config).is_err());
}
