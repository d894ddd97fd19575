//! mopred-bench - static vs incremental cloned-plate detection benchmark
//!
//! Usage:
//!   mopred-bench run
//!   mopred-bench run --config experiment.json --output results/run-1
//!   mopred-bench run --entities 300 --seed 7 --scenario hot_zones
//!   mopred-bench default-config > experiment.json

use anyhow::Context;
use clap::{Parser, Subcommand};
use mopred_bench::{ExperimentConfig, ExperimentRunner, RunReport, Variant};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mopred-bench")]
#[command(about = "Prequential comparison of static and incremental cloned-plate classifiers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an experiment and write its metrics
    Run {
        /// Experiment config (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the simulation and model seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of tracked entities
        #[arg(long)]
        entities: Option<usize>,

        /// Override the drift scenario
        #[arg(long)]
        scenario: Option<String>,

        /// Also write the generated event log
        #[arg(long)]
        events: bool,

        /// Also write per-window labels and scores
        #[arg(long)]
        scores: bool,
    },

    /// Print the default experiment config as JSON
    DefaultConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            output,
            seed,
            entities,
            scenario,
            events,
            scores,
        } => {
            let mut config = match config {
                Some(path) => ExperimentConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ExperimentConfig::default(),
            };
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            if let Some(seed) = seed {
                config.simulation.seed = seed;
                config.evaluation.seed = Some(seed);
            }
            if let Some(n) = entities {
                config.simulation.fleet.total_entities = n;
            }
            if let Some(s) = scenario {
                config.simulation.drift.scenario = s;
            }
            config.output.write_events |= events;
            config.output.write_scores |= scores;
            run(config)
        }
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&ExperimentConfig::default())?);
            Ok(())
        }
    }
}

fn run(config: ExperimentConfig) -> anyhow::Result<()> {
    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║           MOPRED Prequential Benchmark                       ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Entities: {:50} ║", config.simulation.fleet.total_entities);
    eprintln!("║ Horizon:  {:50} ║", format!("{}h", config.simulation.horizon_hours));
    eprintln!("║ Window:   {:50} ║", format!("{}h", config.evaluation.window_hours));
    eprintln!("║ Scenario: {:50} ║", config.simulation.drift.scenario);
    eprintln!("║ Output:   {:50} ║", config.output.dir.display().to_string());
    eprintln!("╚══════════════════════════════════════════════════════════════╝");

    let runner = ExperimentRunner::new(config)?;
    let outcome = runner.run_and_export()?;
    print_report(&outcome.report);
    eprintln!("Metrics: {}", runner.metrics_path().display());
    Ok(())
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "     -".to_string(), |v| format!("{v:6.3}"))
}

fn print_report(report: &RunReport) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    BENCHMARK RESULTS                         ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║ Run:          {:46} ║", report.run_id.to_string());
    println!("║ Events:       {:>10}                                     ║", report.simulation.events);
    println!("║ Windows:      {:>10}                                     ║", report.windows);
    println!("║ Pairs:        {:>10}                                     ║", report.pairs);
    println!("║ Positive:     {:>10}                                     ║", report.positive_pairs);
    println!("║ Elapsed:      {:>10} ms                                  ║", report.elapsed_ms);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║ VARIANT                  |   F1   | AUPRC  | Brier  | Scored ║");
    println!("╠──────────────────────────────────────────────────────────────╣");
    for v in Variant::ALL {
        if let Some(s) = report.summary.variant(v) {
            println!(
                "║ {:24} | {} | {} | {} | {:>6} ║",
                v.as_str(),
                fmt_metric(s.mean_f1),
                fmt_metric(s.mean_auprc),
                fmt_metric(s.mean_brier),
                s.scored_windows
            );
        }
    }
    println!("╠──────────────────────────────────────────────────────────────╣");
    for wins in &report.summary.f1_wins {
        println!(
            "║ F1 wins ({:10}): incremental {:>4} | static {:>4} | tie {:>4} ║",
            wins.feature_set.as_str(),
            wins.incremental,
            wins.static_model,
            wins.ties
        );
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
}
