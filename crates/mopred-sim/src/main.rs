//! mopred-sim - ALPR detection stream simulator
//!
//! Usage:
//!   mopred-sim generate --entities 500 --output events.csv
//!   mopred-sim generate --config sim.json --format json-lines --output events.jsonl
//!   mopred-sim list

use anyhow::Context;
use clap::{Parser, Subcommand};
use mopred_sim::{EventLogFormat, SimulationConfig, SimulationEngine, list_scenarios, write_events};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mopred-sim")]
#[command(about = "ALPR detection stream simulation with cloned-plate ground truth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an event log
    Generate {
        /// Simulation config (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: EventLogFormat,

        /// Override the RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of tracked entities
        #[arg(long)]
        entities: Option<usize>,

        /// Override the drift scenario
        #[arg(long)]
        scenario: Option<String>,
    },

    /// List available drift scenarios
    List,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            config,
            output,
            format,
            seed,
            entities,
            scenario,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => SimulationConfig::default(),
            };
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(n) = entities {
                config.fleet.total_entities = n;
            }
            if let Some(s) = scenario {
                config.drift.scenario = s;
            }
            run_generate(config, output, format)
        }
        Commands::List => {
            run_list();
            Ok(())
        }
    }
}

fn load_config(path: &PathBuf) -> anyhow::Result<SimulationConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn run_generate(config: SimulationConfig, output: Option<PathBuf>, format: EventLogFormat) -> anyhow::Result<()> {
    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║           MOPRED-SIM Stream Generation                       ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Entities: {:50} ║", config.fleet.total_entities);
    eprintln!("║ Horizon:  {:50} ║", format!("{}h from {}", config.horizon_hours, config.start_time));
    eprintln!("║ Scenario: {:50} ║", config.drift.scenario);
    eprintln!("║ Seed:     {:50} ║", config.seed);
    eprintln!("╚══════════════════════════════════════════════════════════════╝");

    let engine = SimulationEngine::new(config)?;
    let out = engine.run()?;

    match output {
        Some(path) => {
            mopred_sim::write_events_to_path(&path, &out.events, format)?;
            eprintln!("Wrote {} events to {}", out.stats.events, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_events(&mut stdout.lock(), &out.events, format)?;
        }
    }

    eprintln!();
    eprintln!("  Events:           {}", out.stats.events);
    eprintln!("  Flagged events:   {}", out.stats.flagged_events);
    eprintln!(
        "  Anomalous plates: {}/{}",
        out.stats.anomalous_entities, out.stats.entities
    );
    Ok(())
}

fn run_list() {
    println!("Available drift scenarios:");
    println!();
    for (name, description) in list_scenarios() {
        println!("  {:15} {}", name, description);
    }
}
