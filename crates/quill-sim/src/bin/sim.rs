#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use quill_sim::campaign::{self, CampaignConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "quill-sim: deterministic fault-injection harness for the issue composer",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run a campaign across many seeds",
        after_help = "EXAMPLES:\n    # Run the default campaign (100 seeds, full fault injection)\n    sim run\n\n    # Run a campaign from a TOML config\n    sim run --config campaign.toml\n\n    # Quick pass over 10 seeds\n    sim run --seeds 10 --rounds 16"
    )]
    Run {
        /// Campaign config file (TOML). Missing keys use defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the seed range to 0..N.
        #[arg(long)]
        seeds: Option<u64>,

        /// Override the number of user operations per seed.
        #[arg(long)]
        rounds: Option<u64>,
    },

    #[command(
        about = "Replay one seed with a full operation trace",
        after_help = "EXAMPLES:\n    # Replay the seed a campaign reported as first_failure\n    sim replay --seed 7\n\n    # Replay against the same config the campaign ran with\n    sim replay --seed 7 --config campaign.toml"
    )]
    Replay {
        /// Seed to replay.
        #[arg(long)]
        seed: u64,

        /// Campaign config file (TOML). Missing keys use defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the number of user operations.
        #[arg(long)]
        rounds: Option<u64>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUILL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "quill=debug,info"
        } else {
            "quill=info,warn"
        })
    });

    let format = env::var("QUILL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn effective_config(
    path: Option<&Path>,
    seeds: Option<u64>,
    rounds: Option<u64>,
) -> Result<CampaignConfig> {
    let mut config = match path {
        Some(p) => CampaignConfig::load(p)?,
        None => CampaignConfig::default(),
    };
    if let Some(count) = seeds {
        config.seed_range = 0..count;
    }
    if let Some(count) = rounds {
        config.rounds = count;
    }
    config.validate()?;
    Ok(config)
}

fn run_command(config: Option<&Path>, seeds: Option<u64>, rounds: Option<u64>) -> Result<()> {
    let config = effective_config(config, seeds, rounds)?;
    let report = campaign::run_campaign(&config)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(seed) = report.first_failure {
        bail!(
            "{} of {} seeds failed; replay the first with: sim replay --seed {seed}",
            report.failures.len(),
            report.seeds_run
        );
    }
    Ok(())
}

fn replay_command(seed: u64, config: Option<&Path>, rounds: Option<u64>) -> Result<()> {
    let config = effective_config(config, None, rounds)?;
    let trace = campaign::replay_seed(seed, &config)?;

    for event in &trace.result.trace {
        println!("{}", serde_json::to_string(event)?);
    }

    if trace.violations.is_empty() {
        println!(
            "replay complete: seed={} trace_events={} issue_created={} interesting={}",
            seed,
            trace.result.trace.len(),
            trace.result.issue_created,
            trace.result.interesting_state_reached
        );
    } else {
        println!("replay found {} violation(s):", trace.violations.len());
        for violation in &trace.violations {
            println!("  {violation}");
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            seeds,
            rounds,
        } => run_command(config.as_deref(), seeds, rounds),
        Commands::Replay {
            seed,
            config,
            rounds,
        } => replay_command(seed, config.as_deref(), rounds),
    }
}
