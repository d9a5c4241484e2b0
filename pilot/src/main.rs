//! Decision-loop driver for vision-language navigation episodes.
//!
//! Drives one or more `(place, id)` episodes: validates the label timeline,
//! generates the subtask list through the external decomposition step, then
//! runs the policy-driven decision loop until a termination condition fires.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use pilot::core::label::{stop_start_time, time_bound};
use pilot::exit_codes;
use pilot::io::config::{PilotConfig, load_config};
use pilot::io::depth::EstimatorOutputDir;
use pilot::io::generator::CommandGenerator;
use pilot::io::layout::{DatasetPaths, EstimatorPaths, RunPaths, experiment_name};
use pilot::io::policy::OllamaPolicy;
use pilot::logging;
use pilot::looping::{LoopStop, run_loop};
use pilot::start::{check_label, start_run};

#[derive(Parser)]
#[command(
    name = "pilot",
    version,
    about = "Subtask-state decision loop for vision-language navigation runs"
)]
struct Cli {
    /// Path to the pilot configuration file.
    #[arg(short, long, default_value = "pilot.toml")]
    config: PathBuf,

    /// Root directory holding dataset/, runs/ and estimator output.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the subtask list and drive the decision loop for each id.
    Run {
        #[arg(short, long)]
        place: String,
        /// Episode ids within the place.
        #[arg(short, long, num_args = 1.., required = true)]
        ids: Vec<u32>,
    },
    /// Validate a ground-truth label file.
    CheckLabel {
        #[arg(short, long)]
        place: String,
        #[arg(short, long)]
        id: u32,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Run { place, ids } => cmd_run(&cli.root, &cfg, &place, &ids),
        Command::CheckLabel { place, id } => {
            let dataset = DatasetPaths::new(&cli.root, &place, id);
            check_label(&dataset)?;
            println!("{place}_{id} label is well-formed");
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_run(root: &Path, cfg: &PilotConfig, place: &str, ids: &[u32]) -> Result<i32> {
    let exp = experiment_name(cfg.mode, &cfg.estimator);
    info!(exp = %exp, mode = %cfg.mode, estimator = %cfg.estimator, "experiment configured");

    // Runs share nothing: an abandoned episode must not stop the rest.
    let mut abandoned = 0usize;
    for &id in ids {
        if let Err(err) = run_one(root, cfg, &exp, place, id) {
            error!(place, id, err = %format!("{err:#}"), "run abandoned");
            abandoned += 1;
        }
    }
    Ok(if abandoned > 0 {
        exit_codes::ABANDONED
    } else {
        exit_codes::OK
    })
}

fn run_one(root: &Path, cfg: &PilotConfig, exp: &str, place: &str, id: u32) -> Result<()> {
    let dataset = DatasetPaths::new(root, place, id);
    let run = RunPaths::new(root, exp, place, id);

    let labels = check_label(&dataset)?;
    let stop_start = stop_start_time(&labels).context("label timeline has no [STOP] span")?;
    let bound = time_bound(stop_start, cfg.tick_interval(), cfg.safety_margin_ticks);
    info!(place, id, stop_start, bound, "time bound derived");

    let generator = CommandGenerator::new(cfg.generator.command.clone());
    let start = start_run(&dataset, &run, cfg, &generator)?;
    info!(
        subtasks = start.subtask_count,
        attempts = start.generation_attempts,
        "run bootstrapped"
    );

    let depth = EstimatorOutputDir::new(EstimatorPaths::new(root, &cfg.estimator, place, id));
    let policy = OllamaPolicy::new(&cfg.policy.endpoint, &cfg.policy.model, cfg.policy_timeout())?;

    let outcome = run_loop(&dataset, &run, cfg, &policy, &depth, bound, |tick| {
        info!(time = %tick.time, action = ?tick.action, "tick");
    })?;

    match outcome.stop {
        LoopStop::TimeBoundExceeded { elapsed, bound } => {
            info!(place, id, %elapsed, bound, ticks = outcome.ticks_executed, "run ended at time bound");
        }
        LoopStop::RepeatedStop { stops, at } => {
            info!(place, id, stops, %at, ticks = outcome.ticks_executed, "run ended on repeated stop");
        }
        LoopStop::PolicyUnavailable { at, attempts } => {
            return Err(anyhow!("policy unavailable at {at} after {attempts} attempts"));
        }
    }
    Ok(())
}
