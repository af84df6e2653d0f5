//! Headless Battle Runner
//!
//! Runs a single battle between two freshly initialised creatures and
//! prints the outcome as JSON or text.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use creature_arena::battle::{BattleOutcome, BattleSimulator};
use creature_arena::combat::Creature;
use creature_arena::core::error::Result;
use creature_arena::core::ArenaConfig;
use creature_arena::policy::EpsilonGreedy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Headless Battle Runner - one battle, untrained policies
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run a single creature battle and print the outcome")]
struct Args {
    /// Arena configuration file (TOML); built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "A")]
    creature_a: String,

    #[arg(long, default_value = "B")]
    creature_b: String,

    /// Exploration rate for both creatures
    #[arg(long, default_value_t = 0.3)]
    epsilon: f32,

    /// Maximum ticks before stalemate (overrides the config)
    #[arg(long)]
    max_ticks: Option<u32>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct RunResult {
    seed: u64,
    #[serde(flatten)]
    outcome: BattleOutcome,
}

fn run(args: &Args, seed: u64) -> Result<BattleOutcome> {
    let mut config = match &args.config {
        Some(path) => ArenaConfig::load(path)?,
        None => ArenaConfig::default(),
    };
    if let Some(max_ticks) = args.max_ticks {
        config.combat.max_ticks = max_ticks;
    }
    config.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut a = Creature::from_config(&args.creature_a, &config, &mut rng)?;
    let mut b = Creature::from_config(&args.creature_b, &config, &mut rng)?;

    BattleSimulator::from_config(&config).run(
        &mut a,
        &mut b,
        0,
        [args.epsilon, args.epsilon],
        &mut EpsilonGreedy,
        &mut rng,
    )
}

fn print_text(result: &RunResult) {
    let outcome = &result.outcome;
    println!("Battle Result");
    println!("=============");
    for event in outcome.log.iter() {
        println!("{event}");
    }
    println!();
    match outcome.winner.name() {
        Some(name) => println!("Winner: {name}"),
        None => println!("Winner: none (stalemate)"),
    }
    println!("Ticks: {}", outcome.ticks);
    for reward in &outcome.rewards {
        println!("Reward {}: {:.2}", reward.creature, reward.total);
    }
    println!("Seed: {}", result.seed);
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        "creature_arena=debug"
    } else {
        "creature_arena=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let seed = args.seed.unwrap_or_else(rand::random);
    let outcome = match run(&args, seed) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Battle failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = RunResult { seed, outcome };

    match args.format.as_str() {
        "text" => print_text(&result),
        other => {
            if other != "json" {
                eprintln!("Unknown format '{}', defaulting to json", other);
            }
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Failed to serialize result: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
    }
    ExitCode::SUCCESS
}
