//! Creature Arena - Entry Point
//!
//! Loads the arena configuration, builds the two combatants and runs one
//! training batch with file-backed checkpoints and logs.

use std::path::{Path, PathBuf};

use clap::Parser;
use creature_arena::combat::Creature;
use creature_arena::core::error::{ArenaError, Result};
use creature_arena::core::ArenaConfig;
use creature_arena::training::{FileCheckpointStore, FileLogSink, TrainingSession};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const DEFAULT_CONFIG: &str = "data/arena.toml";

/// Train two creatures against each other
#[derive(Parser, Debug)]
#[command(name = "creature-arena")]
#[command(about = "Train two creatures against each other with policy-gradient learning")]
struct Args {
    /// Arena configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Epochs to run in this batch
    #[arg(long)]
    epochs: Option<u64>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Start from fresh parameters even if checkpoints exist
    #[arg(long)]
    no_resume: bool,

    /// Abort when a checkpoint has no optimizer state
    #[arg(long)]
    require_optimizer_state: bool,

    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print one `data: {json}` line per epoch on stdout
    #[arg(long)]
    stream: bool,

    /// First combatant (defaults to the first configured creature)
    #[arg(long)]
    creature_a: Option<String>,

    /// Second combatant (defaults to the second configured creature)
    #[arg(long)]
    creature_b: Option<String>,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn load_config(path: Option<&Path>) -> Result<ArenaConfig> {
    match path {
        Some(path) => ArenaConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).is_file() => ArenaConfig::load(Path::new(DEFAULT_CONFIG)),
        None => {
            tracing::warn!("{} not found, using built-in defaults", DEFAULT_CONFIG);
            Ok(ArenaConfig::default())
        }
    }
}

fn pick_combatants(config: &ArenaConfig, args: &Args) -> Result<(String, String)> {
    let mut names = config.creatures.keys();
    let a = match &args.creature_a {
        Some(name) => name.clone(),
        None => names
            .next()
            .cloned()
            .ok_or_else(|| ArenaError::InvalidConfig("no creatures configured".into()))?,
    };
    let b = match &args.creature_b {
        Some(name) => name.clone(),
        None => config
            .creatures
            .keys()
            .find(|name| **name != a)
            .cloned()
            .ok_or_else(|| ArenaError::InvalidConfig("need two configured creatures".into()))?,
    };
    Ok((a, b))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "creature_arena=debug"
    } else {
        "creature_arena=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    if args.no_resume {
        config.training.resume = false;
    }
    if args.require_optimizer_state {
        config.training.require_optimizer_state = true;
    }
    if let Some(dir) = &args.checkpoint_dir {
        config.training.checkpoint_dir = dir.clone();
    }
    if let Some(dir) = &args.log_dir {
        config.training.log_dir = dir.clone();
    }
    config.validate()?;

    let (name_a, name_b) = pick_combatants(&config, &args)?;
    tracing::info!("Creature Arena starting: {} vs {}", name_a, name_b);

    let mut rng = ChaCha8Rng::seed_from_u64(config.training.seed);
    let creature_a = Creature::from_config(&name_a, &config, &mut rng)?;
    let creature_b = Creature::from_config(&name_b, &config, &mut rng)?;

    let store = FileCheckpointStore::new(&config.training.checkpoint_dir);
    let mut sink = FileLogSink::new(&config.training.log_dir)
        .with_battle_logs(config.training.write_battle_logs)
        .with_summary(config.training.write_summary);
    if args.stream {
        sink = sink.with_stdout_stream();
    }

    let mut session = TrainingSession::new(&config, creature_a, creature_b, store, sink, rng)?;
    let summary = session.run()?;

    if !args.stream {
        print!("{summary}");
    }
    Ok(())
}
