use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing_subscriber::EnvFilter;

use snake_neat::config::AppConfig;
use snake_neat::evaluation::{ControllerFactory, Evaluator};
use snake_neat::snake::cli::TerminalView;
use snake_neat::snake::episode::{run_episode, Controller, EpisodeSetup, Observer, Unobserved};
use snake_neat::snake::food::{PresetFood, RandomFood};
use snake_neat::snake::geometry::Direction;
use snake_neat::storage::{load_json, RunArtifacts};
use snake_neat::training::{Checkpoint, Trainer};

#[derive(Parser)]
#[command(name = "snake_neat")]
#[command(about = "Evolve neural network controllers that play Snake")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evolve a population and save the champion to the output directory
    Train {
        #[arg(long, default_value = "config/snake.json")]
        config: PathBuf,
        #[arg(long, default_value_t = 100)]
        generations: usize,
        #[arg(long, default_value = "runs/latest")]
        out: PathBuf,
        /// Continue from a checkpoint written by an earlier run
        #[arg(long)]
        resume: Option<PathBuf>,
    },
    /// Replay a saved champion's best game, then let it play fresh ones
    Watch {
        #[arg(long, default_value = "runs/latest")]
        run: PathBuf,
        /// Fresh games to average after the replay
        #[arg(long)]
        games: Option<usize>,
        /// Skip drawing the replay
        #[arg(long)]
        headless: bool,
    },
    /// Play yourself: arrow keys or WASD, q to quit
    Play {
        #[arg(long, default_value = "config/snake.json")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Args::parse().command {
        Command::Train { config, generations, out, resume } => train(&config, generations, out, resume.as_deref()),
        Command::Watch { run, games, headless } => watch(run, games, headless),
        Command::Play { config } => play(&config),
    }
}

fn train(config_path: &Path, generations: usize, out: PathBuf, resume: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let trainer = match resume {
        Some(path) => Trainer::resume(config, load_json::<Checkpoint>(path)?)?,
        None => Trainer::new(config)?,
    };
    let mut trainer = trainer.with_artifacts(RunArtifacts::new(out));

    match trainer.run(generations)? {
        Some(champion) => tracing::info!(
            generation = champion.generation,
            fitness = champion.fitness,
            score = champion.score,
            "training finished"
        ),
        None => tracing::warn!("training finished without a champion"),
    }
    Ok(())
}

fn watch(run: PathBuf, games: Option<usize>, headless: bool) -> Result<()> {
    let artifacts = RunArtifacts::new(run);
    let (config, genome, recorded) = artifacts.load_best()?;
    let mut policy = config.network_factory().build(&genome);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.evaluation.seed);

    let episode = config.episode_config(!headless);
    let mut food = PresetFood::new(recorded.replay.foods.clone(), Xoshiro256PlusPlus::seed_from_u64(rng.gen()));
    policy.reset();
    let outcome = {
        let mut observer: Box<dyn Observer> =
            if headless {
                Box::new(Unobserved)
            } else {
                Box::new(TerminalView::new("champion replay (q to quit)", false)?)
            };
        run_episode(&episode, recorded.replay.setup, &mut policy, &mut food, observer.as_mut())
    };
    tracing::info!(score = outcome.score, recorded = recorded.score, reason = %outcome.reason, "replay finished");
    if outcome.score != recorded.score {
        tracing::warn!("replay diverged from the recorded game");
    }

    let games = games.unwrap_or(config.playback.watch_games);
    if games > 0 {
        let evaluator = Evaluator::new(config.episode_config(false), games, false);
        let evaluation = evaluator.evaluate_controller(&mut policy, &mut rng);
        let best = evaluation.best_outcome().map_or(0, |o| o.score);
        tracing::info!(games, average = evaluation.fitness, best, "fresh games finished");
    }
    Ok(())
}

fn play(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let mut episode = config.episode_config(true);
    // a human pressing the opposite key should not end the game on the spot
    episode.rules.reversal_guard = true;

    let mut rng = Xoshiro256PlusPlus::from_entropy();
    let setup = EpisodeSetup::random(&episode.grid, episode.initial_length, &mut rng);
    let mut food = RandomFood::new(Xoshiro256PlusPlus::seed_from_u64(rng.gen()));
    let mut keep_heading = |_: &[f64], heading: Direction| heading;
    let outcome = {
        let mut view = TerminalView::new("arrows or WASD to steer, q to quit", true)?;
        run_episode(&episode, setup, &mut keep_heading, &mut food, &mut view)
    };
    tracing::info!(score = outcome.score, ticks = outcome.ticks, reason = %outcome.reason, "game over");
    Ok(())
}
