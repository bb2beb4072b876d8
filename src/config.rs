use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::evaluation::Evaluator;
use crate::neat::Settings;
use crate::policy::NetworkFactory;
use crate::snake::engine::MovementRules;
use crate::snake::episode::EpisodeConfig;
use crate::snake::geometry::{Direction, Grid};
use crate::snake::sensors::Encoding;

fn default_max_stall() -> usize {
    100
}

fn default_cycle_window() -> usize {
    10
}

fn default_initial_length() -> usize {
    1
}

fn default_trials() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_tick_millis() -> u64 {
    100
}

fn default_watch_games() -> usize {
    10
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub grid_size: i32,
    pub encoding: Encoding,
    #[serde(default = "default_max_stall")]
    pub max_stall: usize,
    /// Hard cap on ticks per game, on top of the stall limit.
    #[serde(default)]
    pub max_ticks: Option<usize>,
    #[serde(default)]
    pub reversal_guard: bool,
    /// Half the length of the head history used to spot oscillation; 0 turns it off.
    #[serde(default = "default_cycle_window")]
    pub cycle_window: usize,
    /// Let the network policy drop the direction opposite to its heading.
    #[serde(default)]
    pub forbid_reverse: bool,
    #[serde(default = "default_initial_length")]
    pub initial_length: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Write a population checkpoint every this many generations.
    #[serde(default)]
    pub checkpoint_every: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Extra random games the champion plays after its replay in watch mode.
    #[serde(default = "default_watch_games")]
    pub watch_games: usize,
}

impl Default for PlaybackConfig {
    fn default() -> PlaybackConfig {
        PlaybackConfig { tick_millis: default_tick_millis(), watch_games: default_watch_games() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub neat: Settings,
    pub game: GameConfig,
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<AppConfig> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.validate().with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        ensure!(game.grid_size >= 4, "grid_size must be at least 4, got {}", game.grid_size);
        game.encoding.validate()?;
        ensure!(game.max_stall > 0, "max_stall must be positive");
        ensure!(
            game.initial_length >= 1 && game.initial_length <= game.grid_size as usize,
            "initial_length must be between 1 and the grid size, got {}",
            game.initial_length
        );
        ensure!(self.evaluation.trials > 0, "trials must be positive");
        ensure!(self.evaluation.checkpoint_every != Some(0), "checkpoint_every must be positive when set");

        self.neat.validate()?;
        ensure!(
            self.neat.n_output_nodes == Direction::ALL.len(),
            "n_output_nodes must be {}, got {}",
            Direction::ALL.len(),
            self.neat.n_output_nodes
        );
        self.evaluator(false).check_topology(&self.network_factory())
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.game.grid_size)
    }

    /// Game parameters for one episode. Pacing only applies to games someone is watching.
    pub fn episode_config(&self, paced: bool) -> EpisodeConfig {
        EpisodeConfig {
            grid: self.grid(),
            encoding: self.game.encoding.clone(),
            rules: MovementRules { reversal_guard: self.game.reversal_guard },
            cycle_window: self.game.cycle_window,
            max_stall: self.game.max_stall,
            max_ticks: self.game.max_ticks,
            initial_length: self.game.initial_length,
            pacing: paced.then(|| Duration::from_millis(self.playback.tick_millis)),
        }
    }

    pub fn evaluator(&self, paced: bool) -> Evaluator {
        Evaluator::new(self.episode_config(paced), self.evaluation.trials, self.evaluation.parallel)
    }

    pub fn network_factory(&self) -> NetworkFactory {
        NetworkFactory {
            n_sensor_nodes: self.neat.n_sensor_nodes,
            n_output_nodes: self.neat.n_output_nodes,
            activation: self.neat.activation,
            forbid_reverse: self.game.forbid_reverse,
        }
    }
}
