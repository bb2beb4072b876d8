use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::neat::Genome;
use crate::snake::episode::Replay;

pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).with_context(|| format!("writing {}", path.display()))?;
    writer.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))
}

/// The champion's recorded game, with enough context to judge a replay against it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedGame {
    pub generation: usize,
    pub fitness: f64,
    pub score: usize,
    pub replay: Replay,
}

/// File layout of one training run's output directory.
#[derive(Clone, Debug)]
pub struct RunArtifacts {
    dir: PathBuf,
}

impl RunArtifacts {
    pub fn new<P: Into<PathBuf>>(dir: P) -> RunArtifacts {
        RunArtifacts { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn genome_path(&self) -> PathBuf {
        self.dir.join("best_genome.json")
    }

    pub fn replay_path(&self) -> PathBuf {
        self.dir.join("best_replay.json")
    }

    pub fn checkpoint_path(&self, generation: usize) -> PathBuf {
        self.dir.join("checkpoints").join(format!("generation-{generation:05}.json"))
    }

    pub fn save_best(&self, config: &AppConfig, genome: &Genome, game: &RecordedGame) -> Result<()> {
        save_json(&self.config_path(), config)?;
        save_json(&self.genome_path(), genome)?;
        save_json(&self.replay_path(), game)?;
        tracing::info!(dir = %self.dir.display(), score = game.score, fitness = game.fitness, "saved champion");
        Ok(())
    }

    pub fn load_best(&self) -> Result<(AppConfig, Genome, RecordedGame)> {
        let config: AppConfig = load_json(&self.config_path())?;
        config.validate().with_context(|| format!("invalid config {}", self.config_path().display()))?;
        let genome = load_json(&self.genome_path())?;
        let game = load_json(&self.replay_path())?;
        Ok((config, genome, game))
    }
}
