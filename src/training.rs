use anyhow::{ensure, Result};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::evaluation::{Evaluator, GenerationReport};
use crate::neat::organism::OrganismIndex;
use crate::neat::{Genome, Population};
use crate::policy::NetworkFactory;
use crate::snake::episode::Replay;
use crate::storage::{save_json, RecordedGame, RunArtifacts};

/// Best organism seen so far in a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChampionRecord {
    pub generation: usize,
    pub id: usize,
    pub fitness: f64,
    pub score: usize,
    pub genome: Genome,
    pub replay: Replay,
}

impl ChampionRecord {
    pub fn recorded_game(&self) -> RecordedGame {
        RecordedGame { generation: self.generation, fitness: self.fitness, score: self.score, replay: self.replay.clone() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub population: Population,
    pub champion: Option<ChampionRecord>,
}

#[derive(Clone, Debug)]
pub struct GenerationStats {
    pub generation: usize,
    pub species: usize,
    pub organisms: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_score: usize,
    pub faulted_trials: usize,
}

pub struct Trainer {
    config: AppConfig,
    evaluator: Evaluator,
    factory: NetworkFactory,
    population: Population,
    champion: Option<ChampionRecord>,
    artifacts: Option<RunArtifacts>,
}

impl Trainer {
    pub fn new(config: AppConfig) -> Result<Trainer> {
        config.validate()?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.evaluation.seed);
        let population = Population::init(&mut rng, &config.neat);
        tracing::info!(organisms = population.organisms.len(), species = population.species.len(), "population initialized");
        Ok(Self::assemble(config, population, None))
    }

    pub fn resume(config: AppConfig, checkpoint: Checkpoint) -> Result<Trainer> {
        config.validate()?;
        let population = checkpoint.population;
        ensure!(!population.organisms.is_empty(), "checkpoint has an empty population");
        let shapes_match = population
            .organisms
            .iter()
            .all(|o| o.genome.n_sensor_nodes == config.neat.n_sensor_nodes && o.genome.n_output_nodes == config.neat.n_output_nodes);
        ensure!(shapes_match, "checkpoint genomes do not match the configured network shape");
        tracing::info!(generation = population.generation, organisms = population.organisms.len(), "resuming from checkpoint");
        Ok(Self::assemble(config, population, checkpoint.champion))
    }

    fn assemble(config: AppConfig, population: Population, champion: Option<ChampionRecord>) -> Trainer {
        let evaluator = config.evaluator(false);
        let factory = config.network_factory();
        Trainer { config, evaluator, factory, population, champion, artifacts: None }
    }

    pub fn with_artifacts(mut self, artifacts: RunArtifacts) -> Trainer {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn champion(&self) -> Option<&ChampionRecord> {
        self.champion.as_ref()
    }

    /// Every generation draws from its own stream, so a resumed run continues exactly as an
    /// uninterrupted one would.
    fn generation_rng(&self) -> Xoshiro256PlusPlus {
        let generation = self.population.generation as u64;
        Xoshiro256PlusPlus::seed_from_u64(self.config.evaluation.seed ^ generation.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Evaluates the current generation, updates the champion and breeds the next one.
    pub fn step(&mut self) -> Result<GenerationStats> {
        let mut rng = self.generation_rng();
        let generation = self.population.generation;

        let report = self.evaluator.evaluate_generation(&self.factory, self.population.organisms_mut(), &mut rng);
        self.population.set_champions();
        let stats = self.record(generation, &report);

        self.population.next_generation(&mut rng, &self.config.neat);
        self.checkpoint()?;
        Ok(stats)
    }

    fn record(&mut self, generation: usize, report: &GenerationReport) -> GenerationStats {
        let (best_fitness, best_score) = report.best.as_ref().map_or((0.0, 0), |b| (b.fitness, b.score));

        if let Some(best) = &report.best {
            let improved = self.champion.as_ref().map_or(true, |c| best.fitness > c.fitness);
            if improved {
                tracing::info!(generation, id = best.id, fitness = best.fitness, score = best.score, "new champion");
                self.champion = Some(ChampionRecord {
                    generation,
                    id: best.id,
                    fitness: best.fitness,
                    score: best.score,
                    genome: self.population.organisms[OrganismIndex(best.index)].genome.clone(),
                    replay: best.replay.clone(),
                });
            }
        }

        let stats = GenerationStats {
            generation,
            species: self.population.species.len(),
            organisms: self.population.organisms.len(),
            best_fitness,
            mean_fitness: report.mean_fitness,
            best_score,
            faulted_trials: report.faulted_trials,
        };
        tracing::info!(
            generation,
            species = stats.species,
            best_fitness = format_args!("{:.3}", stats.best_fitness),
            mean_fitness = format_args!("{:.3}", stats.mean_fitness),
            best_score = stats.best_score,
            "generation evaluated"
        );
        if stats.faulted_trials > 0 {
            tracing::warn!(generation, faulted = stats.faulted_trials, "some games faulted and scored 0");
        }
        stats
    }

    fn checkpoint(&self) -> Result<()> {
        let (Some(artifacts), Some(every)) = (&self.artifacts, self.config.evaluation.checkpoint_every) else {
            return Ok(());
        };
        let generation = self.population.generation;
        if generation % every != 0 {
            return Ok(());
        }
        let path = artifacts.checkpoint_path(generation);
        let checkpoint = CheckpointRef { population: &self.population, champion: self.champion.as_ref() };
        save_json(&path, &checkpoint)?;
        tracing::info!(generation, path = %path.display(), "checkpoint written");
        Ok(())
    }

    /// Runs `generations` generations and saves the champion if an output directory is set.
    pub fn run(&mut self, generations: usize) -> Result<Option<ChampionRecord>> {
        for _ in 0..generations {
            self.step()?;
        }
        if let (Some(artifacts), Some(champion)) = (&self.artifacts, &self.champion) {
            artifacts.save_best(&self.config, &champion.genome, &champion.recorded_game())?;
        }
        Ok(self.champion.clone())
    }
}

/// Borrowed form of `Checkpoint`, so writing one does not clone the population.
#[derive(Serialize)]
struct CheckpointRef<'a> {
    population: &'a Population,
    champion: Option<&'a ChampionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluationConfig, GameConfig, PlaybackConfig};
    use crate::neat::Settings;
    use crate::snake::sensors::Encoding;
    use crate::storage::load_json;

    fn small_config() -> AppConfig {
        let mut neat = Settings::standard(18, 4);
        neat.n_organisms = 24;
        neat.n_species_min = 2;
        neat.n_species_max = 5;
        AppConfig {
            neat,
            game: GameConfig {
                grid_size: 8,
                encoding: Encoding::DirectionalRays,
                max_stall: 40,
                max_ticks: Some(300),
                reversal_guard: false,
                cycle_window: 6,
                forbid_reverse: true,
                initial_length: 1,
            },
            evaluation: EvaluationConfig { trials: 3, seed: 11, parallel: true, checkpoint_every: Some(2) },
            playback: PlaybackConfig::default(),
        }
    }

    #[test]
    fn champion_never_gets_worse() {
        let mut trainer = Trainer::new(small_config()).unwrap();
        let mut last = f64::NEG_INFINITY;
        for _ in 0..3 {
            trainer.step().unwrap();
            let fitness = trainer.champion().unwrap().fitness;
            assert!(fitness >= last);
            last = fitness;
        }
        assert_eq!(trainer.population().generation, 3);
    }

    #[test]
    fn checkpoints_resume_the_same_run() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::new(dir.path());

        let mut trainer = Trainer::new(small_config()).unwrap().with_artifacts(artifacts.clone());
        trainer.run(2).unwrap();
        let checkpoint: Checkpoint = load_json(&artifacts.checkpoint_path(2)).unwrap();
        trainer.step().unwrap();

        let mut resumed = Trainer::resume(small_config(), checkpoint).unwrap();
        resumed.step().unwrap();
        assert_eq!(
            serde_json::to_string(&resumed.population().organisms).unwrap(),
            serde_json::to_string(&trainer.population().organisms).unwrap()
        );
    }
}
