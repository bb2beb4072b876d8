//! Fitness evaluation: every candidate plays a fixed number of independent games and is
//! scored by its mean food count.

use std::panic::{self, AssertUnwindSafe};

use anyhow::{ensure, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::snake::episode::{run_episode, Controller, EpisodeConfig, EpisodeOutcome, EpisodeSetup, Replay, Unobserved};
use crate::snake::food::RandomFood;
use crate::snake::engine::TerminalReason;
use crate::snake::geometry::Direction;

/// Turns a genotype handed out by the optimizer into a playable controller.
pub trait ControllerFactory: Sync {
    type Genotype: Sync;
    type Controller: Controller;

    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn build(&self, genotype: &Self::Genotype) -> Self::Controller;
}

/// One member of a generation: an identity, a genotype, and a slot for its fitness.
pub trait Candidate: Send {
    type Genotype;

    fn id(&self) -> usize;
    fn genotype(&self) -> &Self::Genotype;
    fn set_fitness(&mut self, fitness: f64);
}

#[derive(Clone, Debug)]
pub struct Evaluation {
    pub fitness: f64,
    pub outcomes: Vec<EpisodeOutcome>,
}

impl Evaluation {
    /// The trial with the highest score; earliest on a tie.
    pub fn best_outcome(&self) -> Option<&EpisodeOutcome> {
        self.outcomes.iter().rev().max_by_key(|o| o.score)
    }
}

#[derive(Clone, Debug)]
pub struct Champion {
    /// Position in the candidate slice that was evaluated.
    pub index: usize,
    pub id: usize,
    pub fitness: f64,
    pub score: usize,
    pub replay: Replay,
}

#[derive(Clone, Debug)]
pub struct GenerationReport {
    pub best: Option<Champion>,
    pub mean_fitness: f64,
    pub faulted_trials: usize,
}

pub fn mean_score(outcomes: &[EpisodeOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().map(|o| o.score as f64).sum::<f64>() / outcomes.len() as f64
}

#[derive(Clone, Debug)]
pub struct Evaluator {
    pub episode: EpisodeConfig,
    pub trials: usize,
    pub parallel: bool,
}

impl Evaluator {
    pub fn new(episode: EpisodeConfig, trials: usize, parallel: bool) -> Evaluator {
        Evaluator { episode, trials, parallel }
    }

    /// Fails if the factory's network shape does not fit the configured encoding.
    pub fn check_topology<F: ControllerFactory>(&self, factory: &F) -> Result<()> {
        let expected = self.episode.encoding.input_count(&self.episode.grid);
        ensure!(
            factory.input_count() == expected,
            "network has {} inputs but the {:?} encoding on a {}x{} grid produces {}",
            factory.input_count(),
            self.episode.encoding,
            self.episode.grid.size,
            self.episode.grid.size,
            expected
        );
        ensure!(
            factory.output_count() == Direction::ALL.len(),
            "network must have {} outputs, one per direction, not {}",
            Direction::ALL.len(),
            factory.output_count()
        );
        Ok(())
    }

    /// Plays `trials` games, each from a fresh random start with its own food sequence.
    /// A game that panics scores 0 and does not stop the others.
    pub fn evaluate_controller<C, R>(&self, controller: &mut C, rng: &mut R) -> Evaluation
    where
        C: Controller + ?Sized,
        R: Rng,
    {
        let mut outcomes = Vec::with_capacity(self.trials);
        for trial in 0..self.trials {
            let setup = EpisodeSetup::random(&self.episode.grid, self.episode.initial_length, rng);
            let mut food = RandomFood::new(Xoshiro256PlusPlus::seed_from_u64(rng.gen()));
            controller.reset();

            let played = panic::catch_unwind(AssertUnwindSafe(|| {
                run_episode(&self.episode, setup, &mut *controller, &mut food, &mut Unobserved)
            }));
            let outcome = match played {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(trial, "episode panicked; scoring it 0");
                    EpisodeOutcome {
                        score: 0,
                        reason: TerminalReason::Faulted,
                        ticks: 0,
                        replay: Replay { setup, foods: Vec::new() },
                    }
                }
            };
            tracing::debug!(trial, score = outcome.score, ticks = outcome.ticks, reason = %outcome.reason, "trial finished");
            outcomes.push(outcome);
        }

        Evaluation { fitness: mean_score(&outcomes), outcomes }
    }

    pub fn evaluate<F, R>(&self, factory: &F, genotype: &F::Genotype, rng: &mut R) -> Evaluation
    where
        F: ControllerFactory,
        R: Rng,
    {
        let mut controller = factory.build(genotype);
        self.evaluate_controller(&mut controller, rng)
    }

    /// Scores every candidate and writes the fitness back. Each candidate gets a seed drawn
    /// up front, so the result is the same whether or not the work runs in parallel.
    pub fn evaluate_generation<F, C, R>(&self, factory: &F, candidates: &mut [C], rng: &mut R) -> GenerationReport
    where
        F: ControllerFactory,
        C: Candidate<Genotype = F::Genotype> + Sync,
        R: Rng,
    {
        let seeds: Vec<u64> = candidates.iter().map(|_| rng.gen()).collect();
        let score = |candidate: &C, seed: u64| {
            let mut local_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            self.evaluate(factory, candidate.genotype(), &mut local_rng)
        };

        let evaluations: Vec<Evaluation> =
            if self.parallel {
                candidates.par_iter().zip(seeds.par_iter()).map(|(c, &seed)| score(c, seed)).collect()
            } else {
                candidates.iter().zip(&seeds).map(|(c, &seed)| score(c, seed)).collect()
            };

        let mut best: Option<Champion> = None;
        let mut faulted_trials = 0;
        for (index, (candidate, evaluation)) in candidates.iter_mut().zip(&evaluations).enumerate() {
            candidate.set_fitness(evaluation.fitness);
            faulted_trials += evaluation.outcomes.iter().filter(|o| o.reason == TerminalReason::Faulted).count();

            if best.as_ref().map_or(true, |b| evaluation.fitness > b.fitness) {
                if let Some(outcome) = evaluation.best_outcome() {
                    best = Some(Champion {
                        index,
                        id: candidate.id(),
                        fitness: evaluation.fitness,
                        score: outcome.score,
                        replay: outcome.replay.clone(),
                    });
                }
            }
        }

        let mean_fitness =
            if evaluations.is_empty() {
                0.0
            } else {
                evaluations.iter().map(|e| e.fitness).sum::<f64>() / evaluations.len() as f64
            };
        GenerationReport { best, mean_fitness, faulted_trials }
    }
}
