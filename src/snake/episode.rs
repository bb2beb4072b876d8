use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::body::Snake;
use super::engine::{advance, Advance, CycleDetector, MovementRules, TerminalReason};
use super::food::{place_food, FoodSource};
use super::geometry::{Direction, Grid, Position};
use super::sensors::Encoding;

/// A policy: picks a direction from an observation. `heading` is the current heading, for
/// controllers that want to filter out reversals themselves.
pub trait Controller {
    fn choose(&mut self, observation: &[f64], heading: Direction) -> Direction;

    /// Forget any state carried over from a previous episode.
    fn reset(&mut self) {}
}

impl<F: FnMut(&[f64], Direction) -> Direction> Controller for F {
    fn choose(&mut self, observation: &[f64], heading: Direction) -> Direction {
        self(observation, heading)
    }
}

pub enum Steering {
    Keep,
    Turn(Direction),
    Abort,
}

pub struct BoardView<'a> {
    pub grid: &'a Grid,
    pub snake: &'a Snake,
    pub food: Position,
    pub score: usize,
    pub tick: usize,
}

/// Hooks for watching or driving a game by hand. Training runs use `Unobserved`.
pub trait Observer {
    /// Called once per tick, before the controller is asked for a move.
    fn on_tick(&mut self, _view: &BoardView) {}

    /// Lets a human override the controller's choice for this tick.
    fn steer(&mut self, _heading: Direction) -> Steering {
        Steering::Keep
    }

    fn on_finish(&mut self, _outcome: &EpisodeOutcome) {}
}

pub struct Unobserved;
impl Observer for Unobserved {}

#[derive(Clone, Debug)]
pub struct EpisodeConfig {
    pub grid: Grid,
    pub encoding: Encoding,
    pub rules: MovementRules,
    pub cycle_window: usize,
    pub max_stall: usize,
    pub max_ticks: Option<usize>,
    pub initial_length: usize,
    /// Sleep between ticks; only for watching.
    pub pacing: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSetup {
    pub start: Position,
    pub heading: Direction,
}

impl EpisodeSetup {
    /// A random start heading right, leaving room on the board for the initial tail.
    pub fn random<R: Rng>(grid: &Grid, initial_length: usize, rng: &mut R) -> EpisodeSetup {
        let tail = (initial_length.max(1) - 1) as i32;
        let x = rng.gen_range(tail.min(grid.size - 1)..grid.size);
        let y = rng.gen_range(0..grid.size);
        EpisodeSetup { start: Position::new(x, y), heading: Direction::Right }
    }
}

/// Everything needed to play a recorded game again with the same controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub setup: EpisodeSetup,
    pub foods: Vec<Position>,
}

#[derive(Clone, Debug)]
pub struct EpisodeOutcome {
    pub score: usize,
    pub reason: TerminalReason,
    pub ticks: usize,
    pub replay: Replay,
}

pub struct Episode<'a> {
    config: &'a EpisodeConfig,
    setup: EpisodeSetup,
    snake: Snake,
    food: Option<Position>,
    history: CycleDetector,
    score: usize,
    stall: usize,
    tick: usize,
    foods: Vec<Position>,
}

impl<'a> Episode<'a> {
    pub fn new<S: FoodSource + ?Sized>(config: &'a EpisodeConfig, setup: EpisodeSetup, food_source: &mut S) -> Episode<'a> {
        let snake = Snake::new(setup.start, setup.heading, config.initial_length);
        let history = CycleDetector::new(config.cycle_window, setup.start);
        let food = place_food(food_source, &config.grid, &snake);
        Episode {
            config,
            setup,
            snake,
            food,
            history,
            score: 0,
            stall: 0,
            tick: 0,
            foods: food.into_iter().collect(),
        }
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn food(&self) -> Option<Position> {
        self.food
    }

    /// Plays one tick. Returns the reason the game ended, if it did.
    pub fn step<C, S, O>(&mut self, controller: &mut C, food_source: &mut S, observer: &mut O) -> Option<TerminalReason>
    where
        C: Controller + ?Sized,
        S: FoodSource + ?Sized,
        O: Observer + ?Sized,
    {
        let food = match self.food {
            Some(food) => food,
            None => return Some(TerminalReason::BoardFull),
        };

        observer.on_tick(&BoardView {
            grid: &self.config.grid,
            snake: &self.snake,
            food,
            score: self.score,
            tick: self.tick,
        });

        if self.stall > self.config.max_stall {
            return Some(TerminalReason::Timeout);
        }
        if self.config.max_ticks.is_some_and(|cap| self.tick >= cap) {
            return Some(TerminalReason::TickLimit);
        }

        let observation = self.config.encoding.encode(&self.config.grid, &self.snake, food);
        let heading = self.snake.heading();
        let chosen = controller.choose(&observation, heading);
        let direction = match observer.steer(heading) {
            Steering::Keep => chosen,
            Steering::Turn(d) => d,
            Steering::Abort => return Some(TerminalReason::Aborted),
        };

        if let Advance::Terminal(reason) = advance(&self.config.grid, &mut self.snake, &mut self.history, direction, &self.config.rules) {
            return Some(reason);
        }
        self.tick += 1;

        if self.snake.head() == food {
            self.score += 1;
            self.stall = 0;
            self.snake.grow();
            self.food = place_food(food_source, &self.config.grid, &self.snake);
            self.foods.extend(self.food);
        } else {
            self.stall += 1;
        }
        None
    }

    pub fn finish(self, reason: TerminalReason) -> EpisodeOutcome {
        EpisodeOutcome {
            score: self.score,
            reason,
            ticks: self.tick,
            replay: Replay { setup: self.setup, foods: self.foods },
        }
    }
}

/// Plays a full game and returns the number of foods eaten along with why it ended.
pub fn run_episode<C, S, O>(
    config: &EpisodeConfig,
    setup: EpisodeSetup,
    controller: &mut C,
    food_source: &mut S,
    observer: &mut O,
) -> EpisodeOutcome
where
    C: Controller + ?Sized,
    S: FoodSource + ?Sized,
    O: Observer + ?Sized,
{
    let mut episode = Episode::new(config, setup, food_source);
    let reason = loop {
        if let Some(reason) = episode.step(controller, food_source, observer) {
            break reason;
        }
        if let Some(delay) = config.pacing {
            thread::sleep(delay);
        }
    };

    let outcome = episode.finish(reason);
    observer.on_finish(&outcome);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::food::{PresetFood, RandomFood};
    use crate::snake::sensors::FoodCue;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn config(grid_size: i32) -> EpisodeConfig {
        EpisodeConfig {
            grid: Grid::new(grid_size),
            encoding: Encoding::LocalWindow { size: 3, food_cue: FoodCue::Offset, mark_food: false },
            rules: MovementRules { reversal_guard: false },
            cycle_window: 10,
            max_stall: 100,
            max_ticks: None,
            initial_length: 1,
            pacing: None,
        }
    }

    fn straight(_: &[f64], heading: Direction) -> Direction {
        heading
    }

    #[test]
    fn straight_into_the_wall() {
        let config = config(8);
        let setup = EpisodeSetup { start: Position::new(2, 3), heading: Direction::Right };
        let mut food = PresetFood::new(vec![Position::new(0, 0)], Xoshiro256PlusPlus::seed_from_u64(0));
        let outcome = run_episode(&config, setup, &mut straight, &mut food, &mut Unobserved);
        assert_eq!(outcome.reason, TerminalReason::Wall);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.ticks, 5);
    }

    #[test]
    fn eating_grows_and_records_food() {
        let config = config(8);
        let setup = EpisodeSetup { start: Position::new(1, 3), heading: Direction::Right };
        let mut food = PresetFood::new(
            vec![Position::new(3, 3), Position::new(5, 3), Position::new(0, 7)],
            Xoshiro256PlusPlus::seed_from_u64(0),
        );
        let outcome = run_episode(&config, setup, &mut straight, &mut food, &mut Unobserved);
        assert_eq!(outcome.score, 2);
        assert_eq!(outcome.reason, TerminalReason::Wall);
        assert_eq!(outcome.replay.foods, vec![Position::new(3, 3), Position::new(5, 3), Position::new(0, 7)]);
    }

    #[test]
    fn circling_without_food_times_out() {
        let mut config = config(8);
        config.cycle_window = 0;
        config.max_stall = 20;
        let setup = EpisodeSetup { start: Position::new(2, 2), heading: Direction::Right };
        let mut food = PresetFood::new(vec![Position::new(7, 7)], Xoshiro256PlusPlus::seed_from_u64(0));
        let mut turn = |_: &[f64], heading: Direction| heading.legal_turns()[2];
        let outcome = run_episode(&config, setup, &mut turn, &mut food, &mut Unobserved);
        assert_eq!(outcome.reason, TerminalReason::Timeout);
        assert_eq!(outcome.ticks, 21);
    }

    #[test]
    fn circling_is_caught_by_the_cycle_detector() {
        let config = config(8);
        let setup = EpisodeSetup { start: Position::new(2, 2), heading: Direction::Right };
        let mut food = PresetFood::new(vec![Position::new(7, 7)], Xoshiro256PlusPlus::seed_from_u64(0));
        let mut turn = |_: &[f64], heading: Direction| heading.legal_turns()[2];
        let outcome = run_episode(&config, setup, &mut turn, &mut food, &mut Unobserved);
        assert_eq!(outcome.reason, TerminalReason::Cycle);
    }

    #[test]
    fn tick_cap_ends_the_game() {
        let mut config = config(8);
        config.cycle_window = 0;
        config.max_ticks = Some(7);
        let setup = EpisodeSetup { start: Position::new(2, 2), heading: Direction::Right };
        let mut food = RandomFood::new(Xoshiro256PlusPlus::seed_from_u64(9));
        let mut turn = |_: &[f64], heading: Direction| heading.legal_turns()[2];
        let outcome = run_episode(&config, setup, &mut turn, &mut food, &mut Unobserved);
        assert!(outcome.reason == TerminalReason::TickLimit || outcome.score > 0);
        assert!(outcome.ticks <= 7);
    }

    struct Quitter;
    impl Observer for Quitter {
        fn steer(&mut self, _heading: Direction) -> Steering {
            Steering::Abort
        }
    }

    #[test]
    fn observer_can_abort() {
        let config = config(8);
        let setup = EpisodeSetup { start: Position::new(2, 2), heading: Direction::Right };
        let mut food = RandomFood::new(Xoshiro256PlusPlus::seed_from_u64(9));
        let outcome = run_episode(&config, setup, &mut straight, &mut food, &mut Quitter);
        assert_eq!(outcome.reason, TerminalReason::Aborted);
        assert_eq!(outcome.ticks, 0);
    }

    #[test]
    fn random_setup_leaves_room_for_the_tail() {
        let grid = Grid::new(6);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        for _ in 0..100 {
            let setup = EpisodeSetup::random(&grid, 3, &mut rng);
            let snake = Snake::new(setup.start, setup.heading, 3);
            assert!(snake.body().iter().all(|&p| grid.contains(p)));
        }
    }
}
