use std::collections::VecDeque;

use rand::Rng;

use super::body::Snake;
use super::geometry::{Grid, Position};

/// Supplies candidate food cells. The episode rejects cells under the snake and asks again.
pub trait FoodSource {
    fn next_position(&mut self, grid: &Grid) -> Position;
}

pub struct RandomFood<R> {
    rng: R,
}

impl<R: Rng> RandomFood<R> {
    pub fn new(rng: R) -> RandomFood<R> {
        RandomFood { rng }
    }
}

impl<R: Rng> FoodSource for RandomFood<R> {
    fn next_position(&mut self, grid: &Grid) -> Position {
        Position::new(self.rng.gen_range(0..grid.size), self.rng.gen_range(0..grid.size))
    }
}

/// Replays recorded food cells in order. Once the recording runs out, or a recorded cell
/// turns out to be off the board, every later request is sampled at random.
pub struct PresetFood<R> {
    positions: VecDeque<Position>,
    fallback: RandomFood<R>,
    exhausted: bool,
}

impl<R: Rng> PresetFood<R> {
    pub fn new(positions: Vec<Position>, rng: R) -> PresetFood<R> {
        PresetFood { positions: positions.into(), fallback: RandomFood::new(rng), exhausted: false }
    }

    pub fn remaining(&self) -> usize {
        self.positions.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<R: Rng> FoodSource for PresetFood<R> {
    fn next_position(&mut self, grid: &Grid) -> Position {
        if !self.exhausted {
            match self.positions.pop_front() {
                Some(p) if grid.contains(p) => return p,
                Some(p) => {
                    tracing::warn!("preset food position ({}, {}) is off the board; using random positions from here on", p.x, p.y);
                    self.positions.clear();
                    self.exhausted = true;
                }
                None => {
                    tracing::warn!("out of preset food positions; using random ones");
                    self.exhausted = true;
                }
            }
        }
        self.fallback.next_position(grid)
    }
}

/// Draws from `source` until the cell is clear of the snake. `None` if the board is full.
pub fn place_food<S: FoodSource + ?Sized>(source: &mut S, grid: &Grid, snake: &Snake) -> Option<Position> {
    if snake.len() >= grid.n_cells() {
        return None;
    }
    loop {
        let p = source.next_position(grid);
        if grid.contains(p) && !snake.contains(p) {
            return Some(p);
        }
    }
}
