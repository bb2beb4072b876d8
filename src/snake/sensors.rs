use anyhow::{ensure, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::body::Snake;
use super::geometry::{Compass, Grid, Position};

/// How the food is described after a local window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodCue {
    /// Four flags: food is up, down, left, right of the head.
    Directions,
    /// Raw `food - head` offset on each axis.
    Offset,
}

/// Value a local window gives a food cell when food marking is on.
pub const FOOD_MARK: f64 = -1.0;

/// Observation layouts a controller can be trained on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// Occupancy of the `size x size` square around the head, center excluded, scanned
    /// row by row from the top left, followed by the food cue.
    LocalWindow {
        size: usize,
        food_cue: FoodCue,
        #[serde(default)]
        mark_food: bool,
    },
    /// Food falloff on both axes, wall falloff and nearest body falloff on each of the
    /// eight compass rays.
    DirectionalRays,
    /// The whole board: 0 empty, 1 body, 2 head, 3 food.
    FullGrid,
}

impl Encoding {
    pub fn input_count(&self, grid: &Grid) -> usize {
        match self {
            Encoding::LocalWindow { size, food_cue, .. } => {
                let cue = match food_cue {
                    FoodCue::Directions => 4,
                    FoodCue::Offset => 2,
                };
                size * size - 1 + cue
            }
            Encoding::DirectionalRays => 2 + 2 * Compass::ALL.len(),
            Encoding::FullGrid => grid.n_cells(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Encoding::LocalWindow { size, .. } = self {
            ensure!(*size >= 3 && size % 2 == 1, "local window size must be odd and at least 3, got {size}");
        }
        Ok(())
    }

    pub fn encode(&self, grid: &Grid, snake: &Snake, food: Position) -> Vec<f64> {
        let res = match self {
            Encoding::LocalWindow { size, food_cue, mark_food } => {
                local_window(grid, snake, food, *size, *food_cue, *mark_food)
            }
            Encoding::DirectionalRays => directional_rays(grid, snake, food),
            Encoding::FullGrid => full_grid(grid, snake, food),
        };
        debug_assert_eq!(res.len(), self.input_count(grid));
        res
    }
}

fn local_window(grid: &Grid, snake: &Snake, food: Position, size: usize, food_cue: FoodCue, mark_food: bool) -> Vec<f64> {
    let head = snake.head();
    let reach = (size / 2) as i32;
    let occupied: FxHashSet<Position> = snake.body().iter().skip(1).copied().collect();

    let mut res = Vec::with_capacity(size * size + 3);
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if dx == 0 && dy == 0 {
                continue;
            }
            let cell = Position::new(head.x + dx, head.y + dy);
            let value =
                if !grid.contains(cell) || occupied.contains(&cell) {
                    1.0
                } else if mark_food && cell == food {
                    FOOD_MARK
                } else {
                    0.0
                };
            res.push(value);
        }
    }

    let (fx, fy) = food.offset_from(head);
    match food_cue {
        FoodCue::Directions => {
            let flag = |b: bool| if b { 1.0 } else { 0.0 };
            res.extend([flag(fy < 0), flag(fy > 0), flag(fx < 0), flag(fx > 0)]);
        }
        FoodCue::Offset => res.extend([fx as f64, fy as f64]),
    }
    res
}

/// Bounded, sign-preserving falloff of a signed distance: 1 at 0, shrinking towards 0
/// as `|d|` grows.
pub fn signed_falloff(d: i32) -> f64 {
    match d {
        0 => 1.0,
        d if d > 0 => 1.0 / (d as f64 + 1.0),
        d => 1.0 / (d as f64 - 1.0),
    }
}

fn directional_rays(grid: &Grid, snake: &Snake, food: Position) -> Vec<f64> {
    let head = snake.head();
    let (fx, fy) = food.offset_from(head);

    let mut walls = [0.0; 8];
    for compass in Compass::ALL {
        walls[compass.index()] = 1.0 / (grid.distance_to_wall(head, compass) as f64 + 1.0);
    }

    let mut body = [0.0_f64; 8];
    for &cell in snake.body().iter().skip(1) {
        let (dx, dy) = cell.offset_from(head);
        if let Some((compass, distance)) = Compass::classify(dx, dy) {
            let i = compass.index();
            body[i] = body[i].max(1.0 / distance as f64);
        }
    }

    let mut res = Vec::with_capacity(18);
    res.push(signed_falloff(fx));
    res.push(signed_falloff(fy));
    res.extend(walls);
    res.extend(body);
    res
}

fn full_grid(grid: &Grid, snake: &Snake, food: Position) -> Vec<f64> {
    let mut res = vec![0.0; grid.n_cells()];
    if grid.contains(food) {
        res[grid.cell_index(food)] = 3.0;
    }
    for &cell in snake.body().iter().skip(1) {
        if grid.contains(cell) {
            res[grid.cell_index(cell)] = 1.0;
        }
    }
    let head = snake.head();
    if grid.contains(head) {
        res[grid.cell_index(head)] = 2.0;
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::geometry::Direction;
    use assert_approx_eq::assert_approx_eq;

    fn window(size: usize, food_cue: FoodCue, mark_food: bool) -> Encoding {
        Encoding::LocalWindow { size, food_cue, mark_food }
    }

    #[test]
    fn input_counts() {
        let grid = Grid::new(16);
        assert_eq!(window(5, FoodCue::Directions, false).input_count(&grid), 28);
        assert_eq!(window(9, FoodCue::Offset, false).input_count(&grid), 82);
        assert_eq!(Encoding::DirectionalRays.input_count(&grid), 18);
        assert_eq!(Encoding::FullGrid.input_count(&grid), 256);
    }

    #[test]
    fn even_window_is_rejected() {
        assert!(window(4, FoodCue::Offset, false).validate().is_err());
        assert!(window(1, FoodCue::Offset, false).validate().is_err());
        assert!(window(3, FoodCue::Offset, false).validate().is_ok());
    }

    #[test]
    fn local_window_scan_order() {
        // head in the top left corner: the whole top row and left column are wall
        let grid = Grid::new(8);
        let snake = Snake::new(Position::new(0, 0), Direction::Down, 2);
        let food = Position::new(3, 5);
        let obs = window(3, FoodCue::Directions, false).encode(&grid, &snake, food);
        // offsets: (-1,-1) (0,-1) (1,-1) (-1,0) (1,0) (-1,1) (0,1) (1,1)
        // body segment at (0,-1) is off the board already, so only walls count above
        let expected_cells = [1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        assert_eq!(&obs[..8], &expected_cells);
        // food is below and to the right
        assert_eq!(&obs[8..], &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn local_window_marks_body_and_food() {
        let grid = Grid::new(8);
        let snake = Snake::new(Position::new(4, 4), Direction::Right, 3);
        let food = Position::new(5, 3);
        let obs = window(3, FoodCue::Offset, true).encode(&grid, &snake, food);
        // the neck sits at offset (-1, 0)
        assert_eq!(obs[3], 1.0);
        // food at offset (1, -1)
        assert_eq!(obs[2], FOOD_MARK);
        assert_eq!(&obs[8..], &[1.0, -1.0]);
    }

    #[test]
    fn aligned_food_sets_no_flags() {
        let grid = Grid::new(8);
        let snake = Snake::new(Position::new(4, 4), Direction::Right, 1);
        let obs = window(3, FoodCue::Directions, false).encode(&grid, &snake, Position::new(4, 4));
        assert_eq!(&obs[8..], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn falloff_is_bounded_and_signed() {
        assert_approx_eq!(signed_falloff(0), 1.0);
        assert_approx_eq!(signed_falloff(1), 0.5);
        assert_approx_eq!(signed_falloff(-1), -0.5);
        assert_approx_eq!(signed_falloff(3), 0.25);
        assert_approx_eq!(signed_falloff(-3), -0.25);
    }

    #[test]
    fn rays_see_nearest_body_segment() {
        let grid = Grid::new(10);
        // head at (5,5) moving up, body curls to the right and below
        let snake = Snake::from_cells(
            vec![
                Position::new(5, 5),
                Position::new(5, 6),
                Position::new(6, 6),
                Position::new(7, 6),
                Position::new(7, 5),
                Position::new(7, 4),
            ],
            Direction::Up,
        );
        let obs = Encoding::DirectionalRays.encode(&grid, &snake, Position::new(2, 5));
        assert_eq!(obs.len(), 18);
        assert_approx_eq!(obs[0], signed_falloff(-3));
        assert_approx_eq!(obs[1], 1.0);

        let body = &obs[10..];
        assert_approx_eq!(body[Compass::S.index()], 1.0);
        assert_approx_eq!(body[Compass::SE.index()], 1.0);
        assert_approx_eq!(body[Compass::E.index()], 0.5);
        assert_approx_eq!(body[Compass::NE.index()], 0.0);
        assert_approx_eq!(body[Compass::N.index()], 0.0);

        let walls = &obs[2..10];
        assert_approx_eq!(walls[Compass::N.index()], 1.0 / 6.0);
        assert_approx_eq!(walls[Compass::E.index()], 1.0 / 5.0);
    }

    #[test]
    fn rays_are_finite_everywhere() {
        let grid = Grid::new(6);
        for hx in 0..6 {
            for hy in 0..6 {
                let snake = Snake::new(Position::new(hx, hy), Direction::Up, 1);
                for fx in 0..6 {
                    for fy in 0..6 {
                        let obs = Encoding::DirectionalRays.encode(&grid, &snake, Position::new(fx, fy));
                        assert!(obs.iter().all(|v| v.is_finite()));
                    }
                }
            }
        }
    }

    #[test]
    fn full_grid_codes() {
        let grid = Grid::new(4);
        let snake = Snake::new(Position::new(2, 1), Direction::Right, 2);
        let obs = Encoding::FullGrid.encode(&grid, &snake, Position::new(0, 3));
        assert_eq!(obs[grid.cell_index(Position::new(2, 1))], 2.0);
        assert_eq!(obs[grid.cell_index(Position::new(1, 1))], 1.0);
        assert_eq!(obs[grid.cell_index(Position::new(0, 3))], 3.0);
        assert_eq!(obs.iter().filter(|&&v| v == 0.0).count(), 13);
    }

    #[test]
    fn encoding_is_deterministic() {
        let grid = Grid::new(12);
        let snake = Snake::new(Position::new(6, 6), Direction::Left, 4);
        let food = Position::new(1, 9);
        for encoding in [window(5, FoodCue::Directions, true), Encoding::DirectionalRays, Encoding::FullGrid] {
            let a = encoding.encode(&grid, &snake, food);
            let b = encoding.encode(&grid, &snake, food);
            assert_eq!(a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(), b.iter().map(|v| v.to_bits()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn encoding_reads_tagged_json() {
        let json = r#"{"kind": "local_window", "size": 5, "food_cue": "directions"}"#;
        let encoding: Encoding = serde_json::from_str(json).unwrap();
        assert_eq!(encoding, window(5, FoodCue::Directions, false));
    }
}
