use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Position {
        Position { x, y }
    }

    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    /// Offset of `self` relative to `origin`.
    pub fn offset_from(self, origin: Position) -> (i32, i32) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// Heading of the snake. Screen coordinates: `Up` decreases `y`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Network output order: up, right, down, left.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    pub fn from_usize(i: usize) -> Option<Direction> {
        Direction::ALL.get(i).copied()
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    /// Headings reachable from `self` in one tick without a 180° turn.
    pub fn legal_turns(self) -> [Direction; 3] {
        match self {
            Direction::Up => [Direction::Left, Direction::Up, Direction::Right],
            Direction::Right => [Direction::Up, Direction::Right, Direction::Down],
            Direction::Down => [Direction::Right, Direction::Down, Direction::Left],
            Direction::Left => [Direction::Down, Direction::Left, Direction::Up],
        }
    }
}

/// The eight ray directions, numbered clockwise from north.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    pub const ALL: [Compass; 8] = [
        Compass::N,
        Compass::NE,
        Compass::E,
        Compass::SE,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Classifies an offset onto a ray. Only pure vertical, horizontal or 45° diagonal
    /// offsets are on a ray; the returned distance is the number of steps along it.
    pub fn classify(dx: i32, dy: i32) -> Option<(Compass, i32)> {
        let compass = match (dx.signum(), dy.signum()) {
            (0, 0) => return None,
            (0, -1) => Compass::N,
            (1, 0) => Compass::E,
            (0, 1) => Compass::S,
            (-1, 0) => Compass::W,
            _ if dx.abs() != dy.abs() => return None,
            (1, -1) => Compass::NE,
            (1, 1) => Compass::SE,
            (-1, 1) => Compass::SW,
            _ => Compass::NW,
        };
        Some((compass, dx.abs().max(dy.abs())))
    }
}

/// Square board of side `size`; valid cells are `0 <= x, y < size`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub size: i32,
}

impl Grid {
    pub fn new(size: i32) -> Grid {
        Grid { size }
    }

    pub fn contains(&self, p: Position) -> bool {
        (0..self.size).contains(&p.x) && (0..self.size).contains(&p.y)
    }

    pub fn n_cells(&self) -> usize {
        (self.size * self.size) as usize
    }

    /// Row-major index of a cell on the board.
    pub fn cell_index(&self, p: Position) -> usize {
        (p.y * self.size + p.x) as usize
    }

    /// Free cells between `from` and the wall along `compass`. Diagonals take the smaller
    /// of the two axis distances, which is the step count to the nearest edge rather than
    /// a geometric length.
    pub fn distance_to_wall(&self, from: Position, compass: Compass) -> i32 {
        let north = from.y;
        let south = self.size - 1 - from.y;
        let west = from.x;
        let east = self.size - 1 - from.x;
        match compass {
            Compass::N => north,
            Compass::NE => north.min(east),
            Compass::E => east,
            Compass::SE => south.min(east),
            Compass::S => south,
            Compass::SW => south.min(west),
            Compass::W => west,
            Compass::NW => north.min(west),
        }
    }
}
