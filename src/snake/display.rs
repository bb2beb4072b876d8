use std::fmt;

use super::episode::BoardView;
use super::geometry::Position;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Cell {
    Empty,
    Body,
    Head,
    Food,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = match self {
            Cell::Empty => '.',
            Cell::Body => 'o',
            Cell::Head => '@',
            Cell::Food => '*',
        };
        write!(f, "{c}")
    }
}

pub fn cell_at(view: &BoardView, p: Position) -> Cell {
    if view.snake.head() == p {
        Cell::Head
    } else if view.snake.contains(p) {
        Cell::Body
    } else if view.food == p {
        Cell::Food
    } else {
        Cell::Empty
    }
}

/// One line per board row, top row first, then a status line.
pub fn board_to_string(view: &BoardView) -> String {
    let size = view.grid.size;
    let mut s = String::with_capacity(((size * 2 + 1) * (size + 1)) as usize);
    for y in 0..size {
        let row: Vec<String> = (0..size).map(|x| cell_at(view, Position::new(x, y)).to_string()).collect();
        s.push_str(&row.join(" "));
        s.push('\n');
    }
    s.push_str(&format!("score: {}  length: {}  tick: {}", view.score, view.snake.len(), view.tick));
    s
}
