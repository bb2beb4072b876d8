use std::collections::VecDeque;

use super::geometry::{Direction, Position};

/// The snake: `body[0]` is the head, each following cell is adjacent to the previous one.
#[derive(Clone, Debug)]
pub struct Snake {
    body: VecDeque<Position>,
    heading: Direction,
    pending_growth: bool,
}

impl Snake {
    /// A straight snake of `length` cells with its tail trailing behind `head`.
    pub fn new(head: Position, heading: Direction, length: usize) -> Snake {
        let behind = heading.opposite();
        let mut body = VecDeque::with_capacity(length.max(1));
        let mut cell = head;
        body.push_back(cell);
        for _ in 1..length {
            cell = cell.step(behind);
            body.push_back(cell);
        }
        Snake { body, heading, pending_growth: false }
    }

    pub fn from_cells(cells: Vec<Position>, heading: Direction) -> Snake {
        debug_assert!(!cells.is_empty(), "a snake needs at least a head");
        debug_assert!(
            cells.windows(2).all(|w| {
                let (dx, dy) = w[1].offset_from(w[0]);
                dx.abs() + dy.abs() == 1
            }),
            "snake cells must be connected"
        );
        Snake { body: cells.into(), heading, pending_growth: false }
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn heading(&self) -> Direction {
        self.heading
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn body(&self) -> &VecDeque<Position> {
        &self.body
    }

    pub fn contains(&self, p: Position) -> bool {
        self.body.contains(&p)
    }

    pub fn growth_pending(&self) -> bool {
        self.pending_growth
    }

    /// The next move keeps the tail, so the snake ends up one cell longer.
    pub fn grow(&mut self) {
        self.pending_growth = true;
    }

    /// True if moving in `direction` would put the head onto the neck.
    pub fn is_reversal(&self, direction: Direction) -> bool {
        self.body.len() > 1 && self.head().step(direction) == self.body[1]
    }

    /// Would a head at `p` hit the body, ignoring the tail cell that the move vacates.
    pub fn collides(&self, p: Position) -> bool {
        let kept = if self.pending_growth { self.body.len() } else { self.body.len() - 1 };
        self.body.iter().take(kept).any(|&cell| cell == p)
    }

    pub(crate) fn slither(&mut self, new_head: Position, direction: Direction) {
        self.body.push_front(new_head);
        if self.pending_growth {
            self.pending_growth = false;
        } else {
            self.body.pop_back();
        }
        self.heading = direction;
    }
}
