use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::body::Snake;
use super::geometry::{Direction, Grid, Position};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalReason {
    Wall,
    SelfCollision,
    Cycle,
    Timeout,
    TickLimit,
    BoardFull,
    Aborted,
    Faulted,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TerminalReason::Wall => "out of map",
            TerminalReason::SelfCollision => "hit itself",
            TerminalReason::Cycle => "cycling",
            TerminalReason::Timeout => "timeout",
            TerminalReason::TickLimit => "tick limit",
            TerminalReason::BoardFull => "board full",
            TerminalReason::Aborted => "aborted",
            TerminalReason::Faulted => "faulted",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    Continues,
    Terminal(TerminalReason),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRules {
    /// Ignore a proposed direction that would turn the head back onto the neck.
    pub reversal_guard: bool,
}

/// Remembers the last `2 * window` head positions. A new head that shows up in both the
/// older and the newer half of a full buffer is an oscillation. A window of 0 disables it.
#[derive(Clone, Debug)]
pub struct CycleDetector {
    window: usize,
    recent: VecDeque<Position>,
}

impl CycleDetector {
    pub fn new(window: usize, start: Position) -> CycleDetector {
        let mut detector = CycleDetector { window, recent: VecDeque::with_capacity(2 * window + 1) };
        detector.record(start);
        detector
    }

    pub fn is_cycle(&self, new_head: Position) -> bool {
        if self.window == 0 || self.recent.len() < 2 * self.window {
            return false;
        }
        self.recent.range(..self.window).any(|&p| p == new_head)
            && self.recent.range(self.window..).any(|&p| p == new_head)
    }

    pub fn record(&mut self, head: Position) {
        if self.window == 0 {
            return;
        }
        self.recent.push_back(head);
        while self.recent.len() > 2 * self.window {
            self.recent.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

/// Moves the snake one cell. On a terminal result the snake is left untouched.
pub fn advance(
    grid: &Grid,
    snake: &mut Snake,
    history: &mut CycleDetector,
    proposed: Direction,
    rules: &MovementRules,
) -> Advance {
    let direction =
        if rules.reversal_guard && snake.is_reversal(proposed) {
            snake.heading()
        } else {
            proposed
        };

    let new_head = snake.head().step(direction);
    if !grid.contains(new_head) {
        return Advance::Terminal(TerminalReason::Wall);
    }
    if snake.collides(new_head) {
        return Advance::Terminal(TerminalReason::SelfCollision);
    }
    if history.is_cycle(new_head) {
        return Advance::Terminal(TerminalReason::Cycle);
    }

    history.record(new_head);
    snake.slither(new_head, direction);
    Advance::Continues
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREE: MovementRules = MovementRules { reversal_guard: false };
    const GUARDED: MovementRules = MovementRules { reversal_guard: true };

    #[test]
    fn walls_are_terminal_on_every_edge() {
        let grid = Grid::new(5);
        let cases = [
            (Position::new(0, 2), Direction::Left),
            (Position::new(4, 2), Direction::Right),
            (Position::new(2, 0), Direction::Up),
            (Position::new(2, 4), Direction::Down),
        ];
        for (start, direction) in cases {
            let mut snake = Snake::new(start, direction, 1);
            let mut history = CycleDetector::new(0, start);
            let res = advance(&grid, &mut snake, &mut history, direction, &FREE);
            assert_eq!(res, Advance::Terminal(TerminalReason::Wall));
            assert_eq!(snake.head(), start);
        }
    }

    #[test]
    fn head_stays_on_board_while_continuing() {
        let grid = Grid::new(6);
        let start = Position::new(1, 1);
        let mut snake = Snake::new(start, Direction::Right, 1);
        let mut history = CycleDetector::new(0, start);
        let moves = [Direction::Right, Direction::Down, Direction::Down, Direction::Right, Direction::Up];
        for d in moves {
            if advance(&grid, &mut snake, &mut history, d, &FREE) == Advance::Continues {
                assert!(grid.contains(snake.head()));
            }
        }
    }

    #[test]
    fn reversing_into_neck_without_guard_is_self_collision() {
        let grid = Grid::new(10);
        let start = Position::new(5, 5);
        let mut snake = Snake::new(start, Direction::Right, 3);
        let mut history = CycleDetector::new(10, start);
        let res = advance(&grid, &mut snake, &mut history, Direction::Left, &FREE);
        assert_eq!(res, Advance::Terminal(TerminalReason::SelfCollision));
    }

    #[test]
    fn reversal_guard_keeps_heading() {
        let grid = Grid::new(10);
        let start = Position::new(5, 5);
        let mut snake = Snake::new(start, Direction::Right, 3);
        let mut history = CycleDetector::new(10, start);
        let res = advance(&grid, &mut snake, &mut history, Direction::Left, &GUARDED);
        assert_eq!(res, Advance::Continues);
        assert_eq!(snake.head(), Position::new(6, 5));
        assert_eq!(snake.heading(), Direction::Right);
    }

    #[test]
    fn length_changes_only_after_growth() {
        let grid = Grid::new(10);
        let start = Position::new(2, 2);
        let mut snake = Snake::new(start, Direction::Right, 2);
        let mut history = CycleDetector::new(0, start);

        advance(&grid, &mut snake, &mut history, Direction::Right, &FREE);
        assert_eq!(snake.len(), 2);

        snake.grow();
        advance(&grid, &mut snake, &mut history, Direction::Down, &FREE);
        assert_eq!(snake.len(), 3);

        advance(&grid, &mut snake, &mut history, Direction::Down, &FREE);
        assert_eq!(snake.len(), 3);
    }

    #[test]
    fn oscillation_is_a_cycle() {
        let window = 4;
        let grid = Grid::new(16);
        let start = Position::new(5, 5);
        let mut snake = Snake::new(start, Direction::Left, 1);
        let mut history = CycleDetector::new(window, start);

        let mut result = Advance::Continues;
        for tick in 0..2 * window {
            let d = if tick % 2 == 0 { Direction::Left } else { Direction::Right };
            result = advance(&grid, &mut snake, &mut history, d, &FREE);
            if result != Advance::Continues {
                break;
            }
        }
        assert_eq!(result, Advance::Terminal(TerminalReason::Cycle));
    }

    #[test]
    fn straight_line_is_not_a_cycle() {
        let window = 4;
        let grid = Grid::new(16);
        let start = Position::new(1, 1);
        let mut snake = Snake::new(start, Direction::Right, 1);
        let mut history = CycleDetector::new(window, start);
        for _ in 0..2 * window {
            let res = advance(&grid, &mut snake, &mut history, Direction::Right, &FREE);
            assert_eq!(res, Advance::Continues);
        }
        assert_eq!(history.len(), 2 * window);
    }

    #[test]
    fn zero_window_disables_detection() {
        let grid = Grid::new(16);
        let start = Position::new(5, 5);
        let mut snake = Snake::new(start, Direction::Left, 1);
        let mut history = CycleDetector::new(0, start);
        for tick in 0..40 {
            let d = if tick % 2 == 0 { Direction::Left } else { Direction::Right };
            assert_eq!(advance(&grid, &mut snake, &mut history, d, &FREE), Advance::Continues);
        }
        assert!(history.is_empty());
    }
}
