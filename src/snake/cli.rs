use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use super::display::board_to_string;
use super::episode::{BoardView, EpisodeOutcome, Observer, Steering};
use super::geometry::Direction;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum KeyAction {
    Turn(Direction),
    Quit,
}

pub fn key_to_action(code: KeyCode) -> Option<KeyAction> {
    match code {
        KeyCode::Up | KeyCode::Char('w') => Some(KeyAction::Turn(Direction::Up)),
        KeyCode::Down | KeyCode::Char('s') => Some(KeyAction::Turn(Direction::Down)),
        KeyCode::Left | KeyCode::Char('a') => Some(KeyAction::Turn(Direction::Left)),
        KeyCode::Right | KeyCode::Char('d') => Some(KeyAction::Turn(Direction::Right)),
        KeyCode::Esc | KeyCode::Char('q') => Some(KeyAction::Quit),
        _ => None,
    }
}

/// Draws the board every tick in an alternate screen. When `steerable`, arrow keys and
/// WASD replace the controller's move; Esc or q ends the game either way.
pub struct TerminalView {
    stdout: Stdout,
    steerable: bool,
    title: String,
}

impl TerminalView {
    pub fn new(title: &str, steerable: bool) -> io::Result<TerminalView> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, Hide)?;
        Ok(TerminalView { stdout, steerable, title: title.to_string() })
    }

    fn draw(&mut self, view: &BoardView) -> io::Result<()> {
        queue!(self.stdout, Clear(ClearType::All), MoveTo(0, 0), Print(&self.title))?;
        for (row, line) in board_to_string(view).lines().enumerate() {
            queue!(self.stdout, MoveTo(0, row as u16 + 2), Print(line))?;
        }
        self.stdout.flush()
    }

    /// Drains pending key presses; the last one wins.
    fn read_keys(&mut self) -> io::Result<Option<KeyAction>> {
        let mut action = None;
        while event::poll(Duration::ZERO)? {
            if let Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) = event::read()? {
                match key_to_action(code) {
                    Some(KeyAction::Quit) => return Ok(Some(KeyAction::Quit)),
                    Some(turn) => action = Some(turn),
                    None => {}
                }
            }
        }
        Ok(action)
    }
}

impl Observer for TerminalView {
    fn on_tick(&mut self, view: &BoardView) {
        if let Err(e) = self.draw(view) {
            tracing::warn!("could not draw the board: {e}");
        }
    }

    fn steer(&mut self, _heading: Direction) -> Steering {
        match self.read_keys() {
            Ok(Some(KeyAction::Quit)) => Steering::Abort,
            Ok(Some(KeyAction::Turn(d))) if self.steerable => Steering::Turn(d),
            Ok(_) => Steering::Keep,
            Err(e) => {
                tracing::warn!("could not read the keyboard: {e}");
                Steering::Keep
            }
        }
    }

    fn on_finish(&mut self, outcome: &EpisodeOutcome) {
        let _ = queue!(
            self.stdout,
            MoveTo(0, 0),
            Clear(ClearType::CurrentLine),
            Print(format!("game over ({}), score {}", outcome.reason, outcome.score))
        );
        let _ = self.stdout.flush();
        std::thread::sleep(Duration::from_millis(800));
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
