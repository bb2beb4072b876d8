pub mod body;
pub mod cli;
pub mod display;
pub mod engine;
pub mod episode;
pub mod food;
pub mod geometry;
pub mod sensors;

pub use body::Snake;
pub use engine::{advance, Advance, CycleDetector, MovementRules, TerminalReason};
pub use episode::{run_episode, Controller, EpisodeConfig, EpisodeOutcome, EpisodeSetup, Observer, Replay, Steering, Unobserved};
pub use food::{place_food, FoodSource, PresetFood, RandomFood};
pub use geometry::{Compass, Direction, Grid, Position};
pub use sensors::{Encoding, FoodCue};
