//! Volley match simulation and per-connection sessions

pub mod ball;
pub mod paddle;
pub mod physics;
pub mod registry;
pub mod score;
pub mod session;
pub mod settings;

pub use registry::SessionRegistry;
pub use session::{MatchSession, ResultReporter};

/// Session lifecycle state. The numeric code is what status frames carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameStatus {
    /// Connected, no match running
    Idle = 0,
    /// Validating a `start` command
    Initializing = 1,
    InProgress = 2,
    Paused = 3,
    Ended = 4,
}

impl GameStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Invalid values fed to the simulation, or a tick that cannot proceed
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid setting: {0}")]
    InvalidSetting(&'static str),

    #[error("ball state is not finite")]
    NonFinite,

    #[error("tick ran without a score")]
    ScoreMissing,
}

/// `start` rejections. `Display` is the message sent to the client.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Cannot start game: No controllers found in settings!")]
    MissingControllers,

    #[error("Failed to initialize Score")]
    Score,

    #[error("Invalid gameplay settings")]
    Gameplay,

    #[error("Failed to create paddles")]
    Paddles,
}
