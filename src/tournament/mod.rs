//! Elimination tournaments: roster intake, bracket seeding and advancement

pub mod bracket;
pub mod model;
pub mod service;
pub mod store;

pub use bracket::MatchScore;
pub use model::{Tournament, TournamentStatus};
pub use service::TournamentService;

use uuid::Uuid;

/// Tournament intake and bracket errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("tournament name is required")]
    MissingName,

    #[error("tournament host is required")]
    MissingHost,

    #[error("at least two players are required")]
    TooFewPlayers,

    #[error("player names must not be blank")]
    BlankName,

    #[error("duplicate player name '{0}'")]
    DuplicateName(String),

    #[error("roster of {0} players is not a power of two")]
    UnpaddedRoster(usize),

    #[error("invalid tournament settings: {0}")]
    InvalidSettings(&'static str),

    #[error("host '{0}' already has a tournament in progress")]
    HostBusy(String),

    #[error("tournament {0} not found")]
    NotFound(Uuid),

    #[error("tournament is no longer in progress")]
    Closed,

    #[error("'{0}' is not a participant of this tournament")]
    UnknownParticipant(String),

    #[error("the match of '{0}' is already decided")]
    AlreadyDecided(String),

    #[error("the opponent of '{0}' is not decided yet")]
    OpponentPending(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(&'static str),
}
