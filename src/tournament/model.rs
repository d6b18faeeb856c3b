//! Tournament aggregate and participants

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bracket::{Bracket, MatchScore};
use super::BracketError;
use crate::game::settings::{GameSettings, GameplaySettings};

/// Who plays for a participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    /// Human at a connected client
    #[default]
    #[serde(alias = "human")]
    Player,
    /// Computer-controlled, matches resolve without a session
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub controlled_by: Controller,
    pub key: Uuid,
}

impl Participant {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controlled_by: Controller::Player,
            key: Uuid::new_v4(),
        }
    }

    pub fn ai(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controlled_by: Controller::Ai,
            key: Uuid::new_v4(),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.controlled_by == Controller::Ai
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    #[default]
    InProgress,
    Finished,
    Abandoned,
}

/// Manual tournament update (`PATCH`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TournamentPatch {
    pub status: Option<TournamentStatus>,
    pub winner: Option<String>,
    pub notified: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub players: Vec<Participant>,
    pub brackets: Bracket,
    pub game: GameSettings,
    pub gameplay: GameplaySettings,
    pub status: TournamentStatus,
    pub winner: Option<String>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    /// New tournament over a seeded bracket. Already finished when the
    /// roster was computer-only.
    pub fn new(
        name: String,
        host: String,
        players: Vec<Participant>,
        brackets: Bracket,
        game: GameSettings,
        gameplay: GameplaySettings,
    ) -> Self {
        let now = Utc::now();
        let mut tournament = Self {
            id: Uuid::new_v4(),
            name,
            host,
            players,
            brackets,
            game,
            gameplay,
            status: TournamentStatus::InProgress,
            winner: None,
            notified: false,
            created_at: now,
            updated_at: now,
        };
        tournament.sync_champion();
        tournament
    }

    pub fn is_open(&self) -> bool {
        self.status == TournamentStatus::InProgress
    }

    pub fn has_player(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    /// Single entry point for played results
    pub fn report_result<R: Rng + ?Sized>(
        &mut self,
        winner: &str,
        score: MatchScore,
        rng: &mut R,
    ) -> Result<(), BracketError> {
        if !self.is_open() {
            return Err(BracketError::Closed);
        }
        self.brackets
            .record_result(winner, score, self.game.end_score, rng)?;
        self.sync_champion();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: TournamentPatch) -> Result<(), BracketError> {
        if let Some(winner) = &patch.winner {
            if !self.has_player(winner) {
                return Err(BracketError::UnknownParticipant(winner.clone()));
            }
        }
        if patch.status == Some(TournamentStatus::Finished)
            && patch.winner.is_none()
            && self.winner.is_none()
        {
            return Err(BracketError::InvalidUpdate("a finished tournament needs a winner"));
        }

        if let Some(winner) = patch.winner {
            self.winner = Some(winner);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notified) = patch.notified {
            self.notified = notified;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    fn sync_champion(&mut self) {
        if let Some(champion) = self.brackets.champion() {
            self.winner = Some(champion.to_string());
            self.status = TournamentStatus::Finished;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tournament(players: Vec<Participant>, rng: &mut ChaCha8Rng) -> Tournament {
        let game = GameSettings::default();
        let brackets = Bracket::seed(&players, game.end_score, rng).unwrap();
        Tournament::new(
            "Cup".into(),
            "host".into(),
            players,
            brackets,
            game,
            GameplaySettings::default(),
        )
    }

    #[test]
    fn controller_accepts_human_alias() {
        let c: Controller = serde_json::from_str("\"human\"").unwrap();
        assert_eq!(c, Controller::Player);
        let c: Controller = serde_json::from_str("\"ai\"").unwrap();
        assert_eq!(c, Controller::Ai);
    }

    #[test]
    fn final_result_finishes_tournament() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut t = tournament(vec![Participant::human("a"), Participant::human("b")], &mut rng);
        assert!(t.is_open());

        t.report_result("b", MatchScore { left: 2, right: 6 }, &mut rng).unwrap();
        assert_eq!(t.status, TournamentStatus::Finished);
        assert_eq!(t.winner.as_deref(), Some("b"));

        assert_eq!(
            t.report_result("a", MatchScore::default(), &mut rng),
            Err(BracketError::Closed)
        );
    }

    #[test]
    fn computer_roster_is_finished_at_creation() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let t = tournament(vec![Participant::ai("x"), Participant::ai("y")], &mut rng);
        assert_eq!(t.status, TournamentStatus::Finished);
        assert!(t.winner.is_some());
    }

    #[test]
    fn finishing_by_hand_requires_a_winner() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut t = tournament(vec![Participant::human("a"), Participant::human("b")], &mut rng);

        let patch = TournamentPatch {
            status: Some(TournamentStatus::Finished),
            ..Default::default()
        };
        assert!(matches!(t.apply_patch(patch), Err(BracketError::InvalidUpdate(_))));

        let patch = TournamentPatch {
            winner: Some("zed".into()),
            ..Default::default()
        };
        assert_eq!(t.apply_patch(patch), Err(BracketError::UnknownParticipant("zed".into())));

        let patch = TournamentPatch {
            status: Some(TournamentStatus::Finished),
            winner: Some("a".into()),
            notified: Some(true),
        };
        t.apply_patch(patch).unwrap();
        assert_eq!(t.status, TournamentStatus::Finished);
        assert!(t.notified);
    }
}
