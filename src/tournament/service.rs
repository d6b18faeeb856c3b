//! Tournament service: intake, queries and result reporting

use std::collections::HashSet;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::bracket::{Bracket, MatchScore};
use super::model::{Controller, Participant, Tournament, TournamentPatch, TournamentStatus};
use super::store::TournamentStore;
use super::BracketError;
use crate::game::session::ResultReporter;
use crate::game::settings::{GameSettings, GameplaySettings};

/// Roster entry of a creation request
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerEntry {
    pub name: String,
    #[serde(default)]
    pub controlled_by: Controller,
    #[serde(default)]
    pub key: Option<Uuid>,
}

/// `POST /tournaments` body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTournament {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub players: Vec<PlayerEntry>,
    #[serde(default)]
    pub game: GameSettings,
    #[serde(default)]
    pub gameplay: GameplaySettings,
}

pub struct TournamentService {
    store: TournamentStore,
    rng: Mutex<ChaCha8Rng>,
}

impl TournamentService {
    /// `seed` makes bracket draws reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            store: TournamentStore::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn tournament_count(&self) -> usize {
        self.store.len()
    }

    /// Validate the request, pad and shuffle the roster, seed the bracket
    pub fn create(&self, request: CreateTournament) -> Result<Tournament, BracketError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(BracketError::MissingName);
        }
        let host = request.host.trim().to_string();
        if host.is_empty() {
            return Err(BracketError::MissingHost);
        }
        request
            .game
            .validate()
            .map_err(|_| BracketError::InvalidSettings("game"))?;
        request
            .gameplay
            .validate()
            .map_err(|_| BracketError::InvalidSettings("gameplay"))?;

        let players = validate_roster(request.players)?;

        let mut roster = pad_roster(players);
        let brackets = {
            let mut rng = self.rng.lock();
            roster.shuffle(&mut *rng);
            Bracket::seed(&roster, request.game.end_score, &mut *rng)?
        };

        let tournament = Tournament::new(
            name,
            host,
            roster,
            brackets,
            request.game,
            request.gameplay,
        );
        self.store.insert_open(tournament.clone())?;
        info!(
            tournament_id = %tournament.id,
            host = %tournament.host,
            players = tournament.players.len(),
            "Tournament created"
        );
        Ok(tournament)
    }

    pub fn get(&self, id: Uuid) -> Result<Tournament, BracketError> {
        self.store.get(&id).ok_or(BracketError::NotFound(id))
    }

    pub fn list(&self, host: Option<&str>, status: Option<TournamentStatus>) -> Vec<Tournament> {
        self.store.list(host, status)
    }

    pub fn patch(&self, id: Uuid, patch: TournamentPatch) -> Result<Tournament, BracketError> {
        self.store.update(&id, |t| t.apply_patch(patch))
    }

    /// Record a played result and advance the bracket
    pub fn report(
        &self,
        id: Uuid,
        winner: &str,
        score: MatchScore,
    ) -> Result<Tournament, BracketError> {
        let updated = self.store.update(&id, |t| {
            let mut rng = self.rng.lock();
            t.report_result(winner, score, &mut *rng)
        })?;

        if let Some(champion) = updated.winner.as_deref().filter(|_| !updated.is_open()) {
            info!(tournament_id = %id, champion = %champion, "Tournament finished");
        }
        Ok(updated)
    }
}

impl ResultReporter for TournamentService {
    fn report_result(
        &self,
        tournament_id: Uuid,
        winner: &str,
        score: MatchScore,
    ) -> Result<(), BracketError> {
        self.report(tournament_id, winner, score).map(|_| ())
    }
}

/// Trim names, require a unique non-blank name per player
fn validate_roster(entries: Vec<PlayerEntry>) -> Result<Vec<Participant>, BracketError> {
    if entries.len() < 2 {
        return Err(BracketError::TooFewPlayers);
    }

    let mut seen = HashSet::with_capacity(entries.len());
    let mut players = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            return Err(BracketError::BlankName);
        }
        if !seen.insert(name.clone()) {
            return Err(BracketError::DuplicateName(name));
        }
        players.push(Participant {
            name,
            controlled_by: entry.controlled_by,
            key: entry.key.unwrap_or_else(Uuid::new_v4),
        });
    }
    Ok(players)
}

/// Fill the roster up to the next power of two with computer players
fn pad_roster(mut players: Vec<Participant>) -> Vec<Participant> {
    let target = players.len().next_power_of_two();
    let mut taken: HashSet<String> = players.iter().map(|p| p.name.clone()).collect();
    let mut counter = 1;
    while players.len() < target {
        let name = format!("CPU {}", counter);
        counter += 1;
        if taken.insert(name.clone()) {
            players.push(Participant::ai(name));
        } else {
            warn!(name = %name, "Generated computer name already taken, skipping");
        }
    }
    players
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn entry(name: &str) -> PlayerEntry {
        PlayerEntry {
            name: name.into(),
            controlled_by: Controller::Player,
            key: None,
        }
    }

    fn request(host: &str, names: &[&str]) -> CreateTournament {
        CreateTournament {
            name: "Spring Cup".into(),
            host: host.into(),
            players: names.iter().map(|n| entry(n)).collect(),
            game: GameSettings::default(),
            gameplay: GameplaySettings::default(),
        }
    }

    #[test]
    fn roster_is_padded_to_power_of_two() {
        let service = TournamentService::new(Some(7));
        for n in 2..=17usize {
            let names: Vec<String> = (0..n).map(|i| format!("player {}", i)).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let t = service.create(request(&format!("host {}", n), &refs)).unwrap();

            let size = n.next_power_of_two();
            assert_eq!(t.players.len(), size);
            assert_eq!(t.players.iter().filter(|p| p.is_ai()).count(), size - n);
            assert_eq!(t.brackets.stages().len(), size.trailing_zeros() as usize);
            assert_eq!(t.brackets.stages()[0].matches.len(), size / 2);
        }
        assert_eq!(service.tournament_count(), 16);
    }

    #[test]
    fn intake_rejects_bad_rosters() {
        let service = TournamentService::new(Some(1));
        assert_eq!(
            service.create(request("h", &["solo"])).unwrap_err(),
            BracketError::TooFewPlayers
        );
        assert_eq!(
            service.create(request("h", &["ann", " ann "])).unwrap_err(),
            BracketError::DuplicateName("ann".into())
        );
        assert_eq!(
            service.create(request("h", &["ann", "  "])).unwrap_err(),
            BracketError::BlankName
        );
        assert_eq!(
            service.create(request(" ", &["a", "b"])).unwrap_err(),
            BracketError::MissingHost
        );
        let mut nameless = request("h", &["a", "b"]);
        nameless.name.clear();
        assert_eq!(service.create(nameless).unwrap_err(), BracketError::MissingName);
    }

    #[test]
    fn generated_names_avoid_existing_players() {
        let padded = pad_roster(vec![
            Participant::human("CPU 1"),
            Participant::human("x"),
            Participant::human("y"),
        ]);
        assert_eq!(padded.len(), 4);
        assert_eq!(padded[3].name, "CPU 2");
    }

    #[test]
    fn one_open_tournament_per_host() {
        let service = TournamentService::new(Some(2));
        let first = assert_ok!(service.create(request("h", &["a", "b"])));
        let busy = assert_err!(service.create(request("h", &["c", "d"])));
        assert_eq!(busy, BracketError::HostBusy("h".into()));

        assert_ok!(service.report(first.id, "a", MatchScore { left: 6, right: 2 }));
        assert_ok!(service.create(request("h", &["c", "d"])));
    }

    #[test]
    fn concurrent_creates_for_one_host_admit_one() {
        let service = &TournamentService::new(Some(5));
        let admitted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || service.create(request("h", &["a", "b", "c"]))))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });
        assert_eq!(admitted, 1);
        assert_eq!(service.list(Some("h"), None).len(), 1);
    }

    #[test]
    fn reports_flow_through_to_the_champion() {
        let service = TournamentService::new(Some(3));
        let t = service.create(request("h", &["a", "b", "c", "d"])).unwrap();
        let opening = &t.brackets.stages()[0].matches;
        let first_winners: Vec<String> = opening
            .iter()
            .map(|m| m.left.as_ref().unwrap().name.clone())
            .collect();

        for name in &first_winners {
            service
                .report(t.id, name, MatchScore { left: 6, right: 0 })
                .unwrap();
        }
        let done = service
            .report(t.id, &first_winners[0], MatchScore { left: 6, right: 4 })
            .unwrap();
        assert_eq!(done.status, TournamentStatus::Finished);
        assert_eq!(done.winner.as_deref(), Some(first_winners[0].as_str()));

        let missing = Uuid::new_v4();
        assert_eq!(
            service.report_result(missing, "a", MatchScore::default()),
            Err(BracketError::NotFound(missing))
        );
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let service = TournamentService::new(Some(4));
        let a = service.create(request("h1", &["a", "b"])).unwrap();
        let b = service.create(request("h2", &["a", "b"])).unwrap();

        let all = service.list(None, None);
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at >= all[1].created_at);

        let mine = service.list(Some("h1"), None);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, a.id);

        service
            .patch(
                b.id,
                TournamentPatch {
                    status: Some(TournamentStatus::Abandoned),
                    ..Default::default()
                },
            )
            .unwrap();
        let abandoned = service.list(None, Some(TournamentStatus::Abandoned));
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].id, b.id);
    }
}
