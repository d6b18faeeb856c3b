//! In-memory tournament records

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::model::{Tournament, TournamentStatus};
use super::BracketError;

/// Tournament records by id. Writers of one record are serialized by the
/// map's entry lock for the duration of `update`.
pub struct TournamentStore {
    records: DashMap<Uuid, Tournament>,
    /// Held across the open-host check and the insert of a new record
    intake: Mutex<()>,
}

impl TournamentStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            intake: Mutex::new(()),
        }
    }

    /// Insert a new record unless its host already runs an open one
    pub fn insert_open(&self, tournament: Tournament) -> Result<(), BracketError> {
        let _intake = self.intake.lock();
        if self.host_has_open(&tournament.host) {
            return Err(BracketError::HostBusy(tournament.host));
        }
        self.records.insert(tournament.id, tournament);
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<Tournament> {
        self.records.get(id).map(|t| t.value().clone())
    }

    /// Records newest first, optionally narrowed by host and status
    pub fn list(&self, host: Option<&str>, status: Option<TournamentStatus>) -> Vec<Tournament> {
        let mut found: Vec<Tournament> = self
            .records
            .iter()
            .filter(|t| host.map_or(true, |h| t.host == h))
            .filter(|t| status.map_or(true, |s| t.status == s))
            .map(|t| t.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    fn host_has_open(&self, host: &str) -> bool {
        self.records.iter().any(|t| t.host == host && t.is_open())
    }

    /// Run `f` on one record while holding its entry exclusively, returning
    /// the updated record on success
    pub fn update<F>(&self, id: &Uuid, f: F) -> Result<Tournament, BracketError>
    where
        F: FnOnce(&mut Tournament) -> Result<(), BracketError>,
    {
        let mut entry = self.records.get_mut(id).ok_or(BracketError::NotFound(*id))?;
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl Default for TournamentStore {
    fn default() -> Self {
        Self::new()
    }
}
