//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::SessionRegistry;
use crate::tournament::TournamentService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
    pub tournaments: Arc<TournamentService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Bracket draws are reproducible when a seed is configured
        let tournaments = Arc::new(TournamentService::new(config.bracket_seed));

        Self {
            config,
            sessions: Arc::new(SessionRegistry::new()),
            tournaments,
        }
    }
}
