//! Live session bookkeeping for health reporting

use dashmap::DashMap;
use uuid::Uuid;

use crate::util::time::unix_millis;

#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    pub opened_at: u64,
}

/// Registry of all open match sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn register(&self, id: Uuid) {
        self.sessions.insert(
            id,
            SessionInfo {
                opened_at: unix_millis(),
            },
        );
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionInfo> {
        self.sessions.remove(id).map(|(_, info)| info)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_open_sessions() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id);
        registry.register(Uuid::new_v4());
        assert_eq!(registry.active_sessions(), 2);

        let info = registry.remove(&id).unwrap();
        assert!(info.opened_at > 0);
        assert!(registry.remove(&id).is_none());
        assert_eq!(registry.active_sessions(), 1);
    }
}
