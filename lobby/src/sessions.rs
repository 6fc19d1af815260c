use crate::service::SessionInfo;

/// A listed session the local player may join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinableSession {
    pub name: String,
    pub player_count: u32,
    pub max_players: u32,
}

impl JoinableSession {
    pub fn label(&self) -> String {
        format!("{} ({}/{})", self.name, self.player_count, self.max_players)
    }
}

/// Keeps sessions that are open, visible and not full, in listing order.
pub fn joinable(sessions: &[SessionInfo]) -> Vec<JoinableSession> {
    sessions
        .iter()
        .filter(|s| s.is_open && s.is_visible && s.player_count < s.max_players)
        .map(|s| JoinableSession {
            name: s.name.clone(),
            player_count: s.player_count,
            max_players: s.max_players,
        })
        .collect()
}
