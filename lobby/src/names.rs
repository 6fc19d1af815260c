use std::collections::{HashMap, HashSet};

use common_net::metrics::lobby_metrics;
use tracing::debug;

use crate::service::PeerId;

pub fn default_name_pool() -> Vec<String> {
    (1..=6).map(|n| format!("Player {n}")).collect()
}

/// Name used for a peer that holds no pool name.
pub fn synthesized_name(peer: PeerId) -> String {
    format!("Player {peer}")
}

/// Binds connected peers to display names drawn from an ordered pool.
///
/// Pool names are never held by two peers at once. When the pool is used up
/// the peer gets [`synthesized_name`], which is not checked for collisions.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    pool: Vec<String>,
    bindings: HashMap<PeerId, String>,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new(default_name_pool())
    }
}

impl NameAllocator {
    pub fn new(pool: Vec<String>) -> Self {
        Self {
            pool,
            bindings: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Returns the peer's name, binding the first free pool entry on first use.
    pub fn assign_or_get(&mut self, peer: PeerId) -> String {
        if let Some(name) = self.bindings.get(&peer) {
            return name.clone();
        }

        let held: HashSet<&str> = self.bindings.values().map(String::as_str).collect();
        let name = match self.pool.iter().find(|candidate| !held.contains(candidate.as_str())) {
            Some(candidate) => candidate.clone(),
            None => {
                lobby_metrics().inc_names_synthesized();
                synthesized_name(peer)
            }
        };

        debug!(%peer, name = %name, "name assigned");
        self.bindings.insert(peer, name.clone());
        name
    }

    /// Unbinds whoever holds `name` so the pool slot can be handed out again.
    pub fn release(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        let before = self.bindings.len();
        self.bindings.retain(|_, held| held != name);
        if self.bindings.len() != before {
            debug!(name, "name released");
        }
    }

    /// Drops the binding of a departed peer.
    pub fn remove(&mut self, peer: PeerId) -> Option<String> {
        self.bindings.remove(&peer)
    }

    pub fn name_of(&self, peer: PeerId) -> String {
        self.try_name_of(peer)
            .map(str::to_owned)
            .unwrap_or_else(|| synthesized_name(peer))
    }

    pub fn try_name_of(&self, peer: PeerId) -> Option<&str> {
        self.bindings.get(&peer).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
