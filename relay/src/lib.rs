//! In-process stand-in for a managed relay: a shared session registry and one
//! [`RelayClient`] per local peer, implementing [`lobby::SessionService`].

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use lobby::{
    ConnectionId, PeerId, ServiceError, SessionEvent, SessionHandle, SessionInfo, SessionService,
    ShutdownReason, StartRequest,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

pub mod state;

pub use state::{HostedSession, Member, RelayState};

const EVENT_CAPACITY: usize = 1024;

struct Hub {
    state: RwLock<RelayState>,
    events: broadcast::Sender<SessionEvent>,
    next_connection: AtomicU64,
}

impl Hub {
    /// Publishes `events` plus a fresh session listing. Nobody listening is fine.
    fn publish(&self, state: &RelayState, events: Vec<SessionEvent>) {
        for event in events {
            let _ = self.events.send(event);
        }
        let _ = self.events.send(SessionEvent::SessionListUpdated {
            sessions: state.list_sessions(),
        });
    }
}

/// Shared relay. Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct MemoryRelay {
    hub: Arc<Hub>,
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRelay {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            hub: Arc::new(Hub {
                state: RwLock::new(RelayState::default()),
                events,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// A new local peer on this relay. It is idle until started.
    pub fn connect(&self) -> RelayClient {
        RelayClient {
            hub: Arc::clone(&self.hub),
            connection: Mutex::new(None),
        }
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.hub.state.read().await.list_sessions()
    }

    pub async fn hosted_session(&self, name: &str) -> Option<HostedSession> {
        self.hub.state.read().await.sessions.get(name).cloned()
    }

    /// Opens or closes a session to new joiners (a host does this when the game starts).
    pub async fn set_session_open(&self, name: &str, open: bool) -> Result<(), ServiceError> {
        let mut state = self.hub.state.write().await;
        let session = state
            .sessions
            .get_mut(name)
            .ok_or_else(|| ServiceError::SessionNotFound(name.to_string()))?;
        session.is_open = open;
        session.updated_at = chrono::Utc::now();
        info!(session = name, open, "relay: session visibility changed");
        self.hub.publish(&state, Vec::new());
        Ok(())
    }

    /// Drops every member of a session as if the relay lost them.
    pub async fn close_session(&self, name: &str) -> bool {
        let mut state = self.hub.state.write().await;
        let mut events = Vec::new();
        let closed = state.close_session(name, ShutdownReason::Disconnected, &mut events);
        if closed {
            self.hub.publish(&state, events);
        }
        closed
    }
}

/// One local peer's transport handle.
pub struct RelayClient {
    hub: Arc<Hub>,
    connection: Mutex<Option<ConnectionId>>,
}

impl RelayClient {
    pub async fn connection(&self) -> Option<ConnectionId> {
        *self.connection.lock().await
    }
}

#[async_trait]
impl SessionService for RelayClient {
    async fn start(&self, request: StartRequest) -> Result<SessionHandle, ServiceError> {
        let mut current = self.connection.lock().await;
        let mut state = self.hub.state.write().await;

        if let Some(connection) = *current {
            if state.memberships.contains_key(&connection) {
                return Err(ServiceError::AlreadyRunning);
            }
        }

        let connection = ConnectionId(self.hub.next_connection.fetch_add(1, Ordering::Relaxed));
        let mut events = Vec::new();
        let handle = state.start(connection, request, &mut events)?;

        *current = Some(connection);
        debug!(%connection, session = %handle.session_name, role = %handle.role, "relay: transport started");
        self.hub.publish(&state, events);
        Ok(handle)
    }

    async fn shutdown(&self) {
        let mut current = self.connection.lock().await;
        let Some(connection) = current.take() else {
            return;
        };

        let mut state = self.hub.state.write().await;
        if !state.memberships.contains_key(&connection) {
            return;
        }
        let mut events = Vec::new();
        state.leave(connection, &mut events);
        debug!(%connection, "relay: transport shut down");
        self.hub.publish(&state, events);
    }

    async fn is_running(&self) -> bool {
        match *self.connection.lock().await {
            Some(connection) => self.hub.state.read().await.memberships.contains_key(&connection),
            None => false,
        }
    }

    async fn active_participants(&self) -> Vec<PeerId> {
        match *self.connection.lock().await {
            Some(connection) => self.hub.state.read().await.participants(connection),
            None => Vec::new(),
        }
    }

    async fn list_sessions(&self) -> Vec<SessionInfo> {
        self.hub.state.read().await.list_sessions()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.hub.events.subscribe()
    }
}
