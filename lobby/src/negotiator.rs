use common_net::metrics::lobby_metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::LobbyConfig,
    error::LobbyError,
    names::NameAllocator,
    roster::{self, RosterEntry},
    service::{
        ConnectionId, PeerId, Role, SessionEvent, SessionHandle, SessionService, ShutdownReason,
        StartRequest,
    },
    sessions::{self, JoinableSession},
};

pub const EMPTY_NAME_MESSAGE: &str = "Session name cannot be empty.";

/// A create or join request with a validated session name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttempt {
    pub session_name: String,
    pub role: Role,
}

impl SessionAttempt {
    pub fn new(role: Role, raw_name: &str) -> Result<Self, LobbyError> {
        let session_name = raw_name.trim();
        if session_name.is_empty() {
            return Err(LobbyError::EmptyInput);
        }
        Ok(Self {
            session_name: session_name.to_string(),
            role,
        })
    }

    pub fn create(raw_name: &str) -> Result<Self, LobbyError> {
        Self::new(Role::Host, raw_name)
    }

    pub fn join(raw_name: &str) -> Result<Self, LobbyError> {
        Self::new(Role::Client, raw_name)
    }
}

/// A yes/no prompt whose "yes" re-issues `retry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub message: String,
    pub retry: SessionAttempt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub connection: ConnectionId,
    pub session_name: String,
    pub role: Role,
    pub local_peer: PeerId,
}

impl ActiveSession {
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}

impl From<SessionHandle> for ActiveSession {
    fn from(handle: SessionHandle) -> Self {
        Self {
            connection: handle.connection,
            session_name: handle.session_name,
            role: handle.role,
            local_peer: handle.local_peer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatorState {
    Idle,
    Attempting(SessionAttempt),
    InSession(ActiveSession),
    AwaitingConfirmation(Confirmation),
}

/// Which screens a front end should show. Purely presentational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Panels {
    pub intro: bool,
    pub lobby: bool,
    pub session: bool,
    pub confirmation: bool,
    pub start_button: bool,
    pub waiting_button: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLaunch {
    pub session_name: String,
    pub scene: String,
}

/// Drives create/join attempts against a [`SessionService`] and owns every
/// piece of session-scoped state: the name bindings and the roster.
pub struct SessionNegotiator<S> {
    service: S,
    config: LobbyConfig,
    names: NameAllocator,
    state: NegotiatorState,
    notice: Option<String>,
    in_lobby: bool,
    roster: Vec<RosterEntry>,
    sessions: Vec<JoinableSession>,
}

impl<S: SessionService> SessionNegotiator<S> {
    pub fn new(service: S, config: LobbyConfig) -> Self {
        let names = NameAllocator::new(config.name_pool.clone());
        Self {
            service,
            config,
            names,
            state: NegotiatorState::Idle,
            notice: None,
            in_lobby: false,
            roster: Vec::new(),
            sessions: Vec::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn state(&self) -> &NegotiatorState {
        &self.state
    }

    pub fn names(&self) -> &NameAllocator {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut NameAllocator {
        &mut self.names
    }

    pub fn active_session(&self) -> Option<&ActiveSession> {
        match &self.state {
            NegotiatorState::InSession(session) => Some(session),
            _ => None,
        }
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        match &self.state {
            NegotiatorState::AwaitingConfirmation(confirmation) => Some(confirmation),
            _ => None,
        }
    }

    /// Informational message with no action bound to it.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn roster_lines(&self) -> Vec<String> {
        roster::render(&self.roster)
    }

    pub fn joinable_sessions(&self) -> &[JoinableSession] {
        &self.sessions
    }

    pub fn panels(&self) -> Panels {
        let session = self.active_session();
        let in_session = session.is_some();
        let is_host = session.map(ActiveSession::is_host).unwrap_or(false);

        Panels {
            intro: !in_session && !self.in_lobby,
            lobby: !in_session && self.in_lobby,
            session: in_session,
            confirmation: self.notice.is_some()
                || matches!(self.state, NegotiatorState::AwaitingConfirmation(_)),
            start_button: in_session && is_host,
            waiting_button: in_session && !is_host,
        }
    }

    /// Moves from the intro screen to the session browser.
    pub fn enter_lobby(&mut self) {
        self.in_lobby = true;
    }

    /// Validates the name and moves to `Attempting`. Nothing is sent yet; call
    /// [`resolve`](Self::resolve) to issue the attempt.
    pub fn request(&mut self, role: Role, raw_name: &str) -> Result<SessionAttempt, LobbyError> {
        if matches!(self.state, NegotiatorState::Attempting(_)) {
            return Err(LobbyError::AttemptInProgress);
        }

        let attempt = match SessionAttempt::new(role, raw_name) {
            Ok(attempt) => attempt,
            Err(err) => {
                debug!("rejected blank session name");
                self.notice = Some(EMPTY_NAME_MESSAGE.to_string());
                if matches!(self.state, NegotiatorState::AwaitingConfirmation(_)) {
                    self.state = NegotiatorState::Idle;
                }
                return Err(err);
            }
        };

        self.notice = None;
        self.state = NegotiatorState::Attempting(attempt.clone());
        Ok(attempt)
    }

    /// Issues the pending attempt, tearing down a running transport first.
    pub async fn resolve(&mut self) -> Result<ActiveSession, LobbyError> {
        let attempt = match &self.state {
            NegotiatorState::Attempting(attempt) => attempt.clone(),
            _ => return Err(LobbyError::NoPendingAttempt),
        };

        if self.service.is_running().await {
            info!(session = %attempt.session_name, "shutting down running transport before new attempt");
            self.service.shutdown().await;
            self.clear_session_scope();
        }

        let request = StartRequest {
            session_name: attempt.session_name.clone(),
            role: attempt.role,
            is_open: true,
            is_visible: true,
            max_players: self.config.max_players,
        };

        match self.service.start(request).await {
            Ok(handle) => {
                let session = ActiveSession::from(handle);
                match session.role {
                    Role::Host => lobby_metrics().inc_sessions_created(),
                    Role::Client => lobby_metrics().inc_sessions_joined(),
                }
                info!(
                    session = %session.session_name,
                    role = %session.role,
                    peer = %session.local_peer,
                    connection = %session.connection,
                    "entered session"
                );

                self.state = NegotiatorState::InSession(session.clone());
                self.refresh_roster().await;
                Ok(session)
            }
            Err(source) => {
                lobby_metrics().inc_attempts_failed();
                warn!(
                    session = %attempt.session_name,
                    role = %attempt.role,
                    %source,
                    "session attempt failed"
                );

                let name = attempt.session_name;
                let retry = SessionAttempt {
                    session_name: name.clone(),
                    role: attempt.role.alternative(),
                };
                let (message, err) = match attempt.role {
                    Role::Host => (
                        format!("Session '{name}' already exists. Do you want to join it?"),
                        LobbyError::SessionAlreadyExists { name, source },
                    ),
                    Role::Client => (
                        format!("Session '{name}' does not exist. Do you want to create it?"),
                        LobbyError::SessionNotFound { name, source },
                    ),
                };

                self.state = NegotiatorState::AwaitingConfirmation(Confirmation { message, retry });
                Err(err)
            }
        }
    }

    pub async fn create(&mut self, raw_name: &str) -> Result<ActiveSession, LobbyError> {
        self.request(Role::Host, raw_name)?;
        self.resolve().await
    }

    pub async fn join(&mut self, raw_name: &str) -> Result<ActiveSession, LobbyError> {
        self.request(Role::Client, raw_name)?;
        self.resolve().await
    }

    /// Joins the `index`th entry of [`joinable_sessions`](Self::joinable_sessions).
    pub async fn join_listed(&mut self, index: usize) -> Result<ActiveSession, LobbyError> {
        let name = self
            .sessions
            .get(index)
            .map(|listed| listed.name.clone())
            .ok_or(LobbyError::UnknownSession(index))?;
        self.join(&name).await
    }

    /// "Yes" on the confirmation prompt: queues the alternative attempt.
    pub fn confirm(&mut self) -> Result<SessionAttempt, LobbyError> {
        let retry = match &self.state {
            NegotiatorState::AwaitingConfirmation(confirmation) => confirmation.retry.clone(),
            _ => return Err(LobbyError::NoPendingConfirmation),
        };
        debug!(session = %retry.session_name, role = %retry.role, "retry confirmed");
        self.state = NegotiatorState::Attempting(retry.clone());
        Ok(retry)
    }

    pub async fn accept(&mut self) -> Result<ActiveSession, LobbyError> {
        self.confirm()?;
        self.resolve().await
    }

    /// "No" on the prompt, or closing it.
    pub fn decline(&mut self) -> Result<(), LobbyError> {
        if matches!(self.state, NegotiatorState::AwaitingConfirmation(_)) {
            self.state = NegotiatorState::Idle;
            return Ok(());
        }
        if self.notice.take().is_some() {
            return Ok(());
        }
        Err(LobbyError::NoPendingConfirmation)
    }

    pub fn dismiss(&mut self) {
        self.notice = None;
    }

    /// Leaves the session or lobby and returns to the intro screen.
    pub async fn leave(&mut self) {
        if self.service.is_running().await {
            self.service.shutdown().await;
        }
        if let Some(session) = self.active_session() {
            info!(session = %session.session_name, "left session");
        }
        self.reset();
        self.notice = None;
    }

    pub fn start_game(&self) -> Result<GameLaunch, LobbyError> {
        let session = self.active_session().ok_or(LobbyError::NotInSession)?;
        if !session.is_host() {
            warn!(session = %session.session_name, "only the host can start the game");
            return Err(LobbyError::NotHost);
        }

        info!(session = %session.session_name, scene = %self.config.game_scene, "host started the game");
        Ok(GameLaunch {
            session_name: session.session_name.clone(),
            scene: self.config.game_scene.clone(),
        })
    }

    /// Name a spawned player publishes; a placeholder if none is bound.
    pub fn player_name(&self, peer: PeerId) -> String {
        self.names.name_of(peer)
    }

    /// Despawn path: hands the player's pool slot back.
    pub fn release_player_name(&mut self, name: &str) {
        self.names.release(name);
    }

    pub async fn refresh_sessions(&mut self) {
        let listed = self.service.list_sessions().await;
        self.sessions = sessions::joinable(&listed);
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        if let Some(connection) = event.connection() {
            let current = self.active_session().map(|session| session.connection);
            if current != Some(connection) {
                debug!(%connection, "ignoring event from inactive connection");
                return;
            }
        }

        match event {
            SessionEvent::ParticipantJoined { peer, .. } => {
                let name = self.names.assign_or_get(peer);
                info!(%peer, name = %name, "participant joined");
                self.refresh_roster().await;
            }
            SessionEvent::ParticipantLeft { peer, .. } => {
                let name = self.names.remove(peer);
                info!(%peer, name = ?name, "participant left");
                self.refresh_roster().await;
            }
            SessionEvent::TransportShutdown { reason, .. } => {
                self.on_transport_shutdown(reason);
            }
            SessionEvent::SessionListUpdated { sessions } => {
                debug!(count = sessions.len(), "session list updated");
                self.sessions = sessions::joinable(&sessions);
            }
        }
    }

    /// Re-reads service state after events were dropped. A session whose
    /// transport is gone is treated as disconnected. Returns whether it reset.
    pub async fn resync(&mut self) -> bool {
        self.refresh_sessions().await;

        if self.active_session().is_none() {
            return false;
        }
        if !self.service.is_running().await {
            self.on_transport_shutdown(ShutdownReason::Disconnected);
            return true;
        }

        self.refresh_roster().await;
        false
    }

    fn on_transport_shutdown(&mut self, reason: ShutdownReason) {
        warn!(%reason, "transport shut down");
        self.reset();
        self.notice = Some(LobbyError::TransportShutdown(reason).to_string());
    }

    async fn refresh_roster(&mut self) {
        let local = match self.active_session() {
            Some(session) => session.local_peer,
            None => {
                self.roster.clear();
                return;
            }
        };

        let peers = self.service.active_participants().await;
        let mut entries = Vec::with_capacity(peers.len());
        for peer in peers {
            entries.push(RosterEntry {
                peer,
                name: self.names.assign_or_get(peer),
                is_local: peer == local,
            });
        }
        lobby_metrics().set_roster_size(entries.len() as i64);
        self.roster = entries;
    }

    fn clear_session_scope(&mut self) {
        self.roster.clear();
        self.names.clear();
        lobby_metrics().set_roster_size(0);
    }

    fn reset(&mut self) {
        self.state = NegotiatorState::Idle;
        self.in_lobby = false;
        self.sessions.clear();
        self.clear_session_scope();
    }
}
