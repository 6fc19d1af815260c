use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Participant identifier, stable for the lifetime of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One started transport on a service handle. A handle that is shut down and
/// started again gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "client")]
    Client,
}

impl Role {
    /// The role offered as a retry when this one fails.
    pub fn alternative(self) -> Role {
        match self {
            Role::Host => Role::Client,
            Role::Client => Role::Host,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Client => f.write_str("client"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub session_name: String,
    pub role: Role,
    pub is_open: bool,
    pub is_visible: bool,
    pub max_players: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub connection: ConnectionId,
    pub session_name: String,
    pub role: Role,
    pub local_peer: PeerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub is_open: bool,
    pub is_visible: bool,
    pub player_count: u32,
    pub max_players: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    #[serde(rename = "requested")]
    Requested,
    #[serde(rename = "host_left")]
    HostLeft,
    #[serde(rename = "disconnected")]
    Disconnected,
    #[serde(rename = "connect_failed")]
    ConnectFailed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ShutdownReason::Requested => "shutdown requested",
            ShutdownReason::HostLeft => "host left the session",
            ShutdownReason::Disconnected => "disconnected from the relay",
            ShutdownReason::ConnectFailed => "connection failed",
        };
        f.write_str(text)
    }
}

/// Events pushed by the service. Everything except the session list is
/// addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ParticipantJoined { connection: ConnectionId, peer: PeerId },
    ParticipantLeft { connection: ConnectionId, peer: PeerId },
    TransportShutdown { connection: ConnectionId, reason: ShutdownReason },
    SessionListUpdated { sessions: Vec<SessionInfo> },
}

impl SessionEvent {
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            SessionEvent::ParticipantJoined { connection, .. }
            | SessionEvent::ParticipantLeft { connection, .. }
            | SessionEvent::TransportShutdown { connection, .. } => Some(*connection),
            SessionEvent::SessionListUpdated { .. } => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("session '{0}' already exists")]
    SessionAlreadyExists(String),
    #[error("session '{0}' does not exist")]
    SessionNotFound(String),
    #[error("session '{0}' is full")]
    SessionFull(String),
    #[error("session '{0}' is closed")]
    SessionClosed(String),
    #[error("transport is already running")]
    AlreadyRunning,
    #[error("session service unavailable: {0}")]
    Unavailable(String),
}

/// The relay-backed session backend the negotiator drives.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create (`Role::Host`) or join (`Role::Client`) a named session.
    async fn start(&self, request: StartRequest) -> Result<SessionHandle, ServiceError>;

    /// Tear the running transport down. Idempotent.
    async fn shutdown(&self);

    async fn is_running(&self) -> bool;

    /// Participants of the running session, local peer included.
    async fn active_participants(&self) -> Vec<PeerId>;

    async fn list_sessions(&self) -> Vec<SessionInfo>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
