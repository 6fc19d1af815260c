use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lobby::{
    ConnectionId, PeerId, Role, ServiceError, SessionEvent, SessionHandle, SessionInfo,
    ShutdownReason, StartRequest,
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Member {
    pub connection: ConnectionId,
    pub peer: PeerId,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HostedSession {
    pub id: Uuid,
    pub name: String,
    pub max_players: u32,
    pub is_open: bool,
    pub is_visible: bool,
    pub host: ConnectionId,
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    next_peer: u32,
}

impl HostedSession {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            name: self.name.clone(),
            is_open: self.is_open,
            is_visible: self.is_visible,
            player_count: self.members.len() as u32,
            max_players: self.max_players,
        }
    }

    fn admit(&mut self, connection: ConnectionId) -> PeerId {
        let now = Utc::now();
        let peer = PeerId(self.next_peer);
        self.next_peer += 1;
        self.members.push(Member {
            connection,
            peer,
            joined_at: now,
        });
        self.updated_at = now;
        peer
    }
}

/// Registry of hosted sessions plus which session each live connection is in.
#[derive(Debug, Default)]
pub struct RelayState {
    pub sessions: HashMap<String, HostedSession>,
    pub memberships: HashMap<ConnectionId, String>,
}

impl RelayState {
    pub fn start(
        &mut self,
        connection: ConnectionId,
        request: StartRequest,
        events: &mut Vec<SessionEvent>,
    ) -> Result<SessionHandle, ServiceError> {
        let local_peer = match request.role {
            Role::Host => self.create_session(connection, &request)?,
            Role::Client => self.join_session(connection, &request, events)?,
        };
        self.memberships
            .insert(connection, request.session_name.clone());

        Ok(SessionHandle {
            connection,
            session_name: request.session_name,
            role: request.role,
            local_peer,
        })
    }

    fn create_session(
        &mut self,
        connection: ConnectionId,
        request: &StartRequest,
    ) -> Result<PeerId, ServiceError> {
        if self.sessions.contains_key(&request.session_name) {
            return Err(ServiceError::SessionAlreadyExists(request.session_name.clone()));
        }

        let now = Utc::now();
        let mut session = HostedSession {
            id: Uuid::new_v4(),
            name: request.session_name.clone(),
            max_players: request.max_players,
            is_open: request.is_open,
            is_visible: request.is_visible,
            host: connection,
            members: Vec::new(),
            created_at: now,
            updated_at: now,
            next_peer: 1,
        };
        let peer = session.admit(connection);

        info!(session = %session.name, id = %session.id, %connection, "relay: session created");
        self.sessions.insert(session.name.clone(), session);
        Ok(peer)
    }

    fn join_session(
        &mut self,
        connection: ConnectionId,
        request: &StartRequest,
        events: &mut Vec<SessionEvent>,
    ) -> Result<PeerId, ServiceError> {
        let name = &request.session_name;
        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| ServiceError::SessionNotFound(name.clone()))?;

        if !session.is_open {
            return Err(ServiceError::SessionClosed(name.clone()));
        }
        if session.members.len() as u32 >= session.max_players {
            return Err(ServiceError::SessionFull(name.clone()));
        }

        let peer = session.admit(connection);
        for member in &session.members {
            if member.connection != connection {
                events.push(SessionEvent::ParticipantJoined {
                    connection: member.connection,
                    peer,
                });
            }
            // The joiner hears about everyone already present, itself included.
            events.push(SessionEvent::ParticipantJoined {
                connection,
                peer: member.peer,
            });
        }

        info!(session = %name, %peer, %connection, "relay: peer joined");
        Ok(peer)
    }

    /// Removes `connection` from its session. A departing host closes the session.
    pub fn leave(&mut self, connection: ConnectionId, events: &mut Vec<SessionEvent>) {
        let Some(name) = self.memberships.remove(&connection) else {
            return;
        };
        events.push(SessionEvent::TransportShutdown {
            connection,
            reason: ShutdownReason::Requested,
        });

        let host_left = match self.sessions.get_mut(&name) {
            Some(session) if session.host == connection => true,
            Some(session) => {
                let Some(index) = session.members.iter().position(|m| m.connection == connection)
                else {
                    return;
                };
                let departed = session.members.remove(index);
                session.updated_at = Utc::now();
                for member in &session.members {
                    events.push(SessionEvent::ParticipantLeft {
                        connection: member.connection,
                        peer: departed.peer,
                    });
                }
                debug!(session = %name, peer = %departed.peer, "relay: peer left");
                false
            }
            None => false,
        };

        if host_left {
            self.close_session(&name, ShutdownReason::HostLeft, events);
        }
    }

    /// Ends a session for every remaining member.
    pub fn close_session(
        &mut self,
        name: &str,
        reason: ShutdownReason,
        events: &mut Vec<SessionEvent>,
    ) -> bool {
        let Some(session) = self.sessions.remove(name) else {
            return false;
        };

        for member in &session.members {
            if self.memberships.remove(&member.connection).is_some() {
                events.push(SessionEvent::TransportShutdown {
                    connection: member.connection,
                    reason,
                });
            }
        }

        info!(session = %name, %reason, "relay: session closed");
        true
    }

    pub fn participants(&self, connection: ConnectionId) -> Vec<PeerId> {
        self.memberships
            .get(&connection)
            .and_then(|name| self.sessions.get(name))
            .map(|session| session.members.iter().map(|m| m.peer).collect())
            .unwrap_or_default()
    }

    /// Listing ordered by creation time.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<&HostedSession> = self.sessions.values().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        sessions.into_iter().map(HostedSession::info).collect()
    }
}
