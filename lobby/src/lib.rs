//! Lobby front end over a relay-backed session service: display-name
//! allocation for connected peers and the create/join/retry negotiation.

pub mod config;
pub mod error;
pub mod names;
pub mod negotiator;
pub mod roster;
pub mod service;
pub mod sessions;

pub use common_net::BoxError;
pub use config::{LobbyConfig, LobbySettings};
pub use error::LobbyError;
pub use names::NameAllocator;
pub use negotiator::{
    ActiveSession, Confirmation, GameLaunch, NegotiatorState, Panels, SessionAttempt,
    SessionNegotiator,
};
pub use roster::RosterEntry;
pub use service::{
    ConnectionId, PeerId, Role, ServiceError, SessionEvent, SessionHandle, SessionInfo,
    SessionService, ShutdownReason, StartRequest,
};
pub use sessions::JoinableSession;
