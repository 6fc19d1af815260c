use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use lobby::{
    ConnectionId, LobbyConfig, LobbyError, NegotiatorState, PeerId, Role, ServiceError,
    SessionAttempt, SessionEvent, SessionHandle, SessionInfo, SessionNegotiator, SessionService,
    ShutdownReason, StartRequest,
};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Start(Role, String),
    Shutdown,
}

#[derive(Debug, Default)]
struct Script {
    existing: HashSet<String>,
    running: bool,
    keep_running_on_failure: bool,
    participants: Vec<PeerId>,
    connection: u64,
    calls: Vec<Call>,
}

/// Session service double: sessions "exist" when listed in `existing`.
#[derive(Clone)]
struct ScriptedService {
    script: Arc<Mutex<Script>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ScriptedService {
    fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            events,
        }
    }

    fn with_existing(self, name: &str) -> Self {
        self.script.lock().unwrap().existing.insert(name.to_string());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    fn add_peer(&self, peer: PeerId) {
        self.script.lock().unwrap().participants.push(peer);
    }

    fn remove_peer(&self, peer: PeerId) {
        self.script.lock().unwrap().participants.retain(|p| *p != peer);
    }
}

#[async_trait]
impl SessionService for ScriptedService {
    async fn start(&self, request: StartRequest) -> Result<SessionHandle, ServiceError> {
        let mut script = self.script.lock().unwrap();
        script
            .calls
            .push(Call::Start(request.role, request.session_name.clone()));

        let exists = script.existing.contains(&request.session_name);
        let outcome = match request.role {
            Role::Host if exists => Err(ServiceError::SessionAlreadyExists(request.session_name.clone())),
            Role::Client if !exists => Err(ServiceError::SessionNotFound(request.session_name.clone())),
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            script.running = script.keep_running_on_failure;
            return Err(err);
        }

        script.existing.insert(request.session_name.clone());
        script.running = true;
        script.connection += 1;
        let local_peer = match request.role {
            Role::Host => {
                script.participants = vec![PeerId(1)];
                PeerId(1)
            }
            Role::Client => {
                script.participants = vec![PeerId(1), PeerId(2)];
                PeerId(2)
            }
        };

        Ok(SessionHandle {
            connection: ConnectionId(script.connection),
            session_name: request.session_name,
            role: request.role,
            local_peer,
        })
    }

    async fn shutdown(&self) {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Shutdown);
        script.running = false;
        script.participants.clear();
    }

    async fn is_running(&self) -> bool {
        self.script.lock().unwrap().running
    }

    async fn active_participants(&self) -> Vec<PeerId> {
        self.script.lock().unwrap().participants.clone()
    }

    async fn list_sessions(&self) -> Vec<SessionInfo> {
        let script = self.script.lock().unwrap();
        let mut names: Vec<&String> = script.existing.iter().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| SessionInfo {
                name: name.clone(),
                is_open: true,
                is_visible: true,
                player_count: 1,
                max_players: 6,
            })
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

fn negotiator(service: ScriptedService) -> SessionNegotiator<ScriptedService> {
    SessionNegotiator::new(service, LobbyConfig::default())
}

fn two_name_config() -> LobbyConfig {
    LobbyConfig {
        name_pool: vec!["Player 1".into(), "Player 2".into()],
        ..LobbyConfig::default()
    }
}

#[tokio::test]
async fn blank_name_stays_idle_with_notice() {
    let mut lobby = negotiator(ScriptedService::new());

    let err = lobby.create("   ").await.unwrap_err();
    assert_eq!(err, LobbyError::EmptyInput);
    assert!(!err.offers_retry());
    assert_eq!(lobby.state(), &NegotiatorState::Idle);
    assert_eq!(lobby.notice(), Some("Session name cannot be empty."));
    assert!(lobby.panels().confirmation);
    assert!(lobby.service().calls().is_empty());

    lobby.decline().unwrap();
    assert_eq!(lobby.notice(), None);
    assert!(!lobby.panels().confirmation);
}

#[tokio::test]
async fn create_success_enters_session_with_host_roster() {
    let mut lobby = negotiator(ScriptedService::new());
    lobby.enter_lobby();
    assert!(lobby.panels().lobby);

    let session = lobby.create("  Room1 ").await.unwrap();
    assert_eq!(session.session_name, "Room1");
    assert_eq!(session.role, Role::Host);
    assert!(matches!(lobby.state(), NegotiatorState::InSession(_)));
    assert_eq!(lobby.roster_lines(), vec!["Player 1 (YOU)"]);

    let panels = lobby.panels();
    assert!(panels.session && panels.start_button);
    assert!(!panels.lobby && !panels.intro && !panels.waiting_button);
}

#[tokio::test]
async fn create_on_existing_session_offers_join() {
    let mut lobby = negotiator(ScriptedService::new().with_existing("Room1"));

    let err = lobby.create("Room1").await.unwrap_err();
    assert!(matches!(err, LobbyError::SessionAlreadyExists { ref name, .. } if name == "Room1"));
    assert!(err.offers_retry());

    let confirmation = lobby.confirmation().expect("prompt shown").clone();
    assert_eq!(
        confirmation.message,
        "Session 'Room1' already exists. Do you want to join it?"
    );
    assert_eq!(confirmation.retry, SessionAttempt::join("Room1").unwrap());

    let attempt = lobby.confirm().unwrap();
    assert_eq!(lobby.state(), &NegotiatorState::Attempting(attempt.clone()));
    assert_ne!(attempt, SessionAttempt::create("Room1").unwrap());
    assert_eq!(attempt.role, Role::Client);
    assert_eq!(attempt.session_name, "Room1");

    let session = lobby.resolve().await.unwrap();
    assert_eq!(session.role, Role::Client);
    assert_eq!(lobby.roster_lines(), vec!["Player 1", "Player 2 (YOU)"]);
    assert!(lobby.panels().waiting_button);
    assert_eq!(
        lobby.service().calls(),
        vec![
            Call::Start(Role::Host, "Room1".into()),
            Call::Start(Role::Client, "Room1".into()),
        ]
    );
}

#[tokio::test]
async fn join_on_missing_session_offers_create_and_decline_returns_idle() {
    let mut lobby = negotiator(ScriptedService::new());

    let err = lobby.join("Nowhere").await.unwrap_err();
    assert_eq!(
        lobby.confirmation().map(|c| c.retry.clone()),
        Some(SessionAttempt::create(" Nowhere ").unwrap())
    );
    assert!(matches!(
        err,
        LobbyError::SessionNotFound {
            source: ServiceError::SessionNotFound(_),
            ..
        }
    ));
    assert_eq!(
        lobby.confirmation().map(|c| c.message.as_str()),
        Some("Session 'Nowhere' does not exist. Do you want to create it?")
    );

    lobby.decline().unwrap();
    assert_eq!(lobby.state(), &NegotiatorState::Idle);
    assert_eq!(lobby.confirm().unwrap_err(), LobbyError::NoPendingConfirmation);
}

#[tokio::test]
async fn accepting_create_after_failed_join_hosts_the_session() {
    let mut lobby = negotiator(ScriptedService::new());

    lobby.join("Fresh").await.unwrap_err();
    let session = lobby.accept().await.unwrap();
    assert_eq!(session.role, Role::Host);
    assert_eq!(session.session_name, "Fresh");
}

#[tokio::test]
async fn second_request_while_attempting_is_rejected() {
    let mut lobby = negotiator(ScriptedService::new());

    lobby.request(Role::Host, "Room1").unwrap();
    assert_eq!(
        lobby.request(Role::Client, "Room2").unwrap_err(),
        LobbyError::AttemptInProgress
    );
    assert_eq!(lobby.resolve().await.unwrap().session_name, "Room1");
    assert_eq!(lobby.resolve().await.unwrap_err(), LobbyError::NoPendingAttempt);
}

#[tokio::test]
async fn running_transport_is_shut_down_before_next_attempt() {
    let mut lobby = negotiator(ScriptedService::new());

    lobby.create("Room1").await.unwrap();
    lobby.create("Room2").await.unwrap();

    assert_eq!(
        lobby.service().calls(),
        vec![
            Call::Start(Role::Host, "Room1".into()),
            Call::Shutdown,
            Call::Start(Role::Host, "Room2".into()),
        ]
    );
    assert_eq!(lobby.active_session().unwrap().session_name, "Room2");
}

#[tokio::test]
async fn transport_left_running_by_failure_is_torn_down_on_retry() {
    let service = ScriptedService::new().with_existing("Room1");
    service.script.lock().unwrap().keep_running_on_failure = true;
    let mut lobby = negotiator(service);

    lobby.create("Room1").await.unwrap_err();
    lobby.accept().await.unwrap();

    assert_eq!(
        lobby.service().calls(),
        vec![
            Call::Start(Role::Host, "Room1".into()),
            Call::Shutdown,
            Call::Start(Role::Client, "Room1".into()),
        ]
    );
}

#[tokio::test]
async fn leaving_clears_roster_and_bindings() {
    let service = ScriptedService::new();
    let mut lobby = SessionNegotiator::new(service.clone(), two_name_config());

    let session = lobby.create("Room1").await.unwrap();
    service.add_peer(PeerId(2));
    lobby
        .handle_event(SessionEvent::ParticipantJoined {
            connection: session.connection,
            peer: PeerId(2),
        })
        .await;
    assert_eq!(lobby.names().try_name_of(PeerId(2)), Some("Player 2"));

    lobby.leave().await;
    assert_eq!(lobby.state(), &NegotiatorState::Idle);
    assert!(lobby.roster().is_empty());
    assert!(lobby.names().is_empty());
    assert!(lobby.panels().intro);
    assert_eq!(lobby.service().calls().last(), Some(&Call::Shutdown));

    // No stale binding survives: peer 2 is a fresh participant.
    assert_eq!(lobby.names_mut().assign_or_get(PeerId(2)), "Player 1");
}

#[tokio::test]
async fn roster_follows_join_and_leave_events() {
    let service = ScriptedService::new();
    let mut lobby = SessionNegotiator::new(service.clone(), two_name_config());
    let session = lobby.create("Room1").await.unwrap();

    for peer in [PeerId(2), PeerId(3)] {
        service.add_peer(peer);
        lobby
            .handle_event(SessionEvent::ParticipantJoined {
                connection: session.connection,
                peer,
            })
            .await;
    }
    assert_eq!(
        lobby.roster_lines(),
        vec!["Player 1 (YOU)", "Player 2", "Player 3"]
    );

    service.remove_peer(PeerId(2));
    lobby
        .handle_event(SessionEvent::ParticipantLeft {
            connection: session.connection,
            peer: PeerId(2),
        })
        .await;
    assert_eq!(lobby.roster_lines(), vec!["Player 1 (YOU)", "Player 3"]);

    service.add_peer(PeerId(4));
    lobby
        .handle_event(SessionEvent::ParticipantJoined {
            connection: session.connection,
            peer: PeerId(4),
        })
        .await;
    assert_eq!(
        lobby.roster_lines(),
        vec!["Player 1 (YOU)", "Player 3", "Player 2"]
    );
}

#[tokio::test]
async fn despawned_player_name_is_reclaimed() {
    let service = ScriptedService::new();
    let mut lobby = SessionNegotiator::new(service.clone(), two_name_config());
    lobby.create("Room1").await.unwrap();

    assert_eq!(lobby.player_name(PeerId(1)), "Player 1");
    assert_eq!(lobby.player_name(PeerId(9)), "Player 9");

    lobby.release_player_name("Player 1");
    assert_eq!(lobby.names_mut().assign_or_get(PeerId(5)), "Player 1");
}

#[tokio::test]
async fn shutdown_of_current_connection_resets_to_idle() {
    let mut lobby = negotiator(ScriptedService::new());
    let first = lobby.create("Room1").await.unwrap();
    let second = lobby.create("Room2").await.unwrap();
    assert_ne!(first.connection, second.connection);

    // The torn-down transport reports its shutdown late.
    lobby
        .handle_event(SessionEvent::TransportShutdown {
            connection: first.connection,
            reason: ShutdownReason::Requested,
        })
        .await;
    assert_eq!(lobby.active_session(), Some(&second));

    lobby
        .handle_event(SessionEvent::TransportShutdown {
            connection: second.connection,
            reason: ShutdownReason::HostLeft,
        })
        .await;
    assert_eq!(lobby.state(), &NegotiatorState::Idle);
    assert!(lobby.roster().is_empty());
    assert!(lobby.notice().unwrap().contains("host left the session"));
    assert!(lobby.confirmation().is_none());
}

#[tokio::test]
async fn only_host_may_start_the_game() {
    let mut host = negotiator(ScriptedService::new());
    assert_eq!(host.start_game().unwrap_err(), LobbyError::NotInSession);

    host.create("Room1").await.unwrap();
    let launch = host.start_game().unwrap();
    assert_eq!(launch.scene, "GameScene");
    assert_eq!(launch.session_name, "Room1");

    let mut client = negotiator(ScriptedService::new().with_existing("Room1"));
    client.join("Room1").await.unwrap();
    assert_eq!(client.start_game().unwrap_err(), LobbyError::NotHost);
}

#[tokio::test]
async fn listed_sessions_can_be_joined_by_index() {
    let mut lobby = negotiator(ScriptedService::new().with_existing("Alpha"));
    lobby.enter_lobby();

    lobby
        .handle_event(SessionEvent::SessionListUpdated {
            sessions: vec![
                SessionInfo {
                    name: "Full".into(),
                    is_open: true,
                    is_visible: true,
                    player_count: 6,
                    max_players: 6,
                },
                SessionInfo {
                    name: "Alpha".into(),
                    is_open: true,
                    is_visible: true,
                    player_count: 1,
                    max_players: 6,
                },
            ],
        })
        .await;

    let labels: Vec<String> = lobby.joinable_sessions().iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["Alpha (1/6)"]);

    assert_eq!(
        lobby.join_listed(3).await.unwrap_err(),
        LobbyError::UnknownSession(3)
    );
    let session = lobby.join_listed(0).await.unwrap();
    assert_eq!(session.session_name, "Alpha");
    assert_eq!(session.role, Role::Client);
}

#[tokio::test]
async fn refresh_sessions_pulls_from_service() {
    let mut lobby = negotiator(ScriptedService::new().with_existing("B").with_existing("A"));
    lobby.refresh_sessions().await;

    let names: Vec<&str> = lobby
        .joinable_sessions()
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["A", "B"]);
}
