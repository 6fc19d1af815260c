use std::str::FromStr;

use common_net::metrics;
use lobby::{
    LobbyConfig, LobbyError, NegotiatorState, Role, SessionEvent, SessionNegotiator,
    SessionService, StartRequest,
};
use relay::{MemoryRelay, RelayClient};
use thiserror::Error;
use tracing::{info, warn};

pub const HELP: &str = "\
commands:
  lobby              open the session browser
  create <name>      host a new session
  join <name>        join a session by name
  pick <n>           join the n-th listed session
  yes | no           answer the confirmation prompt
  ok                 dismiss a message
  leave              leave the session or lobby
  start              start the game (host only)
  list               refresh and show joinable sessions
  roster             show the players in the session
  bot join <name>    add a simulated remote player to a session
  bot leave          remove the most recent simulated player
  metrics            dump lobby metrics
  help               this text
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lobby,
    Create(String),
    Join(String),
    Pick(usize),
    Yes,
    No,
    Dismiss,
    Leave,
    Start,
    List,
    Roster,
    BotJoin(String),
    BotLeave,
    Metrics,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("'{0}' expects an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a list position")]
    BadIndex(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        // Session names keep their inner spaces; the negotiator trims the ends.
        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "lobby" => Command::Lobby,
            "create" => Command::Create(rest.to_string()),
            "join" => Command::Join(rest.to_string()),
            "pick" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("pick"));
                }
                let position: usize = rest
                    .parse()
                    .map_err(|_| CommandError::BadIndex(rest.to_string()))?;
                if position == 0 {
                    return Err(CommandError::BadIndex(rest.to_string()));
                }
                Command::Pick(position - 1)
            }
            "yes" | "y" => Command::Yes,
            "no" | "n" => Command::No,
            "ok" => Command::Dismiss,
            "leave" => Command::Leave,
            "start" => Command::Start,
            "list" => Command::List,
            "roster" => Command::Roster,
            "bot" => match rest.split_once(char::is_whitespace) {
                Some(("join", name)) if !name.trim().is_empty() => {
                    Command::BotJoin(name.trim().to_string())
                }
                _ if rest == "leave" => Command::BotLeave,
                _ => return Err(CommandError::MissingArgument("bot join")),
            },
            "metrics" => Command::Metrics,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Text front end: one local player plus optional simulated remote players.
pub struct Console {
    relay: MemoryRelay,
    lobby: SessionNegotiator<RelayClient>,
    bots: Vec<RelayClient>,
}

impl Console {
    pub fn new(relay: MemoryRelay, config: LobbyConfig) -> Self {
        let client = relay.connect();
        Self {
            relay,
            lobby: SessionNegotiator::new(client, config),
            bots: Vec::new(),
        }
    }

    pub fn lobby(&self) -> &SessionNegotiator<RelayClient> {
        &self.lobby
    }

    pub async fn execute(&mut self, command: Command) -> (Flow, Vec<String>) {
        let mut out = Vec::new();
        match command {
            Command::Lobby => {
                self.lobby.enter_lobby();
                self.lobby.refresh_sessions().await;
                self.render_sessions(&mut out);
            }
            Command::Create(name) => {
                let result = self.lobby.create(&name).await;
                self.render_attempt(result, &mut out);
            }
            Command::Join(name) => {
                let result = self.lobby.join(&name).await;
                self.render_attempt(result, &mut out);
            }
            Command::Pick(index) => {
                let result = self.lobby.join_listed(index).await;
                self.render_attempt(result, &mut out);
            }
            Command::Yes => {
                let result = self.lobby.accept().await;
                self.render_attempt(result, &mut out);
            }
            Command::No => match self.lobby.decline() {
                Ok(()) => out.push("Cancelled.".to_string()),
                Err(err) => out.push(err.to_string()),
            },
            Command::Dismiss => self.lobby.dismiss(),
            Command::Leave => {
                self.lobby.leave().await;
                out.push("Left. Type 'lobby' to browse sessions.".to_string());
            }
            Command::Start => match self.lobby.start_game() {
                Ok(launch) => {
                    if let Err(err) = self.relay.set_session_open(&launch.session_name, false).await {
                        warn!(%err, "could not close session to new joiners");
                    }
                    out.push(format!("Loading scene '{}'...", launch.scene));
                }
                Err(err) => out.push(err.to_string()),
            },
            Command::List => {
                self.lobby.refresh_sessions().await;
                self.render_sessions(&mut out);
            }
            Command::Roster => self.render_roster(&mut out),
            Command::BotJoin(name) => self.bot_join(name, &mut out).await,
            Command::BotLeave => match self.bots.pop() {
                Some(bot) => {
                    bot.shutdown().await;
                    out.push("Simulated player left.".to_string());
                }
                None => out.push("No simulated players.".to_string()),
            },
            Command::Metrics => match metrics::render() {
                Ok(text) => out.extend(
                    text.lines()
                        .filter(|line| line.starts_with("lobby_"))
                        .map(str::to_owned),
                ),
                Err(err) => out.push(format!("metrics unavailable: {err}")),
            },
            Command::Help => out.extend(HELP.lines().map(str::to_owned)),
            Command::Quit => return (Flow::Quit, out),
        }
        (Flow::Continue, out)
    }

    pub async fn on_event(&mut self, event: SessionEvent) -> Vec<String> {
        let mut out = Vec::new();
        let roster_changed = matches!(
            event,
            SessionEvent::ParticipantJoined { .. } | SessionEvent::ParticipantLeft { .. }
        );
        let was_in_session = self.lobby.active_session().is_some();

        self.lobby.handle_event(event).await;

        if roster_changed && self.lobby.active_session().is_some() {
            self.render_roster(&mut out);
        }
        if was_in_session && self.lobby.active_session().is_none() {
            if let Some(notice) = self.lobby.notice() {
                out.push(notice.to_string());
            }
        }
        out
    }

    /// Catches up after dropped relay events.
    pub async fn resync(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if self.lobby.resync().await {
            if let Some(notice) = self.lobby.notice() {
                out.push(notice.to_string());
            }
        }
        out
    }

    /// Leaves everything; called once on exit.
    pub async fn close(&mut self) {
        for bot in self.bots.drain(..) {
            bot.shutdown().await;
        }
        self.lobby.leave().await;
    }

    async fn bot_join(&mut self, name: String, out: &mut Vec<String>) {
        let bot = self.relay.connect();
        let request = StartRequest {
            session_name: name.clone(),
            role: Role::Client,
            is_open: true,
            is_visible: true,
            max_players: self.lobby.config().max_players,
        };
        match bot.start(request).await {
            Ok(handle) => {
                info!(session = %name, peer = %handle.local_peer, "simulated player joined");
                out.push(format!("Simulated player {} joined '{name}'.", handle.local_peer));
                self.bots.push(bot);
            }
            Err(err) => out.push(format!("Simulated player could not join: {err}")),
        }
    }

    fn render_attempt(&self, result: Result<lobby::ActiveSession, LobbyError>, out: &mut Vec<String>) {
        match result {
            Ok(session) => {
                let verb = match session.role {
                    Role::Host => "Created",
                    Role::Client => "Joined",
                };
                out.push(format!("{verb} session '{}'.", session.session_name));
                self.render_roster(out);
                if session.is_host() {
                    out.push("Type 'start' to start the game.".to_string());
                } else {
                    out.push("Waiting for host...".to_string());
                }
            }
            Err(err) => match self.lobby.state() {
                NegotiatorState::AwaitingConfirmation(confirmation) => {
                    out.push(format!("{} [yes/no]", confirmation.message));
                }
                _ => match self.lobby.notice() {
                    Some(notice) => out.push(format!("{notice} [ok]")),
                    None => out.push(err.to_string()),
                },
            },
        }
    }

    fn render_roster(&self, out: &mut Vec<String>) {
        match self.lobby.active_session() {
            Some(session) => {
                out.push(format!("Players in '{}':", session.session_name));
                out.extend(self.lobby.roster_lines().into_iter().map(|line| format!("  {line}")));
            }
            None => out.push("Not in a session.".to_string()),
        }
    }

    fn render_sessions(&self, out: &mut Vec<String>) {
        let sessions = self.lobby.joinable_sessions();
        if sessions.is_empty() {
            out.push("No open sessions. 'create <name>' to host one.".to_string());
            return;
        }
        for (position, session) in sessions.iter().enumerate() {
            out.push(format!("  {}. {}", position + 1, session.label()));
        }
    }
}
