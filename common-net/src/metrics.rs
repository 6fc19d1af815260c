use once_cell::sync::OnceCell;
use prometheus::{register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder};

use crate::BoxError;

/// Metric set for the lobby front end.
pub struct LobbyMetrics {
    pub sessions_created_total: IntCounter,
    pub sessions_joined_total: IntCounter,
    pub attempts_failed_total: IntCounter,
    pub names_synthesized_total: IntCounter,
    pub roster_size: IntGauge,
}

impl LobbyMetrics {
    pub fn on_startup(&self) {
        self.sessions_created_total.inc_by(0);
        self.sessions_joined_total.inc_by(0);
        self.attempts_failed_total.inc_by(0);
        self.names_synthesized_total.inc_by(0);
        self.roster_size.set(0);
    }

    pub fn inc_sessions_created(&self) {
        self.sessions_created_total.inc();
    }

    pub fn inc_sessions_joined(&self) {
        self.sessions_joined_total.inc();
    }

    pub fn inc_attempts_failed(&self) {
        self.attempts_failed_total.inc();
    }

    pub fn inc_names_synthesized(&self) {
        self.names_synthesized_total.inc();
    }

    pub fn set_roster_size(&self, size: i64) {
        self.roster_size.set(size);
    }
}

static LOBBY_METRICS: OnceCell<LobbyMetrics> = OnceCell::new();

pub fn lobby_metrics() -> &'static LobbyMetrics {
    LOBBY_METRICS.get_or_init(|| LobbyMetrics {
        sessions_created_total: register_int_counter!(
            "lobby_sessions_created_total",
            "Sessions successfully created as host"
        )
        .expect("register lobby_sessions_created_total"),
        sessions_joined_total: register_int_counter!(
            "lobby_sessions_joined_total",
            "Sessions successfully joined as client"
        )
        .expect("register lobby_sessions_joined_total"),
        attempts_failed_total: register_int_counter!(
            "lobby_attempts_failed_total",
            "Create or join attempts rejected by the session service"
        )
        .expect("register lobby_attempts_failed_total"),
        names_synthesized_total: register_int_counter!(
            "lobby_names_synthesized_total",
            "Display names synthesized because the name pool was exhausted"
        )
        .expect("register lobby_names_synthesized_total"),
        roster_size: register_int_gauge!("lobby_roster_size", "Participants in the current roster")
            .expect("register lobby_roster_size"),
    })
}

/// Encodes every registered metric in the Prometheus text format.
pub fn render() -> Result<String, BoxError> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|err| Box::new(err) as BoxError)?;

    String::from_utf8(buffer).map_err(|err| Box::new(err) as BoxError)
}
