use std::path::PathBuf;

use clap::Parser;

use common_net::telemetry::{self, TelemetryOptions};
use lobby::{config::parse_name_list, LobbyConfig, LobbySettings};
use lobby_cli::BoxError;

#[derive(Debug, Parser)]
#[command(author, version, about = "Console lobby over an in-process session relay")]
struct LobbyCli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Comma separated display names handed out in order.
    #[arg(long, value_name = "NAMES")]
    names: Option<String>,

    #[arg(long, value_name = "N")]
    max_players: Option<u32>,

    #[arg(long, value_name = "SCENE")]
    game_scene: Option<String>,

    #[arg(long, value_name = "FILTER", default_value = telemetry::DEFAULT_FILTER)]
    log_filter: String,

    /// Print the effective settings as JSON and exit.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    print_config: bool,
}

impl LobbyCli {
    fn resolve_config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        std::env::var("LOBBY_CONFIG_PATH").ok().map(PathBuf::from)
    }

    fn apply_overrides(&self, settings: &mut LobbySettings) {
        if let Some(names) = &self.names {
            settings.name_pool = parse_name_list(names);
        }
        if let Some(max_players) = self.max_players {
            settings.max_players = max_players;
        }
        if let Some(scene) = &self.game_scene {
            settings.game_scene = scene.clone();
        }
    }
}

fn build_settings(cli: &LobbyCli) -> Result<LobbySettings, BoxError> {
    let mut settings = if let Some(path) = cli.resolve_config_path() {
        LobbySettings::from_file(&path)?
    } else {
        LobbySettings::from_env()?
    };

    cli.apply_overrides(&mut settings);

    Ok(settings)
}

fn build_config(cli: &LobbyCli) -> Result<Option<LobbyConfig>, BoxError> {
    let settings = build_settings(cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(None);
    }
    settings.into_config().map(Some)
}

#[tokio::main]
async fn main() {
    let cli = LobbyCli::parse();

    telemetry::init_with(
        "lobby-cli",
        TelemetryOptions {
            default_filter: cli.log_filter.clone(),
            ..TelemetryOptions::default()
        },
    );

    let config = match build_config(&cli) {
        Ok(Some(config)) => config,
        Ok(None) => return,
        Err(err) => {
            tracing::error!(%err, "lobby-cli: invalid configuration");
            return;
        }
    };

    if let Err(err) = lobby_cli::run_with_ctrl_c(config).await {
        tracing::error!(%err, "lobby-cli exited with an error");
    }
}
