use std::{collections::HashSet, env, fs, path::Path};

use common_net::BoxError;
use serde::{Deserialize, Serialize};

use crate::names::default_name_pool;

const DEFAULT_MAX_PLAYERS: u32 = 6;
const DEFAULT_GAME_SCENE: &str = "GameScene";

/// Raw, serializable lobby settings as read from env or a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbySettings {
    pub name_pool: Vec<String>,
    pub max_players: u32,
    pub game_scene: String,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            name_pool: default_name_pool(),
            max_players: DEFAULT_MAX_PLAYERS,
            game_scene: DEFAULT_GAME_SCENE.to_string(),
        }
    }
}

impl LobbySettings {
    pub fn from_env() -> Result<Self, BoxError> {
        let defaults = Self::default();

        let name_pool = match env::var("LOBBY_NAME_POOL") {
            Ok(raw) => parse_name_list(&raw),
            Err(_) => defaults.name_pool,
        };
        let max_players = match env::var("LOBBY_MAX_PLAYERS") {
            Ok(raw) => raw.trim().parse().map_err(|err| Box::new(err) as BoxError)?,
            Err(_) => defaults.max_players,
        };
        let game_scene = env::var("LOBBY_GAME_SCENE").unwrap_or(defaults.game_scene);

        Ok(Self {
            name_pool,
            max_players,
            game_scene,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, BoxError> {
        let raw = fs::read_to_string(path).map_err(|err| Box::new(err) as BoxError)?;
        let settings = serde_json::from_str(&raw).map_err(|err| Box::new(err) as BoxError)?;
        Ok(settings)
    }

    pub fn into_config(self) -> Result<LobbyConfig, BoxError> {
        LobbyConfig::from_settings(self)
    }
}

/// Comma separated list, blanks dropped.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Validated lobby configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyConfig {
    pub name_pool: Vec<String>,
    pub max_players: u32,
    pub game_scene: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            name_pool: default_name_pool(),
            max_players: DEFAULT_MAX_PLAYERS,
            game_scene: DEFAULT_GAME_SCENE.to_string(),
        }
    }
}

impl LobbyConfig {
    pub fn from_settings(settings: LobbySettings) -> Result<Self, BoxError> {
        if settings.max_players == 0 {
            return Err("max_players must be at least 1".into());
        }

        let mut seen = HashSet::new();
        let mut name_pool = Vec::with_capacity(settings.name_pool.len());
        for name in settings.name_pool {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err("name pool entries cannot be blank".into());
            }
            if !seen.insert(name.clone()) {
                return Err(format!("duplicate name pool entry '{name}'").into());
            }
            name_pool.push(name);
        }

        let game_scene = settings.game_scene.trim().to_string();
        if game_scene.is_empty() {
            return Err("game_scene cannot be blank".into());
        }

        Ok(Self {
            name_pool,
            max_players: settings.max_players,
            game_scene,
        })
    }

    pub fn from_env() -> Result<Self, BoxError> {
        LobbySettings::from_env()?.into_config()
    }
}
