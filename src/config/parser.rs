use std::collections::{HashMap, HashSet};
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;

use super::ConfigError;

/// Static bot configuration, loaded once at startup from a JSON file.
/// There is no hot reload; restart the process to pick up changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Command prefix. The `--prefix` CLI flag wins over this.
    pub prefix: Option<String>,
    /// Guild id -> channels where self-assignment commands are allowed.
    /// A missing guild or an empty list allows every channel.
    pub support_channels: HashMap<String, Vec<String>>,
    /// Channels that get dog reactions on every message.
    pub dogs_channels: HashSet<String>,
    /// Channels whose topics carry a daily date stamp.
    pub daily_channels: Vec<String>,
    pub member_sync: Option<MemberSyncConfig>,
    pub ranking_sync: Option<RankingSyncConfig>,
}

/// Settings for the member-directory sync (site opt-in role plus per-game
/// opt-in roles).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemberSyncConfig {
    pub endpoint: String,
    pub guild_id: u64,
    /// Role given to every member present in the site directory.
    pub role_id: u64,
    /// Game name -> opt-in role id.
    #[serde(default)]
    pub games: HashMap<String, u64>,
}

/// Settings for the tier-role sync against the per-game ranking endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RankingSyncConfig {
    pub endpoint: String,
    pub guild_id: u64,
}

impl Config {
    /// Loads the config file at `path`. A missing file is not an error:
    /// the bot then runs with commands only and no sync jobs.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref member_sync) = self.member_sync {
            if member_sync.endpoint.is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "member-sync.endpoint cannot be empty".to_string(),
                ));
            }
            if member_sync.guild_id == 0 || member_sync.role_id == 0 {
                return Err(ConfigError::InvalidConfig(
                    "member-sync guild-id and role-id must be set".to_string(),
                ));
            }
        }

        if let Some(ref ranking_sync) = self.ranking_sync {
            if ranking_sync.endpoint.is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "ranking-sync.endpoint cannot be empty".to_string(),
                ));
            }
            if ranking_sync.guild_id == 0 {
                return Err(ConfigError::InvalidConfig(
                    "ranking-sync.guild-id must be set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Process secrets. Read at startup; the process exits non-zero when one
/// is absent.
pub struct Secrets {
    pub bot_token: SecretString,
    pub ranking_key: SecretString,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: require_env("ROLEKEEPER_BOT_TOKEN")?,
            ranking_key: require_env("ROLEKEEPER_RANKING_KEY")?,
        })
    }
}

fn require_env(name: &'static str) -> Result<SecretString, ConfigError> {
    std::env::var(name)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnv(name))
}
