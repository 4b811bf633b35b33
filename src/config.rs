//! Application-level configuration loading, including party admission and room tuning knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_QUEUE_BACK_CONFIG_PATH";

const DEFAULT_SPECTATOR_NAME: &str = "Spectator";
const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_CODE_ATTEMPTS: usize = 16;
const DEFAULT_ROOM_CAPACITY: usize = 64;
const DEFAULT_IDENT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    spectator_name: String,
    code_length: usize,
    code_attempts: usize,
    room_capacity: usize,
    ident_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        code_length = app_config.code_length,
                        room_capacity = app_config.room_capacity,
                        "loaded party configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Placeholder display name forced on participants admitted as spectators.
    pub fn spectator_name(&self) -> &str {
        &self.spectator_name
    }

    /// Number of characters in a generated party code.
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// How many candidate codes are tried before party creation gives up.
    pub fn code_attempts(&self) -> usize {
        self.code_attempts
    }

    /// Capacity of each room broadcast channel.
    pub fn room_capacity(&self) -> usize {
        self.room_capacity
    }

    /// Time a WebSocket client gets to send its `join_room` frame.
    pub fn ident_timeout(&self) -> Duration {
        self.ident_timeout
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spectator_name: DEFAULT_SPECTATOR_NAME.to_string(),
            code_length: DEFAULT_CODE_LENGTH,
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            room_capacity: DEFAULT_ROOM_CAPACITY,
            ident_timeout: Duration::from_millis(DEFAULT_IDENT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    spectator_name: Option<String>,
    code_length: Option<usize>,
    code_attempts: Option<usize>,
    room_capacity: Option<usize>,
    ident_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let spectator_name = value
            .spectator_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SPECTATOR_NAME.to_string());

        Self {
            spectator_name,
            code_length: value.code_length.unwrap_or(DEFAULT_CODE_LENGTH).max(4),
            code_attempts: value.code_attempts.unwrap_or(DEFAULT_CODE_ATTEMPTS).max(1),
            room_capacity: value.room_capacity.unwrap_or(DEFAULT_ROOM_CAPACITY).max(1),
            ident_timeout: Duration::from_millis(
                value.ident_timeout_ms.unwrap_or(DEFAULT_IDENT_TIMEOUT_MS),
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
