//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::game::GameMode;
use crate::util::rate_limit::DEFAULT_INPUT_RATE_LIMIT;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,

    /// Game mode for the lifetime of the process
    pub game_mode: GameMode,
    /// Seed for spawn positions; random when unset
    pub arena_seed: Option<u64>,

    /// Allowed client origins for CORS; any origin when empty
    pub client_origins: Vec<String>,
    /// Max messages per second accepted from one connection
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:1337".to_string()),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::Invalid("LOG_FORMAT", other.to_string())),
        };

        let game_mode = match lookup("GAME_MODE") {
            Some(mode) => mode
                .parse::<GameMode>()
                .map_err(|_| ConfigError::Invalid("GAME_MODE", mode.clone()))?,
            None => GameMode::default(),
        };

        let arena_seed = lookup("ARENA_SEED")
            .map(|seed| {
                seed.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Invalid("ARENA_SEED", seed.clone()))
            })
            .transpose()?;

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let input_rate_limit = match lookup("INPUT_RATE_LIMIT") {
            Some(limit) => limit
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|l| *l > 0)
                .ok_or_else(|| ConfigError::Invalid("INPUT_RATE_LIMIT", limit.clone()))?,
            None => DEFAULT_INPUT_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            game_mode,
            arena_seed,
            client_origins,
            input_rate_limit,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 1337);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.game_mode, GameMode::Deathmatch);
        assert_eq!(config.arena_seed, None);
        assert!(config.client_origins.is_empty());
        assert_eq!(config.input_rate_limit, DEFAULT_INPUT_RATE_LIMIT);
    }

    #[test]
    fn test_port_overrides_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn test_ball_mode_and_seed() {
        let config = load(&[
            ("GAME_MODE", "ball"),
            ("ARENA_SEED", "42"),
            ("CLIENT_ORIGIN", "http://a.test, http://b.test,"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.game_mode, GameMode::Ball);
        assert_eq!(config.arena_seed, Some(42));
        assert_eq!(config.client_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(load(&[("GAME_MODE", "golf")]), Err(ConfigError::Invalid("GAME_MODE", _))));
        assert!(matches!(load(&[("ARENA_SEED", "-1")]), Err(ConfigError::Invalid("ARENA_SEED", _))));
        assert!(matches!(load(&[("INPUT_RATE_LIMIT", "0")]), Err(ConfigError::Invalid(..))));
        assert!(matches!(load(&[("SERVER_ADDR", "nowhere")]), Err(ConfigError::InvalidAddress)));
    }
}
