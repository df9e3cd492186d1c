//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS (comma-separated)
    pub client_origin: String,

    /// Supabase connection; `None` runs against the in-process directory
    pub supabase: Option<SupabaseConfig>,

    /// Per-match tuning
    pub game: MatchConfig,
}

/// Supabase REST credentials for the match directory
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Timing and rules shared by every match loop
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Points needed to win
    pub win_score: u32,
    /// How long both sides may take to signal readiness
    pub ready_timeout: Duration,
    /// Readiness poll period
    pub ready_poll: Duration,
    /// First countdown value (counts down to 1, one per second)
    pub countdown_from: u32,
    /// Pause between a point and the respawn
    pub scoring_pause: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            win_score: 3,
            ready_timeout: Duration::from_secs(30),
            ready_poll: Duration::from_millis(100),
            countdown_from: 3,
            scoring_pause: Duration::from_millis(1_500),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            _ => None,
        };

        let defaults = MatchConfig::default();
        let game = MatchConfig {
            win_score: parse_var("WIN_SCORE")?.unwrap_or(defaults.win_score),
            ready_timeout: parse_var("READY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.ready_timeout),
            ..defaults
        };
        if game.win_score == 0 {
            return Err(ConfigError::Invalid("WIN_SCORE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),

            supabase,
            game,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
