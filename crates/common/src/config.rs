//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::Backoff;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Poll engine configuration.
    #[serde(default)]
    pub poll: PollConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Deadlines and retry bounds for poll operations.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Deadline for a single inbound call (create, vote, read, delete).
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Deadline for spawning a successor poll after a vote.
    #[serde(default = "default_timeout_secs")]
    pub chain_timeout_secs: u64,
    /// Deadline for the store health check.
    #[serde(default = "default_timeout_secs")]
    pub health_timeout_secs: u64,
    /// Maximum number of attempts for a vote that keeps hitting write conflicts.
    #[serde(default = "default_vote_max_attempts")]
    pub vote_max_attempts: u32,
    /// Pause before the first conflict retry.
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    /// Upper bound on the pause between conflict retries.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl PollConfig {
    /// Deadline for a single inbound call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Deadline for successor creation.
    #[must_use]
    pub const fn chain_timeout(&self) -> Duration {
        Duration::from_secs(self.chain_timeout_secs)
    }

    /// Deadline for the health check.
    #[must_use]
    pub const fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Backoff between vote attempts that hit a write conflict.
    #[must_use]
    pub fn vote_backoff(&self) -> Backoff {
        Backoff {
            max_attempts: self.vote_max_attempts.max(1),
            initial: Duration::from_millis(self.retry_initial_delay_ms),
            max: Duration::from_millis(self.retry_max_delay_ms),
            ..Backoff::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            chain_timeout_secs: default_timeout_secs(),
            health_timeout_secs: default_timeout_secs(),
            vote_max_attempts: default_vote_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    35555
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_vote_max_attempts() -> u32 {
    5
}

const fn default_retry_initial_delay_ms() -> u64 {
    10
}

const fn default_retry_max_delay_ms() -> u64 {
    250
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `POLLCHAIN_ENV`)
    /// 4. Environment variables with `POLLCHAIN__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("POLLCHAIN_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("POLLCHAIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("POLLCHAIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = config::Config::builder()
            .set_override("database.url", "postgres://localhost/polls")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 35555);
        assert_eq!(config.database.max_connections, 100);
        assert_eq!(config.poll.vote_max_attempts, 5);
        assert_eq!(config.poll.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config: Config = config::Config::builder()
            .set_override("database.url", "postgres://localhost/polls")
            .unwrap()
            .set_override("poll.vote_max_attempts", 3)
            .unwrap()
            .set_override("poll.chain_timeout_secs", 30)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.poll.vote_max_attempts, 3);
        assert_eq!(config.poll.chain_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll.health_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_vote_backoff_follows_config() {
        let poll = PollConfig {
            vote_max_attempts: 0,
            retry_initial_delay_ms: 20,
            ..PollConfig::default()
        };
        let backoff = poll.vote_backoff();

        assert_eq!(backoff.max_attempts, 1);
        assert_eq!(backoff.budget_for_attempt(0), Duration::from_millis(20));
        assert_eq!(backoff.max, Duration::from_millis(250));
    }
}
