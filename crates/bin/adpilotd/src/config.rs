//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `adpilot.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use adpilot_app::rule_engine::EngineSettings;
use adpilot_app::services::action_executor::ExecutorSettings;
use adpilot_domain::currency::CurrencyPolicy;
use adpilot_domain::time::parse_timezone;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Rule-evaluation settings.
    pub engine: EngineConfig,
    /// Periodic rule cycles.
    pub scheduler: TaskConfig,
    /// Periodic pending-revert consumer.
    pub sweeper: SweeperConfig,
    /// External ad platform endpoint.
    pub platform: PlatformConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Currency exempt from minor-unit scaling.
    pub local_currency: String,
    /// IANA name of the reporting timezone.
    pub timezone: String,
    pub lock_ttl_secs: u64,
    pub call_timeout_secs: u64,
    pub min_budget_local: f64,
    pub min_budget_foreign: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Due reverts applied per tick.
    pub batch_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub base_url: String,
    pub api_version: String,
}

impl Config {
    /// Load configuration from `adpilot.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("adpilot.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ADPILOT_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("ADPILOT_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("ADPILOT_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("ADPILOT_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("ADPILOT_TIMEZONE") {
            self.engine.timezone = val;
        }
        if let Ok(val) = std::env::var("ADPILOT_PLATFORM_URL") {
            self.platform.base_url = val;
        }
        if let Ok(val) = std::env::var("ADPILOT_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler interval must be non-zero".to_string(),
            ));
        }
        if self.sweeper.interval_secs == 0 || self.sweeper.batch_size == 0 {
            return Err(ConfigError::Validation(
                "sweeper interval and batch size must be non-zero".to_string(),
            ));
        }
        if self.engine.call_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "call timeout must be non-zero".to_string(),
            ));
        }
        self.timezone()?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// The parsed reporting timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown IANA name.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.engine.timezone).map_err(|err| ConfigError::Validation(err.to_string()))
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.call_timeout_secs)
    }

    /// Engine knobs derived from the `[engine]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown timezone or a lock
    /// TTL too large to represent.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let lock_ttl = i64::try_from(self.engine.lock_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ConfigError::Validation("lock ttl is out of range".to_string()))?;

        Ok(EngineSettings {
            timezone: self.timezone()?,
            lock_ttl,
            executor: ExecutorSettings {
                policy: CurrencyPolicy::new(self.engine.local_currency.clone()),
                call_timeout: self.call_timeout(),
                min_budget_local: self.engine.min_budget_local,
                min_budget_foreign: self.engine.min_budget_foreign,
            },
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:adpilot.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "adpilotd=info,adpilot=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_currency: "VND".to_string(),
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            lock_ttl_secs: 300,
            call_timeout_secs: 20,
            min_budget_local: 20_000.0,
            min_budget_foreign: 1.0,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 900,
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            batch_size: 50,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v19.0".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
