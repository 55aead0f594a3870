//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `netalloc.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use netalloc_app::scheduler::DailySchedule;
use netalloc_domain::provider::CapacityPolicy;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Daily sweep schedule.
    pub sweeps: SweepsConfig,
    /// Vehicle-to-point ratio.
    pub capacity: CapacityConfig,
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

/// Times of day (UTC, `HH:MM`) at which each sweep runs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweepsConfig {
    /// Run the scheduled jobs at all.
    pub enabled: bool,
    /// Registration expiry followed by point expiry.
    pub expiration_at: String,
    /// Provider state batch sweep.
    pub provider_sweep_at: String,
    /// Vehicle assignment expiry.
    pub vehicle_expiry_at: String,
}

/// Capacity rule settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Required vehicles per point, in percent (130 means 1.3).
    pub ratio_percent: u32,
}

/// Parsed schedules for the daily jobs.
#[derive(Debug, Clone, Copy)]
pub struct Schedules {
    pub expiration: DailySchedule,
    pub provider_sweep: DailySchedule,
    pub vehicle_expiry: DailySchedule,
}

impl Config {
    /// Load configuration from `netalloc.toml` (if present), apply
    /// environment-variable overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("netalloc.toml")?;
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
        if let Ok(val) = std::env::var("NETALLOC_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("NETALLOC_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("NETALLOC_SWEEPS_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.sweeps.enabled = enabled;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database url must not be empty".to_string(),
            ));
        }
        if self.capacity.ratio_percent == 0 {
            return Err(ConfigError::Validation(
                "capacity ratio must be non-zero".to_string(),
            ));
        }
        self.schedules()?;
        Ok(())
    }

    /// Parse the sweep times.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first time that is not `HH:MM`.
    pub fn schedules(&self) -> Result<Schedules, ConfigError> {
        let parse = |field: &str, value: &str| {
            DailySchedule::parse(value).map_err(|_| {
                ConfigError::Validation(format!("sweeps.{field} must be HH:MM, got {value:?}"))
            })
        };
        Ok(Schedules {
            expiration: parse("expiration_at", &self.sweeps.expiration_at)?,
            provider_sweep: parse("provider_sweep_at", &self.sweeps.provider_sweep_at)?,
            vehicle_expiry: parse("vehicle_expiry_at", &self.sweeps.vehicle_expiry_at)?,
        })
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// The configured capacity rule.
    #[must_use]
    pub fn capacity_policy(&self) -> CapacityPolicy {
        CapacityPolicy {
            ratio_percent: self.capacity.ratio_percent,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:netalloc.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "netallocd=info,netalloc_app=info,netalloc_adapter_storage_sqlite_sqlx=warn"
                .to_string(),
        }
    }
}

impl Default for SweepsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration_at: "02:05".to_string(),
            provider_sweep_at: "02:10".to_string(),
            vehicle_expiry_at: "01:00".to_string(),
        }
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            ratio_percent: CapacityPolicy::default().ratio_percent,
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
