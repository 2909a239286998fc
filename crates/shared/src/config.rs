//! Application configuration management.

use std::fmt;
use std::time::Duration;

use config::{ConfigError, Map, Source, Value, ValueKind};
use serde::Deserialize;

/// Flat variable names used by existing deployments, mapped to config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("DB_CHARSET", "database.charset"),
    ("DB_POOL_SIZE", "database.pool_size"),
    ("MAX_WORKERS", "reports.max_workers"),
];

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Report execution configuration.
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Database port.
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Database user.
    #[serde(default = "default_db_user")]
    pub user: String,
    /// Database password.
    #[serde(default)]
    pub password: String,
    /// Database (schema) name.
    #[serde(default = "default_db_name")]
    pub name: String,
    /// Connection character set.
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Fixed number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Maximum wait for a free connection, in seconds.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Maximum time for establishing one connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Connection attempts before the pool gives up (initial + retries).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            name: default_db_name(),
            charset: default_charset(),
            pool_size: default_pool_size(),
            acquire_timeout_secs: default_acquire_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("charset", &self.charset)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("connect_attempts", &self.connect_attempts)
            .finish()
    }
}

impl DatabaseConfig {
    /// Maximum wait for a free pooled connection.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Maximum time for establishing a single connection.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_user() -> String {
    "root".to_string()
}

fn default_db_name() -> String {
    "jx_data_info".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_pool_size() -> usize {
    20
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_connect_attempts() -> u32 {
    2
}

/// Report execution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    /// Maximum number of reports generated concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Maximum wait for an admission ticket, in seconds (0 waits indefinitely).
    #[serde(default = "default_admission_timeout")]
    pub admission_timeout_secs: u64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            admission_timeout_secs: default_admission_timeout(),
        }
    }
}

impl ReportsConfig {
    /// Admission wait bound, `None` when callers wait indefinitely.
    #[must_use]
    pub const fn admission_timeout(&self) -> Option<Duration> {
        if self.admission_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.admission_timeout_secs))
        }
    }
}

fn default_max_workers() -> usize {
    5
}

fn default_admission_timeout() -> u64 {
    120
}

/// Reads the flat `DB_*` / `MAX_WORKERS` variables as a configuration source.
#[derive(Debug, Clone)]
struct LegacyEnvironment;

impl Source for LegacyEnvironment {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let origin = "legacy environment".to_string();
        let mut values = Map::new();
        for (var, key) in LEGACY_ENV_KEYS {
            if let Ok(raw) = std::env::var(var) {
                values.insert(
                    (*key).to_string(),
                    Value::new(Some(&origin), ValueKind::String(raw)),
                );
            }
        }
        Ok(values)
    }
}

impl AppConfig {
    /// Loads configuration from config files and the environment.
    ///
    /// Precedence, lowest first: defaults, `config/default`,
    /// `config/{RUN_MODE}`, legacy flat variables, `JXREPORT__*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(LegacyEnvironment)
            .add_source(config::Environment::with_prefix("JXREPORT").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the execution core relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_size == 0 {
            return Err(ConfigError::Message(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.database.connect_attempts == 0 {
            return Err(ConfigError::Message(
                "database.connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.reports.max_workers == 0 {
            return Err(ConfigError::Message(
                "reports.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether more reports may run than there are pooled connections.
    #[must_use]
    pub const fn workers_exceed_pool(&self) -> bool {
        self.reports.max_workers > self.database.pool_size
    }
}
