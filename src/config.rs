//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detector::DetectorSettings;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Polling and detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Time between ticks in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Seconds without input after which the user counts as idle.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u64,
    /// How often the input listener queries the display, in milliseconds.
    #[serde(default = "default_activity_check_interval_ms")]
    pub activity_check_interval_ms: u64,
    /// Treat a window switch as user input.
    #[serde(default)]
    pub window_change_counts_as_activity: bool,
    /// Operator name recorded with every event (defaults to the login user).
    #[serde(default)]
    pub user: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            idle_threshold_seconds: default_idle_threshold(),
            activity_check_interval_ms: default_activity_check_interval_ms(),
            window_change_counts_as_activity: false,
            user: None,
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn activity_check_interval(&self) -> Duration {
        Duration::from_millis(self.activity_check_interval_ms)
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        let threshold = i64::try_from(self.idle_threshold_seconds).unwrap_or(i64::MAX);
        DetectorSettings {
            idle_threshold: TimeDelta::try_seconds(threshold).unwrap_or_else(TimeDelta::max_value),
            window_change_counts_as_activity: self.window_change_counts_as_activity,
        }
    }

    /// Configured user, else the login name from the environment.
    pub fn user(&self) -> String {
        self.user
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Sink destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the database and CSV log.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// SQLite database file, relative to `data_dir` unless absolute.
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,
    /// CSV log file, relative to `data_dir` unless absolute.
    #[serde(default = "default_csv_file")]
    pub csv_file: PathBuf,
    /// Destination table in the database.
    #[serde(default = "default_table")]
    pub table: String,
    /// Upper bound on a single sink write in milliseconds.
    #[serde(default = "default_sink_timeout_ms")]
    pub sink_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            csv_file: default_csv_file(),
            table: default_table(),
            sink_timeout_ms: default_sink_timeout_ms(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join(&self.csv_file)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_idle_threshold() -> u64 {
    10
}

fn default_activity_check_interval_ms() -> u64 {
    500
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".timetracker"))
        .unwrap_or_else(|| PathBuf::from(".timetracker"))
}

fn default_database_file() -> PathBuf {
    PathBuf::from("timetracker.db")
}

fn default_csv_file() -> PathBuf {
    PathBuf::from("timetracker_log.csv")
}

fn default_table() -> String {
    crate::sink::DEFAULT_TABLE.to_string()
}

fn default_sink_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("timetracker/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_env_overrides();

        config.storage.data_dir = expand_tilde(&config.storage.data_dir);

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TIMETRACKER_POLL_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.tracker.poll_interval_ms = v;
            }
        }
        if let Ok(val) = std::env::var("TIMETRACKER_IDLE_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.tracker.idle_threshold_seconds = v;
            }
        }
        if let Ok(val) = std::env::var("TIMETRACKER_USER") {
            self.tracker.user = Some(val);
        }
        if let Ok(val) = std::env::var("TIMETRACKER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TIMETRACKER_DATABASE_FILE") {
            self.storage.database_file = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TIMETRACKER_CSV_FILE") {
            self.storage.csv_file = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TIMETRACKER_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.tracker.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be greater than 0");
        }
        if self.tracker.idle_threshold_seconds == 0 {
            anyhow::bail!("Idle threshold must be greater than 0");
        }
        if self.tracker.activity_check_interval_ms == 0 {
            anyhow::bail!("Activity check interval must be greater than 0");
        }
        if self.storage.sink_timeout_ms == 0 {
            anyhow::bail!("Sink timeout must be greater than 0");
        }
        if self.storage.database_file.as_os_str().is_empty() {
            anyhow::bail!("Database file cannot be empty");
        }
        if self.storage.csv_file.as_os_str().is_empty() {
            anyhow::bail!("CSV file cannot be empty");
        }
        if !is_identifier(&self.storage.table) {
            anyhow::bail!(
                "Table name {:?} must be letters, digits and underscores, not starting with a digit",
                self.storage.table
            );
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tracker.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.tracker.idle_threshold_seconds, 10);
        assert!(!config.tracker.window_change_counts_as_activity);
        assert_eq!(config.storage.table, "cg_timetracker");
        assert_eq!(config.storage.sink_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [tracker]
            idle_threshold_seconds = 30
            window_change_counts_as_activity = true
            user = "alice"

            [storage]
            data_dir = "/var/lib/timetracker"
            csv_file = "/tmp/log.csv"
            table = "intervals"

            [logging]
            json = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tracker.poll_interval_ms, 1000);
        assert_eq!(config.tracker.user(), "alice");
        assert_eq!(
            config.tracker.detector_settings().idle_threshold,
            TimeDelta::seconds(30)
        );
        assert!(config.tracker.detector_settings().window_change_counts_as_activity);
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from("/var/lib/timetracker/timetracker.db")
        );
        assert_eq!(config.storage.csv_path(), PathBuf::from("/tmp/log.csv"));
        assert_eq!(config.storage.table, "intervals");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.tracker.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tracker.idle_threshold_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.table = "events; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.table = "1events".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.csv_file = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("cg_timetracker"));
        assert!(is_identifier("_events2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("two words"));
        assert!(!is_identifier("9lives"));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/.timetracker")), home.join(".timetracker"));
        }
        assert_eq!(expand_tilde(Path::new("/srv/data")), PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tracker]\npoll_interval_ms = 250\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.tracker.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.storage.table, "cg_timetracker");
    }
}
