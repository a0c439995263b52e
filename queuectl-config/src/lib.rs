//! Application configuration: which database to open, how to log, and how
//! workers pace themselves.
//!
//! Values come from defaults, then an optional config file, then `QUEUECTL_*`
//! environment variables. The queue's own scheduling settings (`max_retries`,
//! `backoff_base`, `worker_timeout`) are not here; they live in the job store.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the home directory holding the default database.
pub const DATA_DIR_NAME: &str = ".queuectl";
pub const DEFAULT_DB_FILE: &str = "jobs.db";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub worker: Option<WorkerSection>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub busy_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerSection {
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub reaper_interval_secs: Option<u64>,
    #[serde(default)]
    pub claim_window: Option<u32>,
    #[serde(default)]
    pub store_retry_budget: Option<u32>,
    #[serde(default)]
    pub heartbeat_stale_secs: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try each enabled format in turn.
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    if s.trim().is_empty() {
        return Ok(RawConfigFile::default());
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub reaper_interval_secs: u64,
    /// Eligible jobs a claim considers before reporting the queue as empty.
    pub claim_window: u32,
    pub store_retry_budget: u32,
    pub heartbeat_stale_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: default_database_path(),
                max_connections: 10,
                busy_timeout_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            worker: WorkerConfig {
                poll_interval_ms: 1000,
                reaper_interval_secs: 5,
                claim_window: 8,
                store_retry_budget: 5,
                heartbeat_stale_secs: 60,
            },
        }
    }
}

/// `~/.queuectl`, or `./.queuectl` when no home directory can be found.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

pub fn default_database_path() -> PathBuf {
    default_data_dir().join(DEFAULT_DB_FILE)
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(()),
    }
}

macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

impl Config {
    /// Overlay the values present in a parsed file.
    pub fn apply_raw(&mut self, raw: RawConfigFile) {
        if let Some(db) = raw.database {
            apply_opt!(self.database.path, db.path);
            apply_opt!(self.database.max_connections, db.max_connections);
            apply_opt!(self.database.busy_timeout_secs, db.busy_timeout_secs);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(self.logging.level, logging.level);
            apply_opt!(self.logging.json, logging.json);
        }
        if let Some(w) = raw.worker {
            apply_opt!(self.worker.poll_interval_ms, w.poll_interval_ms);
            apply_opt!(self.worker.reaper_interval_secs, w.reaper_interval_secs);
            apply_opt!(self.worker.claim_window, w.claim_window);
            apply_opt!(self.worker.store_retry_budget, w.store_retry_budget);
            apply_opt!(self.worker.heartbeat_stale_secs, w.heartbeat_stale_secs);
        }
    }
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();
    if let Some(p) = path {
        cfg.apply_raw(load_raw_from_file(p)?);
    }
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Database
    if let Some(v) = env_str("QUEUECTL_DATABASE_PATH") {
        cfg.database.path = PathBuf::from(v);
    }
    if let Some(v) = env_parse::<u32>("QUEUECTL_DB_MAX_CONNECTIONS")? {
        cfg.database.max_connections = v;
    }
    if let Some(v) = env_parse::<u64>("QUEUECTL_DB_BUSY_TIMEOUT_SECS")? {
        cfg.database.busy_timeout_secs = v;
    }

    // Logging
    if let Some(v) = env_str("QUEUECTL_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("QUEUECTL_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Workers
    if let Some(v) = env_parse::<u64>("QUEUECTL_WORKER_POLL_INTERVAL_MS")? {
        cfg.worker.poll_interval_ms = v;
    }
    if let Some(v) = env_parse::<u64>("QUEUECTL_REAPER_INTERVAL_SECS")? {
        cfg.worker.reaper_interval_secs = v;
    }
    if let Some(v) = env_parse::<u32>("QUEUECTL_CLAIM_WINDOW")? {
        cfg.worker.claim_window = v;
    }
    if let Some(v) = env_parse::<u32>("QUEUECTL_STORE_RETRY_BUDGET")? {
        cfg.worker.store_retry_budget = v;
    }
    if let Some(v) = env_parse::<u64>("QUEUECTL_WORKER_HEARTBEAT_STALE_SECS")? {
        cfg.worker.heartbeat_stale_secs = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.database.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database.path must not be empty".into(),
        ));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }

    let positive = [
        ("worker.poll_interval_ms", cfg.worker.poll_interval_ms),
        ("worker.reaper_interval_secs", cfg.worker.reaper_interval_secs),
        ("worker.claim_window", u64::from(cfg.worker.claim_window)),
        ("worker.store_retry_budget", u64::from(cfg.worker.store_retry_budget)),
        ("worker.heartbeat_stale_secs", cfg.worker.heartbeat_stale_secs),
    ];
    if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
        return Err(ConfigError::Validation(format!("{name} must be > 0")));
    }

    match cfg.logging.level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
        // Anything else is handed to the env-filter parser as a directive string.
        other if other.contains('=') => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported logging.level: {}",
                other
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_tmp(suffix: &str, body: &str) -> NamedTempFile {
        let f = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("tmpfile");
        std::fs::write(f.path(), body).unwrap();
        f
    }

    #[test]
    fn parse_toml() {
        let f = write_tmp(
            ".toml",
            r#"
[database]
path = "/var/lib/queuectl/jobs.db"
busy_timeout_secs = 10

[worker]
claim_window = 4
"#,
        );
        let raw = load_raw_from_file(f.path()).expect("load");
        let mut cfg = Config::default();
        cfg.apply_raw(raw);
        assert_eq!(cfg.database.path, PathBuf::from("/var/lib/queuectl/jobs.db"));
        assert_eq!(cfg.database.busy_timeout_secs, 10);
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.worker.claim_window, 4);
    }

    #[test]
    fn parse_yaml() {
        let f = write_tmp(
            ".yaml",
            r#"
logging:
  level: debug
  json: true
worker:
  poll_interval_ms: 250
"#,
        );
        let mut cfg = Config::default();
        cfg.apply_raw(load_raw_from_file(f.path()).expect("load"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert_eq!(cfg.worker.poll_interval_ms, 250);
    }

    #[test]
    fn parse_json_without_extension() {
        let f = write_tmp("", r#"{"worker": {"store_retry_budget": 9}}"#);
        let mut cfg = Config::default();
        cfg.apply_raw(load_raw_from_file(f.path()).expect("load"));
        assert_eq!(cfg.worker.store_retry_budget, 9);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let f = write_tmp(".toml", "[server]\nport = 1\n");
        assert!(matches!(
            load_raw_from_file(f.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn default_database_lives_in_data_dir() {
        let cfg = Config::default();
        assert!(cfg.database.path.ends_with(".queuectl/jobs.db"));
        validate_config(&cfg).expect("defaults are valid");
    }

    #[test]
    fn env_overrides() {
        let keys = [
            "QUEUECTL_DATABASE_PATH",
            "QUEUECTL_LOG_LEVEL",
            "QUEUECTL_LOG_JSON",
            "QUEUECTL_CLAIM_WINDOW",
        ];
        for k in &keys {
            std::env::remove_var(k);
        }

        std::env::set_var("QUEUECTL_DATABASE_PATH", "/tmp/q.db");
        std::env::set_var("QUEUECTL_LOG_LEVEL", "warn");
        std::env::set_var("QUEUECTL_LOG_JSON", "yes");
        std::env::set_var("QUEUECTL_CLAIM_WINDOW", "3");

        let f = write_tmp(".toml", "[worker]\nclaim_window = 12\n");
        let cfg = load_config(Some(f.path())).expect("load config");
        assert_eq!(cfg.database.path, PathBuf::from("/tmp/q.db"));
        assert_eq!(cfg.logging.level, "warn");
        assert!(cfg.logging.json);
        assert_eq!(cfg.worker.claim_window, 3, "env wins over file");

        std::env::set_var("QUEUECTL_CLAIM_WINDOW", "many");
        assert!(matches!(
            load_config::<&Path>(None),
            Err(ConfigError::Parse(_))
        ));

        for k in &keys {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn validation_rejects_zero_values() {
        let mut cfg = Config::default();
        cfg.worker.poll_interval_ms = 0;
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("worker.poll_interval_ms"));

        let mut cfg = Config::default();
        cfg.database.path = PathBuf::new();
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.logging.level = "loud".into();
        assert!(validate_config(&cfg).is_err());
        cfg.logging.level = "queuectl=debug,sqlx=warn".into();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool(" off "), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
