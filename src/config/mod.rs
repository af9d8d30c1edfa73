//! Configuration management for setdump
//!
//! Configuration comes from three places, highest precedence first:
//! 1. Command-line arguments
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! Once merged, the run's immutable [`FilterParams`] and [`ExportOptions`]
//! are derived from it and never change afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::{ExportOptions, FilterParams};

pub mod dates;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// What to export and where
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Seed hosts as `host[:port]`
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// User for secured clusters
    #[serde(default)]
    pub user: Option<String>,

    /// Password for secured clusters
    #[serde(default)]
    pub password: Option<String>,

    /// Authentication mode
    #[serde(default)]
    pub auth_mode: AuthMode,

    #[serde(default)]
    pub tls_enabled: bool,

    /// Expected TLS certificate name
    #[serde(default)]
    pub tls_name: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// JSON cluster snapshot used as the data source
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

/// Authentication modes understood by the cluster
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Internal,
    External,
    Pki,
}

impl AuthMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "internal" => Ok(AuthMode::Internal),
            "external" => Ok(AuthMode::External),
            "pki" => Ok(AuthMode::Pki),
            _ => Err(ConfigError::InvalidValue {
                field: "auth_mode".to_string(),
                value: value.to_string(),
            }
            .into()),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Namespace patterns; empty selects every namespace
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Set patterns; empty selects every set
    #[serde(default)]
    pub sets: Vec<String>,

    /// Output directory
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Only records updated at or after this time
    #[serde(default)]
    pub from: Option<String>,

    /// Only records updated at or before this time
    #[serde(default)]
    pub to: Option<String>,

    /// Maximum records per set, 0 for unlimited
    #[serde(default)]
    pub record_limit: u64,

    /// Emit generation and expiry columns
    #[serde(default)]
    pub metadata: bool,

    /// Emit the digest column
    #[serde(default)]
    pub digest: bool,

    #[serde(default)]
    pub min_size: i64,

    #[serde(default = "default_max_size")]
    pub max_size: i64,

    /// Number of sets exported in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: i64,

    /// Upper bound on the whole run, in seconds
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Draw per-set progress spinners
    #[serde(default)]
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_hosts() -> Vec<String> {
    vec![format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT)]
}

fn default_timeout() -> u64 {
    30
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_size() -> i64 {
    i64::MAX
}

fn default_concurrency() -> i64 {
    1
}

fn default_wait_timeout() -> u64 {
    crate::export::DEFAULT_WAIT_LIMIT.as_secs()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

/// Host used when neither the command line nor the file names one
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Service port used when a seed omits it
pub const DEFAULT_PORT: u16 = 3000;

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            user: None,
            password: None,
            auth_mode: AuthMode::default(),
            tls_enabled: false,
            tls_name: None,
            timeout_secs: default_timeout(),
            snapshot: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            sets: Vec::new(),
            directory: default_directory(),
            from: None,
            to: None,
            record_limit: 0,
            metadata: false,
            digest: false,
            min_size: 0,
            max_size: default_max_size(),
            concurrency: default_concurrency(),
            wait_timeout_secs: default_wait_timeout(),
            progress: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load configuration from an explicit path or the default location
    ///
    /// An explicit path must exist. A missing default file yields the
    /// default configuration.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Default configuration file path: `~/.setdump/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".setdump")
            .join("config.toml")
    }

    /// Serialize the configuration back to TOML, credentials masked
    pub fn to_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.connection.password.is_some() {
            shown.connection.password = Some("***".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// Everything that can be rejected without touching the cluster is
    /// rejected here, so errors surface before any scan starts.
    pub fn validate(&self) -> Result<()> {
        let export = &self.export;

        if export.concurrency <= 0 {
            return Err(invalid("concurrency", export.concurrency));
        }
        if export.min_size < 0 {
            return Err(invalid("min_size", export.min_size));
        }
        if export.max_size < export.min_size {
            return Err(invalid("max_size", export.max_size));
        }
        if export.wait_timeout_secs == 0 {
            return Err(invalid("wait_timeout_secs", export.wait_timeout_secs));
        }
        if self.connection.hosts.is_empty() && self.connection.snapshot.is_none() {
            return Err(invalid("hosts", "(empty)"));
        }

        let (start, end) = self.time_range()?;
        if end < start {
            return Err(invalid("to", export.to.as_deref().unwrap_or_default()));
        }

        Ok(())
    }

    /// `from`/`to` as nanoseconds since the epoch
    pub fn time_range(&self) -> Result<(i64, i64)> {
        let start = match &self.export.from {
            Some(text) => dates::parse_timestamp_ns(text)?,
            None => 0,
        };
        let end = match &self.export.to {
            Some(text) => dates::parse_timestamp_ns(text)?,
            None => i64::MAX,
        };
        Ok((start, end))
    }

    /// Record filter shared by every worker of the run
    pub fn filter_params(&self) -> Result<FilterParams> {
        let (start_time_ns, end_time_ns) = self.time_range()?;
        Ok(FilterParams {
            start_time_ns,
            end_time_ns,
            min_size: self.export.min_size,
            max_size: self.export.max_size,
            record_limit: self.export.record_limit,
            record_metadata: self.export.metadata,
            include_digest: self.export.digest,
        })
    }

    /// Execution settings for the coordinator
    pub fn export_options(&self) -> Result<ExportOptions> {
        let concurrency = usize::try_from(self.export.concurrency)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid("concurrency", self.export.concurrency))?;

        Ok(ExportOptions {
            output_dir: self.export.directory.clone(),
            concurrency,
            show_progress: self.export.progress,
            wait_limit: Duration::from_secs(self.export.wait_timeout_secs),
        })
    }
}

fn invalid(field: &str, value: impl ToString) -> crate::error::ExporterError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.hosts, vec!["127.0.0.1:3000".to_string()]);
        assert_eq!(config.export.concurrency, 1);
        assert_eq!(config.export.max_size, i64::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [export]
            namespaces = ["test"]
            record_limit = 100
            metadata = true
            concurrency = 4

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.export.namespaces, vec!["test".to_string()]);
        assert_eq!(config.export.record_limit, 100);
        assert_eq!(config.export.directory, PathBuf::from("."));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.connection.timeout_secs, 30);

        let params = config.filter_params().unwrap();
        assert!(params.record_metadata);
        assert_eq!(params.limit(), Some(100));
        assert_eq!(config.export_options().unwrap().concurrency, 4);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("[export\nconcurrency = 1").is_err());
        assert!(Config::from_toml("[export]\nconcurrency = \"many\"").is_err());
    }

    #[test]
    fn test_concurrency_must_be_positive() {
        for concurrency in [0, -3] {
            let mut config = Config::default();
            config.export.concurrency = concurrency;
            let err = config.validate().unwrap_err();
            assert!(err.is_fatal_before_scan());
            assert!(config.export_options().is_err());
        }
    }

    #[test]
    fn test_time_range_defaults_and_order() {
        let mut config = Config::default();
        assert_eq!(config.time_range().unwrap(), (0, i64::MAX));

        config.export.from = Some("2024-02-01T00:00:00Z".to_string());
        config.export.to = Some("2024-01-01T00:00:00Z".to_string());
        assert!(config.validate().is_err());

        config.export.from = Some("not a date".to_string());
        assert!(config.time_range().is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_file(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\nhosts = [\"10.0.0.1:3000\", \"10.0.0.2\"]\n").unwrap();
        let config = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(config.connection.hosts.len(), 2);
    }

    #[test]
    fn test_to_toml_masks_password() {
        let mut config = Config::default();
        config.connection.password = Some("secret".to_string());
        let text = config.to_toml().unwrap();
        assert!(!text.contains("secret"));
        assert_eq!(Config::from_toml(&text).unwrap().export, config.export);
    }

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!(AuthMode::parse("PKI").unwrap(), AuthMode::Pki);
        assert!(AuthMode::parse("kerberos").is_err());
    }
}
