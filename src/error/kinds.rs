use std::time::Duration;
use std::{fmt, io};

/// Crate-wide `Result` type using [`ExporterError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Top-level error type for export runs.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExporterError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Configuration errors.
    Config(ConfigError),

    /// Errors while discovering partitions or namespace properties.
    Discovery(DiscoveryError),

    /// Errors while exporting a single partition.
    Export(ExportError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// A seed host entry could not be parsed.
    InvalidSeed(String),

    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// No cluster source was configured for this run.
    NoClusterSource(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// A namespace or set filter pattern is not a valid regular expression.
    InvalidPattern { pattern: String, message: String },

    /// A date option did not match any accepted format.
    InvalidDate(String),
}

/// Discovery errors. These abort the whole run.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Listing the cluster's partitions failed.
    ListPartitions(String),

    /// Reading a namespace's configuration failed.
    NamespaceConfig { namespace: String, message: String },
}

/// Per-partition export errors.
#[derive(Debug)]
pub enum ExportError {
    /// The collaborator failed while streaming records.
    Scan { partition: String, message: String },

    /// Writing a row to the scratch file failed.
    Write { partition: String, message: String },

    /// Writing the final header-prefixed file failed.
    Finalize { partition: String, message: String },

    /// The namespace or set name cannot be used as a file name.
    InvalidName { partition: String, reason: String },

    /// The coordinator gave up waiting for workers.
    Timeout(Duration),

    /// A worker task panicked or was aborted.
    WorkerPanicked(String),
}

impl ExporterError {
    /// Whether this error is raised before any partition scan starts.
    ///
    /// Configuration, connection, and discovery failures stop the whole run;
    /// everything else is contained to a single partition.
    pub fn is_fatal_before_scan(&self) -> bool {
        matches!(
            self,
            ExporterError::Config(_) | ExporterError::Connection(_) | ExporterError::Discovery(_)
        )
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExporterError::Connection(e) => write!(f, "Connection error: {e}"),
            ExporterError::Config(e) => write!(f, "Configuration error: {e}"),
            ExporterError::Discovery(e) => write!(f, "Discovery error: {e}"),
            ExporterError::Export(e) => write!(f, "Export error: {e}"),
            ExporterError::Io(e) => write!(f, "I/O error: {e}"),
            ExporterError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::InvalidSeed(seed) => write!(f, "Invalid seed host: {seed}"),
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::NoClusterSource(msg) => write!(f, "No cluster source: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::InvalidPattern { pattern, message } => {
                write!(f, "Invalid filter pattern '{pattern}': {message}")
            }
            ConfigError::InvalidDate(value) => write!(
                f,
                "Could not parse date '{value}' (expected MM/dd/yyyy-HH:mm:ss, \
                 'MMMM d yyyy HH:mm:ss Z' or RFC 3339)"
            ),
        }
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::ListPartitions(msg) => write!(f, "Failed to list sets: {msg}"),
            DiscoveryError::NamespaceConfig { namespace, message } => {
                write!(f, "Failed to read config of namespace '{namespace}': {message}")
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Scan { partition, message } => {
                write!(f, "Scan of {partition} failed: {message}")
            }
            ExportError::Write { partition, message } => {
                write!(f, "Failed to write row for {partition}: {message}")
            }
            ExportError::Finalize { partition, message } => {
                write!(f, "Failed to finalize {partition}: {message}")
            }
            ExportError::InvalidName { partition, reason } => {
                write!(f, "Cannot export {partition}: {reason}")
            }
            ExportError::Timeout(limit) => {
                write!(f, "Workers did not finish within {limit:?}")
            }
            ExportError::WorkerPanicked(msg) => write!(f, "Worker task failed: {msg}"),
        }
    }
}

impl std::error::Error for ExporterError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for DiscoveryError {}
impl std::error::Error for ExportError {}

/* ========================= Conversions to ExporterError ========================= */

impl From<io::Error> for ExporterError {
    fn from(err: io::Error) -> Self {
        ExporterError::Io(err)
    }
}

impl From<ConnectionError> for ExporterError {
    fn from(err: ConnectionError) -> Self {
        ExporterError::Connection(err)
    }
}

impl From<ConfigError> for ExporterError {
    fn from(err: ConfigError) -> Self {
        ExporterError::Config(err)
    }
}

impl From<DiscoveryError> for ExporterError {
    fn from(err: DiscoveryError) -> Self {
        ExporterError::Discovery(err)
    }
}

impl From<ExportError> for ExporterError {
    fn from(err: ExportError) -> Self {
        ExporterError::Export(err)
    }
}

impl From<String> for ExporterError {
    fn from(msg: String) -> Self {
        ExporterError::Generic(msg)
    }
}

impl From<&str> for ExporterError {
    fn from(msg: &str) -> Self {
        ExporterError::Generic(msg.to_owned())
    }
}
