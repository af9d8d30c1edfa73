//! Command-line interface for setdump
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging (flags override the file)
//! - Subcommands (`version`, `completion`, `config`)

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

use crate::config::{AuthMode, Config, DEFAULT_HOST, DEFAULT_PORT, LogLevel};
use crate::connection::SeedHost;
use crate::error::Result;
use crate::export::PartitionSelector;

pub mod completion;

/// Export key-value store sets into per-set CSV files
#[derive(Parser, Debug)]
#[command(
    name = "setdump",
    version,
    about = "Export key-value store sets to CSV",
    long_about = "Scans every selected set and writes one CSV file per set. Columns are
discovered while scanning: the first record's bins in sorted order, then new bins
in the order they first appear."
)]
pub struct CliArgs {
    /// Server hostname (default: 127.0.0.1)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port (default: 3000)
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Comma separated seed list, `host[:port]` each
    #[arg(long, value_name = "SEEDS")]
    pub hosts: Option<String>,

    /// Comma separated namespace patterns; omit for all namespaces
    #[arg(short = 'n', long = "namespace", value_name = "PATTERNS", value_delimiter = ',')]
    pub namespaces: Vec<String>,

    /// Comma separated set patterns; omit for all sets
    #[arg(short = 's', long = "set", value_name = "PATTERNS", value_delimiter = ',')]
    pub sets: Vec<String>,

    /// Output directory (default: .)
    #[arg(short = 'd', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Only records updated at or after this time
    #[arg(short = 'f', long, value_name = "DATE")]
    pub from: Option<String>,

    /// Only records updated at or before this time
    #[arg(short = 't', long, value_name = "DATE")]
    pub to: Option<String>,

    /// User for secured clusters
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Password for secured clusters
    #[arg(short = 'P', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Authentication mode (internal, external, pki)
    #[arg(long, value_name = "MODE")]
    pub auth_mode: Option<String>,

    /// Enable TLS
    #[arg(long)]
    pub tls: bool,

    /// Expected TLS certificate name
    #[arg(long, value_name = "NAME")]
    pub tls_name: Option<String>,

    /// Maximum records per set, 0 for unlimited
    #[arg(short = 'l', long, value_name = "N")]
    pub limit: Option<u64>,

    /// Add _generation and _expiry columns
    #[arg(short = 'm', long)]
    pub metadata: bool,

    /// Add the _digest column
    #[arg(short = 'D', long)]
    pub digest: bool,

    /// Minimum record size in bytes
    #[arg(short = 'I', long, value_name = "BYTES")]
    pub min_size: Option<i64>,

    /// Maximum record size in bytes
    #[arg(short = 'A', long, value_name = "BYTES")]
    pub max_size: Option<i64>,

    /// Number of sets exported in parallel (default: 1)
    #[arg(short = 'j', long, value_name = "N", allow_negative_numbers = true)]
    pub concurrency: Option<i64>,

    /// JSON cluster snapshot to export from
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Show per-set progress
    #[arg(long)]
    pub progress: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only, no summary)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for setdump
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Configuration after merging flags over the file
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// Validation is left to the caller so that `config --validate` can
    /// report problems instead of failing outright.
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args)?;
        Ok(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_quiet(&self) -> bool {
        self.args.quiet
    }

    /// Partition selector built from the merged namespace and set patterns
    pub fn selector(&self) -> Result<PartitionSelector> {
        PartitionSelector::new(&self.config.export.namespaces, &self.config.export.sets)
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        Self::apply_logging_args(config, args);
        Self::apply_connection_args(config, args)?;
        Self::apply_export_args(config, args);
        Ok(())
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply connection-related CLI arguments to configuration
    fn apply_connection_args(config: &mut Config, args: &CliArgs) -> Result<()> {
        let connection = &mut config.connection;

        if let Some(list) = &args.hosts {
            connection.hosts = SeedHost::parse_list(list)?
                .iter()
                .map(ToString::to_string)
                .collect();
        } else if args.host.is_some() || args.port.is_some() {
            let host = args.host.as_deref().unwrap_or(DEFAULT_HOST);
            let port = args.port.unwrap_or(DEFAULT_PORT);
            connection.hosts = vec![format!("{}:{}", host, port)];
        }

        if let Some(user) = &args.user {
            connection.user = Some(user.clone());
        }
        if let Some(password) = &args.password {
            connection.password = Some(password.clone());
        }
        if let Some(mode) = &args.auth_mode {
            connection.auth_mode = AuthMode::parse(mode)?;
        }
        if args.tls {
            connection.tls_enabled = true;
        }
        if let Some(name) = &args.tls_name {
            connection.tls_name = Some(name.clone());
        }
        if let Some(timeout) = args.timeout {
            connection.timeout_secs = timeout;
        }
        if let Some(snapshot) = &args.snapshot {
            connection.snapshot = Some(snapshot.clone());
        }
        Ok(())
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        let export = &mut config.export;

        if !args.namespaces.is_empty() {
            export.namespaces = args.namespaces.clone();
        }
        if !args.sets.is_empty() {
            export.sets = args.sets.clone();
        }
        if let Some(directory) = &args.directory {
            export.directory = directory.clone();
        }
        if let Some(from) = &args.from {
            export.from = Some(from.clone());
        }
        if let Some(to) = &args.to {
            export.to = Some(to.clone());
        }
        if let Some(limit) = args.limit {
            export.record_limit = limit;
        }
        if let Some(min_size) = args.min_size {
            export.min_size = min_size;
        }
        if let Some(max_size) = args.max_size {
            export.max_size = max_size;
        }
        if let Some(concurrency) = args.concurrency {
            export.concurrency = concurrency;
        }
        export.metadata |= args.metadata;
        export.digest |= args.digest;
        export.progress |= args.progress;
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell, &mut io::stdout())?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("setdump version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config();
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate the merged configuration
    fn validate_config(&self) {
        println!("Validating configuration file: {}", self.get_config_path().display());

        match self.config.validate() {
            Ok(_) => println!("✅ Configuration is valid"),
            Err(e) => println!("❌ Configuration validation failed: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.get_config_path().display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }

    /// Print the connection banner
    pub fn print_banner(&self, target: &str) {
        if !self.args.quiet {
            println!("Exporting from: {}", target);
            println!("Using setdump: {}", env!("CARGO_PKG_VERSION"));
        }
    }
}
