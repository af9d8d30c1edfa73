//! setdump - export key-value store sets to CSV
//!
//! Scans every selected `(namespace, set)` pair and writes one CSV file per
//! set into the output directory.
//!
//! # Usage
//!
//! ```bash
//! # Every set of namespace "test", four at a time
//! setdump --snapshot cluster.json -n test -j 4 -d /tmp/export
//!
//! # Records updated in January, with metadata columns
//! setdump --snapshot cluster.json -f 01/01/2024-00:00:00 -t 01/31/2024-23:59:59 -m
//! ```
//!
//! Exit status: 0 when every set was exported, 1 when the run stopped
//! before scanning (configuration, connection, discovery), 2 when at least
//! one set failed.

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use setdump::cli::CliInterface;
use setdump::connection::ConnectionManager;
use setdump::error::Result;
use setdump::export::ExportCoordinator;
use setdump::formatter::{SummaryFormatter, TableStyle};

/// Exit status when the run completed but some sets failed
const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands, or validate and run the export
async fn run() -> Result<ExitCode> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(ExitCode::SUCCESS);
    }

    let config = cli.config();
    config.validate()?;
    let params = Arc::new(config.filter_params()?);
    let options = config.export_options()?;
    let selector = cli.selector()?;

    let manager = ConnectionManager::new(config.connection.clone())?;
    cli.print_banner(&manager.describe());
    let client = manager.connect().await?;

    info!(
        limit = params.record_limit,
        metadata = params.record_metadata,
        digest = params.include_digest,
        concurrency = options.concurrency,
        "Starting export to {}",
        options.output_dir.display()
    );

    let coordinator = ExportCoordinator::new(client, params, options);
    let summary = coordinator.export_matching(&selector).await?;

    if !cli.is_quiet() {
        // Box drawing and colors only when a person is reading
        let interactive = std::io::stdout().is_terminal();
        let style = if interactive { TableStyle::Modern } else { TableStyle::Ascii };
        let formatter = SummaryFormatter::new().with_style(style).with_colors(interactive);
        println!("{}", formatter.format(&summary));
    }

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` takes precedence when set. Logs go to stderr so the summary
/// table on stdout stays clean.
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
