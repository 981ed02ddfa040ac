//! docexport - incremental tabular exports
//!
//! Exports schema-less JSON documents as CSV, spreadsheet, HTML or JSON
//! tables, tracking checkpoints so repeated runs only export what changed.
//!
//! # Usage
//!
//! ```bash
//! # Full export of one index
//! docexport export --store docs.jsonl --checkpoints ledger.json --index visit -f csv
//!
//! # Only what changed since a checkpoint
//! docexport export --store docs.jsonl --checkpoints ledger.json --index visit \
//!     --previous 6f1c0a9e-0d7b-4a53-9a55-0c3f8f3f8f12
//! ```

use tracing::Level;

use docexport::cli::CliInterface;
use docexport::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Run the selected subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.run_command().await
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
