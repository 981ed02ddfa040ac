//! Command-line interface for docexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and command-line overrides
//! - Wiring the document store, checkpoint ledger and coordinator together
//! - Running the subcommands

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::checkpoint::{CheckpointLedger, CheckpointStore, ExportIndex};
use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};
use crate::export::{
    export_group, ExportCoordinator, Format, GroupExportConfig, MemoryExportCache,
    ProgressTracker, RebuildQueue, SavedExport,
};
use crate::source::MemoryDocumentStore;

/// docexport - incremental tabular exports of document collections
#[derive(Parser, Debug)]
#[command(
    name = "docexport",
    version,
    about = "Incremental tabular exports of schema-less document collections",
    long_about = "Infers a schema from JSON documents, projects them into flat tables and
writes CSV, spreadsheet, HTML or JSON artifacts, exporting only what changed
since the last checkpoint."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Options locating the document store and the checkpoint ledger
#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// JSON-lines document store
    #[arg(long, value_name = "FILE")]
    pub store: PathBuf,

    /// Checkpoint ledger (created when missing)
    #[arg(long, value_name = "FILE")]
    pub checkpoints: PathBuf,
}

/// Subcommands for docexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the documents of an index
    Export {
        #[command(flatten)]
        store: StoreArgs,

        /// Export index, as a JSON array or a plain tag
        #[arg(long, value_name = "INDEX")]
        index: Option<String>,

        /// Output format
        #[arg(short = 'f', long, value_name = "FORMAT", value_parser = parse_format)]
        format: Option<Format>,

        /// Saved export configuration (JSON)
        #[arg(long = "config-file", value_name = "FILE")]
        saved_export: Option<PathBuf>,

        /// Output file (defaults to <name>.<extension>)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Only export documents changed since this checkpoint
        #[arg(long, value_name = "UUID")]
        previous: Option<Uuid>,

        /// Write raw values instead of applying column transforms
        #[arg(long)]
        no_transforms: bool,

        /// Maximum length of a header name
        #[arg(long, value_name = "SIZE")]
        max_column_size: Option<usize>,
    },

    /// Run a group of exports into a directory
    Group {
        /// Group definition (TOML)
        #[arg(value_name = "FILE")]
        group: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Directory the files are written to
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,
    },

    /// Recompute the schema of an index from every document
    Rebuild {
        #[command(flatten)]
        store: StoreArgs,

        /// Export index, as a JSON array or a plain tag
        #[arg(long, value_name = "INDEX")]
        index: String,
    },

    /// List indices with checkpoints, or the checkpoints of one index
    Checkpoints {
        /// Checkpoint ledger
        #[arg(long, value_name = "FILE")]
        checkpoints: PathBuf,

        /// Export index, as a JSON array or a plain tag
        #[arg(long, value_name = "INDEX")]
        index: Option<String>,
    },

    /// List supported output formats
    Formats,

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

fn parse_format(slug: &str) -> std::result::Result<Format, String> {
    Format::from_slug(slug).map_err(|e| e.to_string())
}

/// Output path for an export: explicit, or `<name>.<extension>`
fn output_path(output: Option<&Path>, name: &str, format: Format) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{name}.{}", format.extension())))
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = match Config::load_from_file(args.config_file.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}", e);
                eprintln!("Using default configuration instead.");
                Config::default()
            }
        };

        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        if args.no_progress || args.quiet {
            config.progress.enabled = false;
        }
    }

    /// Run the selected subcommand
    pub async fn run_command(&self) -> Result<()> {
        match &self.args.command {
            Commands::Export {
                store,
                index,
                format,
                saved_export,
                output,
                previous,
                no_transforms,
                max_column_size,
            } => {
                let saved = self
                    .resolve_saved_export(index.as_deref(), saved_export.as_deref())
                    .await?;
                self.run_export(
                    store,
                    saved,
                    *format,
                    output.as_deref(),
                    *previous,
                    *no_transforms,
                    *max_column_size,
                )
                .await
            }
            Commands::Group {
                group,
                store,
                output_dir,
            } => self.run_group(group, store, output_dir).await,
            Commands::Rebuild { store, index } => {
                let index = ExportIndex::parse(index)?;
                let coordinator = self.build_coordinator(store).await?;
                match coordinator.rebuild_schema(&index).await? {
                    Some(checkpoint) => self.say(&format!(
                        "Rebuilt schema for {} (checkpoint {})",
                        index, checkpoint.id
                    )),
                    None => self.say(&format!("No documents for {}", index)),
                }
                Ok(())
            }
            Commands::Checkpoints { checkpoints, index } => {
                self.list_checkpoints(checkpoints, index.as_deref()).await
            }
            Commands::Formats => {
                for format in Format::ALL {
                    println!("{:<14} .{:<6} {}", format.slug(), format.extension(), format.mime_type());
                }
                Ok(())
            }
            Commands::Config { show, validate } => self.handle_config_command(*show, *validate),
        }
    }

    /// Saved export from a file, or the default export of `--index`
    async fn resolve_saved_export(
        &self,
        index: Option<&str>,
        saved_export: Option<&Path>,
    ) -> Result<SavedExport> {
        match (saved_export, index) {
            (Some(path), index) => {
                let mut saved = SavedExport::load(path).await?;
                if let Some(index) = index {
                    saved.index = ExportIndex::parse(index)?;
                }
                Ok(saved)
            }
            (None, Some(index)) => {
                let mut saved = SavedExport::default_for(ExportIndex::parse(index)?);
                saved.default_format = self.config.export.default_format;
                Ok(saved)
            }
            (None, None) => Err(ConfigError::InvalidValue {
                field: "index".to_string(),
                value: "either --index or --config-file is required".to_string(),
            }
            .into()),
        }
    }

    /// Open the store and ledger and build a coordinator over them
    async fn build_coordinator(&self, store: &StoreArgs) -> Result<ExportCoordinator> {
        let source = Arc::new(MemoryDocumentStore::load_jsonl(&store.store).await?);
        let ledger = Arc::new(CheckpointLedger::open(&store.checkpoints).await?);

        let mut coordinator =
            ExportCoordinator::new(source, ledger).with_options(self.config.export_options());
        if self.config.progress.enabled {
            coordinator = coordinator.with_progress(Arc::new(ProgressTracker::new(true)));
        }
        if self.config.export.use_cache {
            coordinator =
                coordinator.with_cache(Arc::new(MemoryExportCache::new(self.config.cache_ttl())));
        }
        Ok(coordinator)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_export(
        &self,
        store: &StoreArgs,
        mut saved: SavedExport,
        format: Option<Format>,
        output: Option<&Path>,
        previous: Option<Uuid>,
        no_transforms: bool,
        max_column_size: Option<usize>,
    ) -> Result<()> {
        if no_transforms {
            saved.apply_transforms = false;
        }
        let format = format.unwrap_or(saved.default_format);
        let max_column_size = max_column_size.unwrap_or(self.config.export.max_column_size);

        let coordinator = self.build_coordinator(store).await?;
        match coordinator
            .export(&saved, format, previous, max_column_size)
            .await?
        {
            Some(result) => {
                let path = output_path(output, &saved.name, format);
                tokio::fs::write(&path, &result.bytes).await?;
                self.say(&format!(
                    "Exported {} documents to {} (checkpoint {})",
                    result.documents,
                    path.display(),
                    result.checkpoint.id
                ));
            }
            None => self.say(&format!("Nothing to export for {}", saved.index)),
        }
        Ok(())
    }

    async fn run_group(&self, group: &Path, store: &StoreArgs, output_dir: &Path) -> Result<()> {
        let config = GroupExportConfig::load(group).await?;
        let coordinator = self.build_coordinator(store).await?;
        let queue = RebuildQueue::new();

        let report = export_group(&coordinator, &config, output_dir, &queue).await?;
        for index in queue.drain().await {
            coordinator.rebuild_schema(&index).await?;
        }

        self.say(&format!(
            "Wrote {} files, {} empty, {} skipped",
            report.written.len(),
            report.empty.len(),
            report.skipped.len()
        ));
        Ok(())
    }

    async fn list_checkpoints(&self, checkpoints: &Path, index: Option<&str>) -> Result<()> {
        let ledger = CheckpointLedger::open(checkpoints).await?;
        match index {
            Some(index) => {
                let index = ExportIndex::parse(index)?;
                for checkpoint in ledger.history(&index).await? {
                    println!(
                        "{}  {}  {}",
                        checkpoint.id,
                        checkpoint.created_at.to_rfc3339(),
                        checkpoint.cursor
                    );
                }
            }
            None => {
                for index in ledger.all_indices().await? {
                    println!("{}", index);
                }
            }
        }
        Ok(())
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return;
        }

        match Config::from_file(&path) {
            Ok(_) => println!("✅ Configuration is valid"),
            Err(e) => println!("❌ {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.get_config_path().display());
        println!();
        let rendered = toml::to_string_pretty(&self.config)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        println!("{}", rendered);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    fn say(&self, message: &str) {
        if !self.args.quiet {
            println!("{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(argv: &[&str]) -> CliInterface {
        let args = CliArgs::try_parse_from(argv).unwrap();
        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        CliInterface { args, config }
    }

    #[test]
    fn test_export_args() {
        let args = CliArgs::try_parse_from([
            "docexport",
            "export",
            "--store",
            "docs.jsonl",
            "--checkpoints",
            "ledger.json",
            "--index",
            r#"["acme","visit"]"#,
            "--format",
            "Unzipped-CSV",
            "--no-transforms",
        ])
        .unwrap();

        match args.command {
            Commands::Export {
                format,
                no_transforms,
                index,
                ..
            } => {
                assert_eq!(format, Some(Format::UnzippedCsv));
                assert!(no_transforms);
                assert_eq!(index.as_deref(), Some(r#"["acme","visit"]"#));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = CliArgs::try_parse_from([
            "docexport", "export", "--store", "s", "--checkpoints", "c", "--format", "pdf",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_logging_overrides() {
        assert_eq!(cli(&["docexport", "-v", "formats"]).config().logging.level, LogLevel::Debug);
        assert_eq!(cli(&["docexport", "formats", "--vv"]).config().logging.level, LogLevel::Trace);
        let quiet = cli(&["docexport", "-q", "formats"]);
        assert_eq!(quiet.config().logging.level, LogLevel::Error);
        assert!(!quiet.config().progress.enabled);
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path(None, "visits", Format::Csv), PathBuf::from("visits.zip"));
        assert_eq!(
            output_path(Some(Path::new("out/a.json")), "visits", Format::Json),
            PathBuf::from("out/a.json")
        );
    }

    #[tokio::test]
    async fn test_export_command_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("docs.jsonl");
        let ledger = dir.path().join("ledger.json");
        let output = dir.path().join("people.json");
        tokio::fs::write(
            &store,
            concat!(
                r#"{"id": "a", "index": "people", "doc": {"name": "danny"}}"#,
                "\n",
                r#"{"id": "b", "index": "people", "doc": {"name": "amelia"}}"#,
                "\n"
            ),
        )
        .await
        .unwrap();

        let cli = cli(&[
            "docexport",
            "-q",
            "export",
            "--store",
            store.to_str().unwrap(),
            "--checkpoints",
            ledger.to_str().unwrap(),
            "--index",
            "people",
            "--format",
            "json",
            "--output",
            output.to_str().unwrap(),
        ]);
        cli.run_command().await.unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&output).await.unwrap()).unwrap();
        assert_eq!(value["Form"]["headers"], serde_json::json!(["id", "name"]));
        assert_eq!(value["Form"]["rows"].as_array().unwrap().len(), 2);

        let ledger = CheckpointLedger::open(&ledger).await.unwrap();
        assert_eq!(ledger.all_indices().await.unwrap(), [ExportIndex::new(["people"])]);
    }

    #[tokio::test]
    async fn test_export_requires_index_or_saved_export() {
        let cli = cli(&["docexport", "export", "--store", "s", "--checkpoints", "c"]);
        assert!(cli.run_command().await.is_err());
    }
}
