//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod data;
mod init;
mod job;
mod modules_cmd;
mod scrape;
mod source;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::{LoadOptions, Settings};
use crate::modules::register_builtin;
use crate::registry::ModuleRegistry;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Course platform data acquisition and analysis system")]
#[command(version)]
pub struct Cli {
    /// Target directory or database file (overrides config file).
    /// Can be a directory containing courseharvest.db or a .db file directly.
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Manage data sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Scrape a source (or all active sources)
    Scrape {
        /// Source ID to scrape
        source_id: Option<String>,
        /// Scrape every active source
        #[arg(long)]
        all: bool,
        /// Run even if the source is inactive
        #[arg(long)]
        force: bool,
    },

    /// Derive structured records from a capture
    Analyze {
        /// Capture ID to analyze
        scraped_data_id: Option<String>,
        /// Analyze the latest capture of this source instead
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Inspect job history
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Inspect captures and derived records
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },

    /// List registered modules
    Modules,

    /// Delete old captures for a source (derived records fall with them)
    Purge {
        /// Source ID to purge
        source_id: String,
        /// Keep captures newer than this many days
        #[arg(long, default_value = "30")]
        keep_days: i64,
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SourceCommands {
    /// Add a new source
    Add {
        /// Source ID (slug)
        id: String,
        /// Human-readable name
        #[arg(long)]
        name: String,
        /// Origin URL or endpoint
        #[arg(long)]
        url: String,
        /// Registered module that handles this source
        #[arg(long)]
        module: String,
        /// Module-specific option as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },
    /// List configured sources
    List,
    /// Show one source with its recent jobs
    Show {
        /// Source ID
        id: String,
    },
    /// Reactivate a source
    Enable {
        /// Source ID
        id: String,
    },
    /// Deactivate a source (history is kept)
    Disable {
        /// Source ID
        id: String,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List recent jobs
    List {
        /// Maximum number of jobs to show (0 = all)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one job
    Show {
        /// Job ID
        id: String,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// List captures for a source
    List {
        /// Source ID
        source_id: String,
    },
    /// Show one capture and its derived records
    Show {
        /// Capture ID
        scraped_data_id: String,
    },
}

/// Parse arguments, load settings, register modules, and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&LoadOptions {
        config_path: cli.config.clone(),
        target: cli.target.clone(),
    })?;

    let registry = Arc::new(ModuleRegistry::new());
    register_builtin(&registry, &settings)?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Source { command } => match command {
            SourceCommands::Add {
                id,
                name,
                url,
                module,
                options,
            } => source::cmd_source_add(&settings, &registry, &id, &name, &url, &module, &options)
                .await,
            SourceCommands::List => source::cmd_source_list(&settings).await,
            SourceCommands::Show { id } => source::cmd_source_show(&settings, &id).await,
            SourceCommands::Enable { id } => {
                source::cmd_source_set_active(&settings, &id, true).await
            }
            SourceCommands::Disable { id } => {
                source::cmd_source_set_active(&settings, &id, false).await
            }
        },
        Commands::Scrape {
            source_id,
            all,
            force,
        } => scrape::cmd_scrape(&settings, registry.clone(), source_id.as_deref(), all, force).await,
        Commands::Analyze {
            scraped_data_id,
            source,
        } => {
            analyze::cmd_analyze(
                &settings,
                registry.clone(),
                scraped_data_id.as_deref(),
                source.as_deref(),
            )
            .await
        }
        Commands::Job { command } => match command {
            JobCommands::List { limit } => job::cmd_job_list(&settings, limit).await,
            JobCommands::Show { id } => job::cmd_job_show(&settings, &id).await,
        },
        Commands::Data { command } => match command {
            DataCommands::List { source_id } => data::cmd_data_list(&settings, &source_id).await,
            DataCommands::Show { scraped_data_id } => {
                data::cmd_data_show(&settings, &scraped_data_id).await
            }
        },
        Commands::Modules => modules_cmd::cmd_modules(&settings, &registry).await,
        Commands::Purge {
            source_id,
            keep_days,
            yes,
        } => data::cmd_purge(&settings, &source_id, keep_days, yes).await,
    }
}
