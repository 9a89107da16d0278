//! archivist CLI entry point

use archivist::{
    commands::{
        cmd_context, cmd_discard, cmd_files, cmd_index, cmd_query, cmd_recover, cmd_reindex,
        cmd_resume, cmd_status, print_file_matches, print_index_stats, print_search_results,
        print_status, AppContext,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version, about = "Local document indexing with hybrid retrieval", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize archivist configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Index all supported files under a folder
    Index {
        /// Folder to index
        folder: PathBuf,

        /// Reindex files even when unchanged
        #[arg(long)]
        force: bool,

        /// Per-file chunk ceiling override
        #[arg(long)]
        max_chunks: Option<u32>,
    },

    /// Force-reindex specific files
    Reindex {
        /// Files to reindex
        files: Vec<String>,

        /// Per-file chunk ceiling override
        #[arg(long)]
        max_chunks: Option<u32>,
    },

    /// Resume a paused indexing job
    Resume {
        /// Job id (defaults to the active job)
        job_id: Option<i64>,
    },

    /// Permanently discard a paused job's state
    Discard {
        /// Job id
        job_id: i64,
    },

    /// Reprocess files skipped for exceeding the chunk ceiling
    Recover {
        /// New per-file chunk ceiling
        #[arg(long, default_value = "200")]
        max_chunks: u32,
    },

    /// Search indexed documents
    Query {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Assemble an attributed context block for a query
    Context {
        /// The query
        query: String,

        /// Maximum number of chunks
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Search indexed files by name
    Files {
        /// Name pattern query
        query: String,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "archivist=debug" } else { "archivist=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(LogWriterFactory).with_target(false))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => {
            let mut config = Config::default();
            config.init_paths(None);
            if config.paths.config_file.exists() && !force {
                println!(
                    "Config already exists at {} (use --force to overwrite)",
                    config.paths.config_file.display()
                );
                return Ok(());
            }
            config.save()?;
            println!("Wrote {}", config.paths.config_file.display());
            Ok(())
        }

        Commands::Index {
            folder,
            force,
            max_chunks,
        } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let stats = cmd_index(&ctx, &folder, force, max_chunks).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_index_stats(&stats);
            }
            Ok(())
        }

        Commands::Reindex { files, max_chunks } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let stats = cmd_reindex(&ctx, &files, max_chunks).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_index_stats(&stats);
            }
            Ok(())
        }

        Commands::Resume { job_id } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let stats = cmd_resume(&ctx, job_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_index_stats(&stats);
            }
            Ok(())
        }

        Commands::Discard { job_id } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            cmd_discard(&ctx, job_id).await
        }

        Commands::Recover { max_chunks } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let stats = cmd_recover(&ctx, max_chunks).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_index_stats(&stats);
            }
            Ok(())
        }

        Commands::Query { query, limit } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let results = cmd_query(&ctx, &query, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_search_results(&query, &results);
            }
            Ok(())
        }

        Commands::Context { query, limit } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let context = cmd_context(&ctx, &query, limit).await?;
            println!("{}", context);
            Ok(())
        }

        Commands::Files { query } => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let matches = cmd_files(&ctx, &query).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                print_file_matches(&matches);
            }
            Ok(())
        }

        Commands::Status => {
            let ctx = AppContext::open(load_config(cli.config.as_ref())?).await?;
            let report = cmd_status(&ctx).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
            Ok(())
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "archivist", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
