use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chuni_catalog::config::{Config, DATABASE_ENV};
use chuni_catalog::progress::{format_duration, set_log_only};
use chuni_catalog::sources::SourceClient;
use chuni_catalog::{aliases, catalog, dump, sdvxin, sync};

#[derive(Parser)]
#[command(name = "chuni-catalog")]
#[command(version, about = "Build and refresh the CHUNITHM song catalog")]
struct Args {
    /// Configuration file (missing file means defaults)
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Catalog database, overrides the configuration file
    #[arg(long, global = true, env = DATABASE_ENV)]
    database: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide progress bars and log progress instead (for piping to files)
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the catalog schema
    Create,

    /// Fill the catalog from one of the upstream sources
    Update {
        #[command(subcommand)]
        source: UpdateSource,
    },
}

#[derive(Subcommand)]
enum UpdateSource {
    /// Songs and charts from chunirec, the official list and zetaraku
    Chunirec {
        /// Write matching statistics to a JSON file
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Community aliases
    Alias,

    /// sdvx.in chart view links
    Sdvxin,

    /// Levels, constants and note counts from a game data dump
    Dump {
        /// Paths to `music` folders
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "chuni_catalog=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_target(false)
        .init();
    set_log_only(args.log_only);

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;
    if let Some(database) = args.database {
        config.database.path = database;
    }

    let start = Instant::now();
    let db_path = config.database.path.clone();

    match args.command {
        Command::Create => {
            catalog::open(&db_path).with_context(|| format!("Failed to create catalog at {db_path:?}"))?;
            info!(path = %db_path.display(), "Catalog schema ready");
        }
        Command::Update { source } => {
            let mut conn =
                catalog::open(&db_path).with_context(|| format!("Failed to open catalog at {db_path:?}"))?;
            match source {
                UpdateSource::Chunirec { stats } => {
                    let client = SourceClient::new(config.sources.clone())?;
                    let result = sync::run(&mut conn, &client, &config).context("Primary sync failed")?;
                    if let Some(path) = stats {
                        result.write_to_file(&path)?;
                        info!(path = %path.display(), "Wrote statistics");
                    }
                }
                UpdateSource::Alias => {
                    let client = SourceClient::new(config.sources.clone())?;
                    aliases::run(&mut conn, &client).context("Alias sync failed")?;
                }
                UpdateSource::Sdvxin => {
                    let client = SourceClient::new(config.sources.clone())?;
                    sdvxin::run(&mut conn, &client).context("sdvx.in sync failed")?;
                }
                UpdateSource::Dump { paths } => {
                    drop(conn);
                    dump::run(&db_path, &paths).context("Dump import failed")?;
                }
            }
        }
    }

    info!(elapsed = %format_duration(start.elapsed()), "Done");
    Ok(())
}
