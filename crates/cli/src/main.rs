mod commands;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commands::*;
use tenantbase_core::AppConfig;
use tenantbase_http::{init_logging_or_fallback, LoggingConfig};

#[derive(Parser)]
#[command(name = "tenantbase")]
#[command(about = "Multi-tenant backend server and SQL migration tool")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true, env = "TENANTBASE_CONFIG", default_value = AppConfig::DEFAULT_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new up/down migration pair
    Create {
        /// Migration name, e.g. add_users
        name: String,

        /// Migrations directory (defaults to migrations.dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Apply pending migrations
    Up,

    /// Roll back the last batch, or the last migration in the versioned scheme
    Down,

    /// Step up or down to an explicit version (versioned scheme, 0 reverts all)
    MigrateTo {
        version: u64,
    },

    /// Print the current migration version
    Version,

    /// Set the version and clear the dirty flag without running SQL (versioned scheme)
    Force {
        version: u64,
    },

    /// Show applied and pending migrations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check migration files without touching the database
    Validate {
        /// Migrations directory (defaults to migrations.dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Run pending migrations and start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Create { name, dir } => {
            init_logging_or_fallback(LoggingConfig::default());
            let dir = resolve_migrations_dir(&cli.config, dir)?;
            migrate::create(&dir, &name)
        }
        Commands::Validate { dir } => {
            init_logging_or_fallback(LoggingConfig::default());
            let dir = resolve_migrations_dir(&cli.config, dir)?;
            migrate::validate(&dir)
        }
        Commands::Up => migrate::up(&configure(&cli.config)?).await,
        Commands::Down => migrate::down(&configure(&cli.config)?).await,
        Commands::MigrateTo { version } => {
            migrate::migrate_to(&configure(&cli.config)?, version).await
        }
        Commands::Version => migrate::version(&configure(&cli.config)?).await,
        Commands::Force { version } => migrate::force(&configure(&cli.config)?, version).await,
        Commands::Status { json } => migrate::status(&configure(&cli.config)?, json).await,
        Commands::Serve => serve::run(&configure(&cli.config)?).await,
    }
}

/// Load the configuration file and install logging from its `logger` section
fn configure(path: &Path) -> anyhow::Result<AppConfig> {
    let config = load_config(path)?;
    init_logging_or_fallback(LoggingConfig::from(&config.logger));
    Ok(config)
}
