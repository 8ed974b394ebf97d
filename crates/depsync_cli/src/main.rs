//! Depsync CLI - command-line interface for the dependency reconciliation
//! pipeline.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use depsync::WorkCategory;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "depsync")]
#[command(version)]
#[command(about = "Dependency-manifest reconciliation for tracked repositories")]
#[command(
    long_about = "Depsync keeps a database of repositories in sync with their \
dependency-declaration files. Parsing runs in an external job service; depsync \
submits jobs, polls them, and reconciles the results into manifest and \
dependency rows. Run `depsync tick` periodically (e.g. from cron) to drive the \
pipeline."
)]
#[command(after_long_help = r#"EXAMPLES
    Apply the schema:
        $ depsync migrate up

    Run one scheduling pass for every work category:
        $ depsync tick

    Run one pass for dependency parsing only:
        $ depsync tick --category dependency-parsing

    Run one parse-cycle step for a single repository:
        $ depsync parse 7c29cbd8-7c6e-4b5e-9b1e-2f51f86d8f44

CONFIGURATION
    Depsync reads configuration from:
      1. ~/.config/depsync/config.toml (or $XDG_CONFIG_HOME/depsync/config.toml)
      2. ./depsync.toml
      3. Environment variables (DEPSYNC_* prefix)

ENVIRONMENT VARIABLES
    DEPSYNC_DATABASE_URL          Database connection string
    DEPSYNC_SERVICES_PARSER_URL   Parse service base URL
    DEPSYNC_SERVICES_ARCHIVES_URL Archive service base URL
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Run one dispatch tick: select, enqueue, and work eligible repositories
    Tick {
        /// Restrict the tick to one work category
        /// (dependency-parsing, tag-download, usage-update, metadata-refresh)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Run one parse-cycle step for a single repository
    Parse {
        /// Repository id
        repo_id: Uuid,
    },
    /// Show parse-state and backlog counts
    Status,
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("depsync=info,depsync_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = config::Config::load();
    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("Failed to determine database URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Tick { category } => {
            let category = category
                .map(|c| c.parse::<WorkCategory>())
                .transpose()
                .map_err(Box::<dyn std::error::Error>::from)?;
            commands::tick::handle_tick(&config, &database_url, category).await?;
        }
        Commands::Parse { repo_id } => {
            commands::parse::handle_parse(&config, &database_url, repo_id).await?;
        }
        Commands::Status => {
            commands::status::handle_status(&database_url).await?;
        }
    }

    Ok(())
}
