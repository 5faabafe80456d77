use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use meetapp::config::Config;
use meetapp::mail::{LogMailer, Mailer, RelayMailer};
use meetapp::state::AppState;
use meetapp::storage::{InMemoryStorage, SqliteStorage, Storage};
use meetapp::{logging, metrics, server};

#[derive(Parser)]
#[command(name = "meetapp")]
#[command(about = "Meetup scheduling and subscription API")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create or upgrade the SQLite schema and exit
    Migrate,
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    if config.uses_in_memory_database() {
        warn!("Using in-memory storage; data is lost on shutdown");
        return Ok(Arc::new(InMemoryStorage::new()));
    }
    let storage = SqliteStorage::open(&config.database.path)
        .with_context(|| format!("opening database {}", config.database.path))?;
    Ok(Arc::new(storage))
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail.relay_url {
        Some(url) => {
            info!("Delivering mail through relay {}", url);
            let timeout = Duration::from_secs(config.mail.timeout_secs);
            Ok(Arc::new(RelayMailer::new(url.clone(), config.mail.from.clone(), timeout)?))
        }
        None => {
            info!("No mail relay configured, mail will be logged");
            Ok(Arc::new(LogMailer::new(config.mail.from.clone())))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Migrate => {
            if config.uses_in_memory_database() {
                warn!("In-memory database configured, nothing to migrate");
                return Ok(());
            }
            SqliteStorage::open(&config.database.path)
                .with_context(|| format!("migrating database {}", config.database.path))?;
            info!("Database {} is up to date", config.database.path);
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let storage = open_storage(&config)?;
            let mailer = build_mailer(&config)?;
            let handle = metrics::install_recorder()?;

            let state = AppState::new(storage, mailer, config).with_metrics(handle);
            server::start_server(state, port).await?;
        }
    }
    Ok(())
}
