mod banner;
mod commands;
mod keys;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chunkwise_config::{ConfigLoader, LogConfig};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chunkwise", version, about = "Ordered, audited schema migrations")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ~/.chunkwise/config.yml
    #[arg(short, long, global = true, env = "CHUNKWISE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the migration admin API
    Serve,
    /// Create the migration history table
    Init,
    /// Run every chunk of a migration in order, stopping at the first failure
    Run {
        #[arg(short, long)]
        migration: Option<String>,
        /// Identity recorded as executed_by
        #[arg(long = "as")]
        executed_by: Option<String>,
    },
    /// Run one chunk of a migration
    RunChunk {
        chunk_id: String,
        #[arg(short, long)]
        migration: Option<String>,
        #[arg(long = "as")]
        executed_by: Option<String>,
    },
    /// Execute a migration's rollback script
    Rollback {
        #[arg(short, long)]
        migration: Option<String>,
        #[arg(long = "as")]
        executed_by: Option<String>,
    },
    /// Show derived state, tables and chunks of a migration
    Status {
        #[arg(short, long)]
        migration: Option<String>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent execution history, newest first
    History {
        #[arg(short, long)]
        migration: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Include every migration, rollbacks and ad-hoc chunks too
        #[arg(long, conflicts_with = "migration")]
        all: bool,
    },
    /// List the chunks of a migration
    Chunks {
        #[arg(short, long)]
        migration: Option<String>,
    },
    /// Generate an API key and print its config entry
    Keygen {
        #[arg(long)]
        identity: String,
        #[arg(long, value_enum, default_value_t = KeyRole::Viewer)]
        role: KeyRole,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyRole {
    Admin,
    Viewer,
}

impl KeyRole {
    fn as_str(self) -> &'static str {
        match self {
            KeyRole::Admin => "admin",
            KeyRole::Viewer => "viewer",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Command::Keygen { identity, role } = &cli.command {
        let key = keys::generate_key();
        println!("API key (shown once): {}", key.key);
        println!();
        print!("{}", keys::config_snippet(identity, role.as_str(), &key.sha256));
        return Ok(());
    }

    let config = ConfigLoader::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    init_tracing(&config.log);

    commands::dispatch(cli.command, config).await
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
