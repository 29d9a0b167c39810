//! Orglens CLI - command-line driver for the organization mirror.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::shared::CommonSyncOptions;

#[derive(Parser)]
#[command(name = "orglens")]
#[command(version)]
#[command(about = "An incremental mirror of a GitHub organization")]
#[command(
    long_about = "Orglens keeps a local JSON mirror of a GitHub organization's repositories, \
issues, pull requests, and commits, refreshed in weekly windows. From the mirror it \
resolves commit authors into developers and weighs repository modules by activity."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync every window since the last checkpoint:
        $ orglens sync --org PaddlePaddle

    Start a fresh mirror from a given day:
        $ orglens sync --org PaddlePaddle --since 2024-01-01

    Fetch the whole history of one repository:
        $ orglens onboard PaddlePaddle/Paddle

    List community developers of a repository:
        $ orglens community PaddlePaddle/Paddle --json

CONFIGURATION
    Orglens reads configuration from:
      1. ~/.config/orglens/config.toml (or $XDG_CONFIG_HOME/orglens/config.toml)
      2. ./orglens.toml
      3. Environment variables (ORGLENS_* prefix, e.g., ORGLENS_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    ORGLENS_GITHUB_TOKEN      GitHub personal access token (falls back to GITHUB_TOKEN)
    ORGLENS_SYNC_ORGS         Comma-separated organizations to mirror
    RUST_LOG                  Log filter (default: orglens=info,orglens_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every window from the checkpoint up to a day
    Sync {
        /// First day to sync when no checkpoint exists (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Last day to sync (YYYY-MM-DD, default today)
        #[arg(long)]
        until: Option<NaiveDate>,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Refresh the repository collection only
    Repos {
        /// Skip repositories created after this day (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Fetch every issue and pull request of one repository
    Onboard {
        /// Repository full name, e.g. PaddlePaddle/Paddle
        repo: String,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// List community (non-internal) developers of a repository
    Community {
        /// Repository full name, e.g. PaddlePaddle/Paddle
        repo: String,

        /// Print a JSON array instead of one name per line
        #[arg(long)]
        json: bool,

        /// Data directory (default from config)
        #[arg(short = 'd', long)]
        data_dir: Option<PathBuf>,
    },
    /// Recompute module weights from the stored commits
    Weights {
        /// Data directory (default from config)
        #[arg(short = 'd', long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("orglens=info,orglens_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    shutdown::run_until_interrupted(async {
        match cli.command {
            Commands::Sync {
                since,
                until,
                sync_opts,
            } => commands::sync::handle_sync(&config, sync_opts, since, until).await,
            Commands::Repos { until, sync_opts } => {
                commands::sync::handle_repos(&config, sync_opts, until).await
            }
            Commands::Onboard { repo, sync_opts } => {
                commands::sync::handle_onboard(&config, sync_opts, &repo).await
            }
            Commands::Community {
                repo,
                json,
                data_dir,
            } => {
                let opts = CommonSyncOptions {
                    data_dir,
                    ..CommonSyncOptions::default()
                };
                commands::report::handle_community(&config, opts, &repo, json).await
            }
            Commands::Weights { data_dir } => {
                let opts = CommonSyncOptions {
                    data_dir,
                    ..CommonSyncOptions::default()
                };
                commands::report::handle_weights(&config, opts).await
            }
        }
    })
    .await
}
