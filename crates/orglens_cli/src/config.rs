//! Configuration file support for orglens.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `ORGLENS_`, e.g., `ORGLENS_GITHUB_TOKEN`)
//! 3. Config file (~/.config/orglens/config.toml or ./orglens.toml)
//! 4. Built-in defaults
//!
//! The data directory defaults to `~/.local/share/orglens` on Linux if not
//! explicitly configured.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use ORGLENS_GITHUB_TOKEN env var
//! graphql_url = "https://api.github.com/graphql"
//! rest_url = "https://api.github.com"
//!
//! [sync]
//! orgs = ["PaddlePaddle"]
//! data_dir = "/srv/orglens"
//! workers = 9
//! window_days = 7
//! initial_since = "2024-01-01"
//!
//! [identity]
//! internal_markers = ["baidu.com", "paddle"]
//! ```

use std::path::PathBuf;

use chrono::NaiveDate;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use orglens::github::{DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL};
use orglens::identity::DEFAULT_INTERNAL_MARKERS;
use orglens::sync::{DEFAULT_ENRICH_WORKERS, DEFAULT_WINDOW_DAYS};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Default sync options.
    pub sync: SyncConfig,
    /// Developer identity options.
    pub identity: IdentitySection,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via ORGLENS_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// GraphQL endpoint.
    pub graphql_url: String,
    /// REST API base URL.
    pub rest_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Organizations to mirror.
    /// `ORGLENS_SYNC_ORGS` takes a comma-separated list.
    pub orgs: Vec<String>,
    /// Where collections and the checkpoint are stored.
    pub data_dir: Option<PathBuf>,
    /// Concurrent enrichment / labeling tasks.
    pub workers: usize,
    /// Length of one sync window in days.
    pub window_days: i64,
    /// First day to sync when no checkpoint exists.
    pub initial_since: Option<NaiveDate>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            orgs: Vec::new(),
            data_dir: None,
            workers: DEFAULT_ENRICH_WORKERS,
            window_days: DEFAULT_WINDOW_DAYS,
            initial_since: None,
        }
    }
}

/// Developer identity options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    /// Email substrings that mark organization-internal developers.
    pub internal_markers: Vec<String>,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            internal_markers: DEFAULT_INTERNAL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/orglens/config.toml)
    /// 3. Local config file (./orglens.toml)
    /// 4. Environment variables with ORGLENS_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(config_path) = Self::default_config_path()
            && config_path.exists()
        {
            tracing::debug!("Loading config from {:?}", config_path);
            builder = builder.add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("orglens.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./orglens.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., ORGLENS_GITHUB_TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("ORGLENS")
                .separator("_")
                .list_separator(",")
                .with_list_parse_key("sync.orgs")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the GitHub token, falling back to the conventional `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Get the data directory, falling back to the platform data directory
    /// and then to `./data`.
    pub fn data_dir(&self) -> PathBuf {
        self.sync
            .data_dir
            .clone()
            .or_else(Self::default_data_dir)
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "orglens").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "orglens").map(|dirs| dirs.data_dir().to_path_buf())
    }
}
