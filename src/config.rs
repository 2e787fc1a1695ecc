use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".pr-pipeline.toml";

/// Top-level configuration loaded from .pr-pipeline.toml.
/// All fields are optional — with no file the pipeline runs on built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub search settings and the repositories to snapshot
    #[serde(default)]
    pub github: GitHubConfig,

    /// Where the raw and refined layers live on disk
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Base URL of the REST API; the search endpoint is appended to it.
    pub api_url: String,
    /// Value of the X-GitHub-Api-Version header.
    pub api_version: String,
    pub user_agent: String,
    /// Repositories in `owner/repo` form, fetched in this order.
    pub repos: Vec<String>,
    /// Size of the trailing creation-date window, in days.
    pub lookback_days: i64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            api_version: "2022-11-28".to_string(),
            user_agent: "pr-pipeline".to_string(),
            repos: vec![
                "octocat/Spoon-Knife".to_string(),
                "octocat/Hello-World".to_string(),
            ],
            lookback_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving one raw JSON file per (repository, run).
    pub raw_dir: PathBuf,
    /// CSV file overwritten by every refine run.
    pub refined_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/src"),
            refined_path: PathBuf::from("data/agg/pull_requests"),
        }
    }
}

impl Config {
    /// Load configuration from .pr-pipeline.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Glob covering every raw file ever written, not just the current run's.
    pub fn raw_glob(&self) -> String {
        format!("{}/*", self.storage.raw_dir.display())
    }
}
