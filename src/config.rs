use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub similarity: SimilarityConfig,
  /// Write logs to daily files in this directory instead of stderr
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the hosted backend (e.g. "https://project.supabase.co")
  pub url: String,
  #[serde(default = "default_table")]
  pub table: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_table() -> String {
  "tickets".to_string()
}

fn default_timeout_secs() -> u64 {
  15
}

/// Freshness windows and batch sizing for the ticket cache.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  pub memory_ttl_secs: i64,
  pub persisted_ttl_secs: i64,
  /// Smallest batch requested from the remote source on a miss
  pub min_batch: usize,
  /// Fixed key for the persisted snapshot; derived from the remote when unset
  pub snapshot_key: Option<String>,
  /// SQLite file for the persisted tier (default: $XDG_DATA_HOME/ticketdesk/cache.db)
  pub database: Option<PathBuf>,
  /// Disable the persisted tier entirely
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      memory_ttl_secs: 60 * 60,
      persisted_ttl_secs: 24 * 60 * 60,
      min_batch: 30,
      snapshot_key: None,
      database: None,
      persist: true,
    }
  }
}

impl CacheConfig {
  pub fn memory_ttl(&self) -> Duration {
    Duration::seconds(self.memory_ttl_secs)
  }

  pub fn persisted_ttl(&self) -> Duration {
    Duration::seconds(self.persisted_ttl_secs)
  }
}

/// Scoring and scheduling knobs for duplicate detection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimilarityConfig {
  /// Matches must score strictly above this
  pub threshold: f64,
  pub max_matches: usize,
  /// Tokens shorter than this (in characters) are ignored
  pub min_token_chars: usize,
  /// Drafts shorter than this produce no matches
  pub min_draft_chars: usize,
  pub recent_window_days: i64,
  /// Matches inside the recent window needed to call an issue recurring
  pub recurring_min: usize,
  /// How many recent tickets to score against
  pub working_set: usize,
  pub debounce_ms: u64,
  pub settle_ms: u64,
}

impl Default for SimilarityConfig {
  fn default() -> Self {
    Self {
      threshold: 0.3,
      max_matches: 5,
      min_token_chars: 4,
      min_draft_chars: 10,
      recent_window_days: 30,
      recurring_min: 3,
      working_set: 100,
      debounce_ms: 1000,
      settle_ms: 800,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ticketdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ticketdesk/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/ticketdesk/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("ticketdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ticketdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the backend API key from the environment.
  ///
  /// Checks TICKETDESK_API_KEY first, then SUPABASE_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("TICKETDESK_API_KEY")
      .or_else(|_| std::env::var("SUPABASE_KEY"))
      .map_err(|_| {
        eyre!(
          "Backend API key not found. Set TICKETDESK_API_KEY or SUPABASE_KEY environment variable."
        )
      })
  }
}
