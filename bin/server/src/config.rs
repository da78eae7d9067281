//! Server configuration (spec §6 "On-disk layout" / "Environment
//! variables consumed"): `config.toml` in the XDG config directory,
//! with a handful of env var overrides for the values an operator
//! most commonly wants to override without editing the file.

use std::path::PathBuf;

use config::VibemanDirs;
use serde::{Deserialize, Serialize};

use crate::registry::DEFAULT_DEBOUNCE_SECS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  #[serde(default)]
  pub logging: logger::LogConfig,
  /// Origins allowed to open the WebSocket gateways (spec §4.8). Empty
  /// means same-origin only.
  #[serde(default)]
  pub allowed_origins: Vec<String>,
  /// Quiescence window before a service with `ref_count == 0` is
  /// actually stopped (spec §4.5), in seconds.
  #[serde(default = "default_debounce_secs")]
  pub service_debounce_secs: u64,
  /// Per-worktree log ring capacity (spec §4.7).
  #[serde(default = "default_log_ring_capacity")]
  pub log_ring_capacity: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      logging: logger::LogConfig::default(),
      allowed_origins: Vec::new(),
      service_debounce_secs: default_debounce_secs(),
      log_ring_capacity: default_log_ring_capacity(),
    }
  }
}

fn default_bind_address() -> String {
  "127.0.0.1:7070".to_string()
}

fn default_debounce_secs() -> u64 {
  DEFAULT_DEBOUNCE_SECS
}

fn default_log_ring_capacity() -> usize {
  10_000
}

impl ServerConfig {
  /// Loads `config.toml` from the XDG config directory, falling back to
  /// defaults if the file does not exist. A malformed file is still an
  /// error: an operator who wrote one wants to know it didn't parse.
  pub fn load() -> anyhow::Result<Self> {
    let path = Self::path();
    if !path.is_file() {
      return Ok(Self::default());
    }
    config::load_config_file(&path).map_err(Into::into)
  }

  pub fn path() -> PathBuf {
    VibemanDirs::config_dir().join("config.toml")
  }

  pub fn token_path() -> PathBuf {
    VibemanDirs::config_dir().join("token")
  }

  pub fn service_catalog_path() -> PathBuf {
    VibemanDirs::config_dir().join("services.toml")
  }

  pub fn state_db_path() -> PathBuf {
    VibemanDirs::state_dir().join("state.db")
  }

  pub fn log_archive_dir() -> PathBuf {
    VibemanDirs::state_dir().join("logs")
  }

  pub fn repos_dir() -> PathBuf {
    VibemanDirs::repos_dir()
  }
}
