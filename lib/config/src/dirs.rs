use std::path::PathBuf;

/// Resolves vibeman's three on-disk roots (spec §6 "State directory" /
/// "Data directory"), honoring `XDG_CONFIG_HOME` / `XDG_DATA_HOME` /
/// `XDG_STATE_HOME` when set and falling back to the platform defaults
/// the `dirs` crate resolves otherwise.
pub struct VibemanDirs;

impl VibemanDirs {
  pub fn config_dir() -> PathBuf {
    xdg_or("XDG_CONFIG_HOME", dirs::config_dir).join("vibeman")
  }

  pub fn data_dir() -> PathBuf {
    xdg_or("XDG_DATA_HOME", dirs::data_dir).join("vibeman")
  }

  pub fn state_dir() -> PathBuf {
    // `dirs` has no portable XDG_STATE_HOME fallback; fall back to the
    // data dir, fine for a local-only, single-operator daemon.
    xdg_or("XDG_STATE_HOME", dirs::data_dir).join("vibeman")
  }

  pub fn repos_dir() -> PathBuf {
    Self::data_dir().join("repos")
  }
}

fn xdg_or(var: &str, fallback: fn() -> Option<PathBuf>) -> PathBuf {
  std::env::var(var)
    .map(PathBuf::from)
    .ok()
    .or_else(fallback)
    .unwrap_or_else(|| PathBuf::from("."))
}
