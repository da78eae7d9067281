use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;

/// A single command execution's captured output (§ AMBIENT STACK /
/// Shell command execution), reused wherever the orchestrator shells
/// out: git worktree ops, manifest setup commands, post-start `exec`.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLog {
  pub stage: String,
  pub command: String,
  pub success: bool,
  pub stdout: String,
  pub stderr: String,
  pub start_ts: DateTime<Utc>,
  pub end_ts: DateTime<Utc>,
}

impl CommandLog {
  pub fn is_success(logs: &[CommandLog]) -> bool {
    logs.iter().all(|l| l.success)
  }
}

#[typeshare]
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
  Debug,
  Info,
  Warn,
  Error,
  Fatal,
}

impl Default for LogLevel {
  fn default() -> Self {
    LogLevel::Info
  }
}

/// One annotated log line in a worktree's ring buffer (§4.7).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub source_container: String,
  pub message: String,
  #[serde(default)]
  pub labels: indexmap::IndexMap<String, String>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
  pub entries: Vec<LogEntry>,
  /// Number of entries dropped from the ring due to capacity (not the
  /// same as follow-stream backpressure drops, which are synthesized
  /// as their own `warn` entry per §4.7).
  pub truncated: bool,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSearchQuery {
  pub query: String,
  #[serde(default)]
  pub regex: bool,
  #[serde(default)]
  pub case_sensitive: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub since: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub until: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub containers: Option<Vec<String>>,
  #[serde(default = "default_search_limit")]
  pub limit: usize,
}

fn default_search_limit() -> usize {
  500
}
