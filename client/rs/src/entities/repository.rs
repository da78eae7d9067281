use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// A repository known to vibeman: a stable id, a local clone path, and
/// (optionally) the remote it was cloned from. Repositories own their
/// worktrees; a Repository with any worktree rows cannot be removed.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
  pub id: Uuid,
  pub name: String,
  /// Absolute path to the bare/main clone on disk.
  pub local_path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub git_url: Option<String>,
  #[serde(default)]
  pub description: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryListItem {
  pub id: Uuid,
  pub name: String,
  pub local_path: String,
  pub worktree_count: i64,
}
