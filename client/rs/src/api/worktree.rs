use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

use crate::entities::worktree::WorktreeListFilter;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorktreeRequest {
  pub repository_id: Uuid,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_branch: Option<String>,
  #[serde(default)]
  pub auto_start: bool,
  #[serde(default)]
  pub skip_setup: bool,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListWorktreesRequest {
  #[serde(flatten)]
  pub filter: WorktreeListFilter,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorktreeRequest {
  pub id: Uuid,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorktreeRequest {
  pub id: Uuid,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopWorktreeRequest {
  pub id: Uuid,
}

/// `id` is redundant with the `{id}` path segment on the HTTP route;
/// it's kept so the same struct doubles as the in-process call shape
/// the CLI uses when running the server itself (spec §4.9).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveWorktreeRequest {
  #[serde(default)]
  pub id: Uuid,
  #[serde(default)]
  pub force: bool,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorktreeLogsRequest {
  #[serde(default)]
  pub id: Uuid,
  #[serde(default)]
  pub follow: bool,
  #[serde(default = "default_tail")]
  pub tail: usize,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container: Option<String>,
}

fn default_tail() -> usize {
  200
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearWorktreeLogsRequest {
  #[serde(default)]
  pub id: Uuid,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container: Option<String>,
}
