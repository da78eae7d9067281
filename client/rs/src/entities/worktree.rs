use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;
use uuid::Uuid;

/// Lifecycle state of a [Worktree]. See spec §3 for the transition rules
/// the Worktree Orchestrator enforces.
#[typeshare]
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorktreeStatus {
  Stopped,
  Starting,
  Running,
  Stopping,
  Error,
}

impl WorktreeStatus {
  /// Terminal statuses are the ones the boot reconciliation pass (§4.6)
  /// drives every row towards.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      WorktreeStatus::Running | WorktreeStatus::Stopped | WorktreeStatus::Error
    )
  }
}

/// A git worktree bound to a repository, plus the containers the
/// orchestrator owns for it (app container, AI sidecar) and the shared
/// services it references (owned by the [crate::entities::service::ServiceDescriptor]
/// registry, not by the worktree).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
  pub id: Uuid,
  pub repository_id: Uuid,
  pub name: String,
  pub branch: String,
  pub fs_path: String,
  pub status: WorktreeStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorktreeListFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository_id: Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<WorktreeStatus>,
}

/// Returned by `create_worktree`: the row plus the audit trail of shell
/// commands run (git worktree add, `worktree_init`) (§ AMBIENT STACK /
/// Shell command execution).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorktreeResult {
  pub worktree: Worktree,
  pub logs: Vec<crate::entities::log::CommandLog>,
}
