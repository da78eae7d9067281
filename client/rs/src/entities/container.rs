use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;

/// Label keys emitted on every container vibeman creates (§4.4/§6).
/// Listing "what it created" across restarts is always done by
/// filtering on these, never by name-guessing.
pub mod labels {
  pub const REPOSITORY: &str = "vibeman.repository";
  pub const WORKTREE: &str = "vibeman.worktree";
  pub const TYPE: &str = "vibeman.type";
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerKind {
  App,
  Service,
  Ai,
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ContainerState {
  Created,
  Running,
  Paused,
  Restarting,
  Removing,
  Exited,
  Dead,
  Unknown,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
  pub host: u16,
  pub container: u16,
  #[serde(default = "default_protocol")]
  pub protocol: String,
}

fn default_protocol() -> String {
  "tcp".to_string()
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountSpec {
  pub host_path: String,
  pub container_path: String,
  #[serde(default)]
  pub read_only: bool,
}

/// Input to [crate::entities::container::ContainerConfig] consumers
/// implementing the Container Runtime Port (§4.4).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
  pub name: String,
  pub image: String,
  #[serde(default)]
  pub command: Option<Vec<String>>,
  #[serde(default)]
  pub env: HashMap<String, String>,
  #[serde(default)]
  pub mounts: Vec<MountSpec>,
  #[serde(default)]
  pub ports: Vec<PortMapping>,
  #[serde(default)]
  pub labels: HashMap<String, String>,
  /// Whether the container should be created with an interactive
  /// tty/stdin attached (used for the AI sidecar).
  #[serde(default)]
  pub attach_interactive: bool,
  #[serde(default)]
  pub working_dir: Option<String>,
}

/// Everything the orchestrator needs back about a container it owns,
/// per §4.4 ("Every returned container carries ...").
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
  pub id: String,
  pub name: String,
  pub image: String,
  pub state: ContainerState,
  pub labels: HashMap<String, String>,
  pub ports: Vec<PortMapping>,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerListFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub worktree: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<ContainerKind>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub state: Option<ContainerState>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
  pub exit_code: i64,
  pub stdout: String,
  pub stderr: String,
}

/// Deterministic container names for the two containers a worktree
/// exclusively owns (§3): `app` named `(repository, worktree)`, the AI
/// sidecar suffixed `-ai`.
pub fn app_container_name(repository: &str, worktree: &str) -> String {
  format!("vibeman-{repository}-{worktree}")
}

pub fn ai_container_name(repository: &str, worktree: &str) -> String {
  format!("{}-ai", app_container_name(repository, worktree))
}

/// Deterministic container name for a shared service: one instance
/// system-wide, independent of any worktree/repository.
pub fn service_container_name(service_name: &str) -> String {
  format!("vibeman-svc-{service_name}")
}
