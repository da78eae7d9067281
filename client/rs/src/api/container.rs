use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;

use crate::entities::container::{ContainerConfig, ContainerListFilter};

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListContainersRequest {
  #[serde(flatten)]
  pub filter: ContainerListFilter,
}

/// Ad hoc container creation (`POST /api/containers`), outside any
/// worktree's lifecycle: the caller supplies the full config directly
/// instead of it being derived from a manifest.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainerRequest {
  #[serde(flatten)]
  pub config: ContainerConfig,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetContainerRequest {
  pub id: String,
}

#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerActionKind {
  Start,
  Stop,
  Remove,
}

/// `id` is redundant with the `{id}` path segment on the HTTP route;
/// it's kept so the same struct doubles as the in-process call shape
/// the CLI uses when running the server itself (spec §4.9).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerActionRequest {
  #[serde(default)]
  pub id: String,
  pub action: ContainerActionKind,
  #[serde(default)]
  pub force: bool,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerLogsRequest {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub follow: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tail: Option<usize>,
}
