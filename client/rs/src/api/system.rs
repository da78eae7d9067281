use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Response body for `GET /health`. Liveness only — does not touch the
/// store or the container runtime.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
  pub status: &'static str,
  pub version: &'static str,
}

impl Default for HealthResponse {
  fn default() -> Self {
    Self { status: "ok", version: env!("CARGO_PKG_VERSION") }
  }
}

/// Response body for `GET /api/status`. Readiness: store open,
/// container runtime reachable, count of tracked repositories/worktrees.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
  pub store_ready: bool,
  pub runtime_ready: bool,
  pub repository_count: i64,
  pub worktree_count: i64,
  pub active_service_count: i64,
}

/// Response body for `GET /config`. A redacted view of the running
/// manifest/config, never the bearer token.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
  pub config_dir: String,
  pub data_dir: String,
  pub state_dir: String,
  pub bind_address: String,
  pub runtime: String,
}
