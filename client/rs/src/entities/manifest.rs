use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Image the AI sidecar runs when a repository manifest doesn't override
/// it (§ SUPPLEMENTAL / AI sidecar default image).
pub const DEFAULT_AI_IMAGE: &str = "ghcr.io/vibeman/sidecar:latest";

/// Default directory (relative to the main repo's parent) new worktrees
/// are created under when `worktrees.directory` is absent.
pub const DEFAULT_WORKTREES_DIR: &str = "worktrees";

/// The per-repository manifest (§6), read-only to the orchestrator.
/// Deserialized from TOML at the repository root.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
  pub repository: RepositorySection,
  #[serde(default)]
  pub git: GitSection,
  #[serde(default)]
  pub worktrees: WorktreesSection,
  #[serde(default)]
  pub container: ContainerSection,
  /// Shared-service dependencies, keyed by service name (looked up in
  /// the global service catalog, §6).
  #[serde(default)]
  pub services: HashMap<String, ServiceRequirement>,
  #[serde(default)]
  pub runtime: RuntimeSection,
  #[serde(default)]
  pub setup: SetupSection,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositorySection {
  pub name: String,
  #[serde(default)]
  pub description: String,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitSection {
  #[serde(default)]
  pub repo_url: String,
  #[serde(default)]
  pub default_branch: Option<String>,
  #[serde(default)]
  pub worktree_prefix: String,
  #[serde(default)]
  pub auto_sync: bool,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreesSection {
  #[serde(default = "default_worktrees_directory")]
  pub directory: String,
}

impl Default for WorktreesSection {
  fn default() -> Self {
    Self {
      directory: default_worktrees_directory(),
    }
  }
}

fn default_worktrees_directory() -> String {
  DEFAULT_WORKTREES_DIR.to_string()
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSection {
  /// Path to the compose file, relative to the repository root.
  #[serde(default)]
  pub compose_file: String,
  /// Subset of compose services to start. Empty means all.
  #[serde(default)]
  pub services: Vec<String>,
  /// Post-start setup commands run sequentially inside the app container.
  #[serde(default)]
  pub setup: Vec<String>,
  /// Environment overlay applied on top of the compose file's own env.
  #[serde(default)]
  pub environment: HashMap<String, String>,
  #[serde(default)]
  pub ai: AiSection,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSection {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  #[serde(default)]
  pub env: HashMap<String, String>,
  /// Extra bind mounts, `host -> container`.
  #[serde(default)]
  pub volumes: HashMap<String, String>,
}

impl Default for AiSection {
  fn default() -> Self {
    Self {
      enabled: true,
      image: None,
      env: HashMap::new(),
      volumes: HashMap::new(),
    }
  }
}

impl AiSection {
  pub fn image(&self) -> &str {
    self.image.as_deref().unwrap_or(DEFAULT_AI_IMAGE)
  }
}

fn default_true() -> bool {
  true
}

/// Whether a shared-service dependency is required (start fails the
/// worktree on acquisition failure) or optional (logged and ignored).
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceRequirement {
  #[serde(default)]
  pub required: bool,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSection {
  #[serde(default)]
  pub r#type: RuntimeType,
}

#[typeshare]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
  #[default]
  Docker,
  Apple,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupSection {
  #[serde(default)]
  pub worktree_init: Option<String>,
  #[serde(default)]
  pub container_init: Vec<String>,
}

/// Entries of the global shared-service catalog (`services.toml`, §6),
/// keyed by service name.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
  pub compose_file: String,
  pub service: String,
  #[serde(default)]
  pub description: String,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceCatalog {
  #[serde(flatten)]
  pub services: HashMap<String, ServiceCatalogEntry>,
}
