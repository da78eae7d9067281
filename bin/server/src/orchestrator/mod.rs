//! The Worktree Orchestrator (spec §4.6): the central component, wiring
//! together the State Store, Git Subsystem, Compose Adapter, Container
//! Runtime Port, Service Registry and Log Aggregator into the six
//! lifecycle operations, each an ordered sequence of steps with rollback
//! on failure, serialized per entity by a small per-id mailbox.

mod mailbox;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use store::{NewRepository, NewWorktree, Store};
use uuid::Uuid;
use vibeman_client::entities::container::{
  ContainerConfig, ContainerKind, ContainerListFilter, ContainerState, MountSpec, labels, ai_container_name,
  app_container_name,
};
use vibeman_client::entities::manifest::{Manifest, ServiceCatalog};
use vibeman_client::entities::repository::{Repository, RepositoryListItem};
use vibeman_client::entities::worktree::{CreateWorktreeResult, Worktree, WorktreeListFilter, WorktreeStatus};
use vibeman_client::error::{ConfigErrorKind, Error, GitErrorKind, ValidationErrorKind};

use crate::compose;
use crate::docker::ContainerRuntime;
use crate::logs::LogAggregator;
use crate::registry::ServiceRegistry;

pub use mailbox::Mailboxes;

const MANIFEST_FILE_NAME: &str = "vibeman.toml";
const APP_STOP_TIMEOUT_SECS: i32 = 30;

pub struct Orchestrator {
  store: Arc<Store>,
  runtime: Arc<dyn ContainerRuntime>,
  registry: Arc<ServiceRegistry>,
  logs: Arc<LogAggregator>,
  mailboxes: Mailboxes,
  repos_dir: PathBuf,
}

impl Orchestrator {
  pub fn new(
    store: Arc<Store>,
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<ServiceRegistry>,
    logs: Arc<LogAggregator>,
    repos_dir: PathBuf,
  ) -> Self {
    Self {
      store,
      runtime,
      registry,
      logs,
      mailboxes: Mailboxes::new(),
      repos_dir,
    }
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  pub fn registry(&self) -> &ServiceRegistry {
    &self.registry
  }

  pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
    self.runtime.clone()
  }

  pub fn log_aggregator(&self) -> &LogAggregator {
    &self.logs
  }

  fn manifest_path(fs_path: &str) -> PathBuf {
    Path::new(fs_path).join(MANIFEST_FILE_NAME)
  }

  fn load_manifest(fs_path: &str) -> Result<Manifest, Error> {
    let path = Self::manifest_path(fs_path);
    if !path.is_file() {
      return Err(Error::Config {
        kind: ConfigErrorKind::NotFound,
        message: format!("manifest not found at {}", path.display()),
        source: None,
      });
    }
    config::load_config_file(&path).map_err(|e| Error::Config {
      kind: ConfigErrorKind::Parse,
      message: format!("failed to parse manifest at {}", path.display()),
      source: Some(anyhow::anyhow!(e.to_string())),
    })
  }

  /// `add_repository` (§4.6): validates the path exists, normalizes it,
  /// inserts the row. No container or git side-effects.
  pub async fn add_repository(
    &self,
    name: String,
    path: String,
    git_url: Option<String>,
    description: Option<String>,
  ) -> Result<Repository, Error> {
    let normalized = tokio::fs::canonicalize(&path)
      .await
      .map_err(|_| Error::validation(ValidationErrorKind::InvalidPath, format!("path {path} does not exist")))?;

    self.store.create_repository(NewRepository {
      name,
      local_path: normalized.to_string_lossy().into_owned(),
      git_url,
      description: description.unwrap_or_default(),
    })
  }

  /// `remove_repository` (§4.6): refuses if any worktree row references it.
  pub async fn remove_repository(&self, id: Uuid) -> Result<(), Error> {
    let worktrees = self.store.list_worktrees(&WorktreeListFilter {
      repository_id: Some(id),
      status: None,
    })?;
    if !worktrees.is_empty() {
      return Err(Error::conflict(format!(
        "repository {id} has {} worktree(s), remove them first",
        worktrees.len()
      )));
    }
    self.store.delete_repository(id)
  }

  pub fn list_repositories(&self) -> Result<Vec<RepositoryListItem>, Error> {
    self.store.list_repositories()
  }

  pub fn get_repository(&self, id: Uuid) -> Result<Repository, Error> {
    self.store.get_repository(id)
  }

  pub fn list_worktrees(&self, filter: &WorktreeListFilter) -> Result<Vec<Worktree>, Error> {
    self.store.list_worktrees(filter)
  }

  pub fn get_worktree(&self, id: Uuid) -> Result<Worktree, Error> {
    self.store.get_worktree(id)
  }

  /// `create_worktree` (§4.6).
  pub async fn create_worktree(
    &self,
    repository_id: Uuid,
    name: String,
    branch: Option<String>,
    auto_start: bool,
    skip_setup: bool,
  ) -> Result<CreateWorktreeResult, Error> {
    let mailbox = self.mailboxes.get_or_create(repository_id);
    let this = self;
    mailbox
      .run(move || async move {
        this
          .create_worktree_inner(repository_id, name, branch, auto_start, skip_setup)
          .await
      })
      .await
  }

  async fn create_worktree_inner(
    &self,
    repository_id: Uuid,
    name: String,
    branch: Option<String>,
    auto_start: bool,
    skip_setup: bool,
  ) -> Result<CreateWorktreeResult, Error> {
    let repository = self.store.get_repository(repository_id)?;
    let (main_repo, _clone_logs) =
      git::ensure_main_repo(&repository.local_path, &repository.name, &self.repos_dir).await?;

    // The manifest lives in the main repo's worktree only once the first
    // worktree exists; absent that, fall back to defaults for naming.
    let worktrees_dir = Self::load_manifest(main_repo.to_string_lossy().as_ref())
      .map(|m| m.worktrees.directory)
      .unwrap_or_else(|_| vibeman_client::entities::manifest::DEFAULT_WORKTREES_DIR.to_string());

    let base_dir = main_repo
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| main_repo.clone());
    let fs_path = base_dir.join(&worktrees_dir).join(&name);
    let branch_name = branch.unwrap_or_else(|| name.clone());

    // Uniqueness on (repository_id, name) and fs_path is enforced by the
    // schema; a collision surfaces as `Error::conflict` via the store's
    // constraint-violation mapping.
    let worktree = self.store.create_worktree(NewWorktree {
      repository_id,
      name: name.clone(),
      branch: branch_name.clone(),
      fs_path: fs_path.to_string_lossy().into_owned(),
      status: WorktreeStatus::Stopped,
    })?;

    let mut logs = Vec::new();
    match git::create_worktree(&main_repo, &branch_name, &fs_path).await {
      Ok(create_logs) => logs.extend(create_logs),
      Err(e) => {
        let _ = self.store.delete_worktree(worktree.id);
        return Err(e);
      }
    }

    if !skip_setup {
      if let Ok(manifest) = Self::load_manifest(&worktree.fs_path) {
        if let Some(init) = &manifest.setup.worktree_init {
          if let Some(log) = command::run_vibeman_command_multiline("worktree init", Some(fs_path.as_path()), init).await {
            logs.push(log);
          }
        }
      }
    }

    if auto_start {
      self.start_worktree(worktree.id).await?;
    }

    let worktree = self.store.get_worktree(worktree.id)?;
    Ok(CreateWorktreeResult { worktree, logs })
  }

  /// `start_worktree` (§4.6), ordered with rollback.
  pub async fn start_worktree(&self, id: Uuid) -> Result<Worktree, Error> {
    let mailbox = self.mailboxes.get_or_create(id);
    let this = self;
    mailbox
      .run(move || async move { this.start_worktree_inner(id).await })
      .await
  }

  async fn start_worktree_inner(&self, id: Uuid) -> Result<Worktree, Error> {
    let worktree = self.store.get_worktree(id)?;
    let manifest = Self::load_manifest(&worktree.fs_path)?;
    self.store.update_worktree_status(id, WorktreeStatus::Starting)?;

    let repository = self.store.get_repository(worktree.repository_id)?;
    let holder = worktree.id.to_string();

    // Services first.
    let mut acquired = Vec::new();
    for (service_name, requirement) in &manifest.services {
      match self.registry.acquire(service_name, &holder).await {
        Ok(()) => acquired.push(service_name.clone()),
        Err(e) if requirement.required => {
          for acquired_name in &acquired {
            let _ = self.registry.release(acquired_name, &holder).await;
          }
          self.store.update_worktree_status(id, WorktreeStatus::Error)?;
          return Err(e);
        }
        Err(_) => {
          self
            .warn(id, format!("optional service {service_name} failed to start, continuing"))
            .await;
        }
      }
    }

    // App container next.
    let app_name = app_container_name(&repository.name, &worktree.name);
    if let Err(e) = self.ensure_app_container(&app_name, &repository.name, &worktree, &manifest).await {
      for acquired_name in &acquired {
        let _ = self.registry.release(acquired_name, &holder).await;
      }
      self.store.update_worktree_status(id, WorktreeStatus::Error)?;
      return Err(e);
    }

    // Post-start setup: run container_init then container.setup sequentially.
    let setup_commands = manifest
      .setup
      .container_init
      .iter()
      .chain(manifest.container.setup.iter());
    for cmd in setup_commands {
      let argv = vec!["/bin/sh".to_string(), "-c".to_string(), cmd.clone()];
      match self.runtime.exec(&app_name, &argv, None, Duration::from_secs(120)).await {
        Ok(outcome) if outcome.0.exit_code == 0 => {}
        Ok(outcome) => {
          self
            .warn(id, format!("setup command {cmd:?} exited {}: {}", outcome.0.exit_code, outcome.0.stderr))
            .await;
          break;
        }
        Err(e) => {
          self.warn(id, format!("setup command {cmd:?} failed: {e}")).await;
          break;
        }
      }
    }

    // AI sidecar (best-effort): failures never fail the worktree.
    if manifest.container.ai.enabled {
      if let Err(e) = self.ensure_ai_sidecar(&repository.name, &worktree, &manifest).await {
        self.warn(id, format!("AI sidecar failed to start: {e}")).await;
      } else {
        self
          .logs
          .subscribe(id, ai_container_name(&repository.name, &worktree.name), self.runtime.clone())
          .await;
      }
    }

    self.logs.subscribe(id, app_name.clone(), self.runtime.clone()).await;
    for service_name in &acquired {
      self
        .logs
        .subscribe(id, vibeman_client::entities::container::service_container_name(service_name), self.runtime.clone())
        .await;
    }

    self.store.update_worktree_status(id, WorktreeStatus::Running)?;
    self.store.get_worktree(id)
  }

  /// §9 "Port-conflict handling": the compose spec leaves overlapping
  /// published ports across worktrees undetected, letting the runtime
  /// fail opaquely on the second start. Surfacing it here turns that
  /// into a named `Validation::InvalidState` before any container is
  /// touched.
  async fn check_port_conflicts(&self, app_name: &str, ports: &[(u16, u16, String)]) -> Result<(), Error> {
    if ports.is_empty() {
      return Ok(());
    }
    let running = self
      .runtime
      .list(&ContainerListFilter {
        kind: Some(ContainerKind::App),
        state: Some(ContainerState::Running),
        ..Default::default()
      })
      .await?;

    for container in &running {
      if container.name == app_name {
        continue;
      }
      for existing_port in &container.ports {
        if ports.iter().any(|(host, _, protocol)| *host == existing_port.host && *protocol == existing_port.protocol) {
          return Err(Error::validation(
            ValidationErrorKind::InvalidState,
            format!("port {} already published by {}", existing_port.host, container.name),
          ));
        }
      }
    }
    Ok(())
  }

  async fn ensure_app_container(
    &self,
    app_name: &str,
    repository_name: &str,
    worktree: &Worktree,
    manifest: &Manifest,
  ) -> Result<(), Error> {
    if self.runtime.get_by_name(app_name).await?.is_some() {
      return self.runtime.start(app_name).await;
    }

    let compose_path = Path::new(&worktree.fs_path).join(&manifest.container.compose_file);
    let parsed = compose::parse_compose_file(&compose_path)?;
    let service_names = if manifest.container.services.is_empty() {
      parsed.services.keys().cloned().collect::<Vec<_>>()
    } else {
      manifest.container.services.clone()
    };
    let primary = service_names
      .first()
      .ok_or_else(|| Error::validation(ValidationErrorKind::InvalidState, "manifest names no compose service"))?;
    let service = parsed.service(primary)?;

    let image = service
      .image
      .clone()
      .ok_or_else(|| Error::validation(ValidationErrorKind::InvalidState, format!("service {primary} has no image")))?;

    self.check_port_conflicts(app_name, &service.ports).await?;

    let mut env = service.env_map.clone();
    env.extend(manifest.container.environment.clone());

    let mut labels_map = HashMap::new();
    labels_map.insert(labels::REPOSITORY.to_string(), repository_name.to_string());
    labels_map.insert(labels::WORKTREE.to_string(), worktree.name.clone());
    labels_map.insert(labels::TYPE.to_string(), ContainerKind::App.as_ref().to_string());

    let config = ContainerConfig {
      name: app_name.to_string(),
      image,
      command: service.command.clone(),
      env,
      mounts: service
        .volumes
        .iter()
        .map(|(host, container, read_only)| MountSpec {
          host_path: host.clone(),
          container_path: container.clone(),
          read_only: *read_only,
        })
        .collect(),
      ports: service
        .ports
        .iter()
        .map(|(host, container, protocol)| vibeman_client::entities::container::PortMapping {
          host: *host,
          container: *container,
          protocol: protocol.clone(),
        })
        .collect(),
      labels: labels_map,
      attach_interactive: false,
      working_dir: service.working_dir.clone(),
    };

    self.runtime.create(&config).await?;
    self.runtime.start(app_name).await
  }

  async fn ensure_ai_sidecar(&self, repository_name: &str, worktree: &Worktree, manifest: &Manifest) -> Result<(), Error> {
    let ai_name = ai_container_name(repository_name, &worktree.name);
    if self.runtime.get_by_name(&ai_name).await?.is_some() {
      return self.runtime.start(&ai_name).await;
    }

    let mut labels_map = HashMap::new();
    labels_map.insert(labels::REPOSITORY.to_string(), repository_name.to_string());
    labels_map.insert(labels::WORKTREE.to_string(), worktree.name.clone());
    labels_map.insert(labels::TYPE.to_string(), ContainerKind::Ai.as_ref().to_string());

    let mut mounts = vec![MountSpec {
      host_path: worktree.fs_path.clone(),
      container_path: "/workspace".to_string(),
      read_only: false,
    }];
    for (host, container) in &manifest.container.ai.volumes {
      mounts.push(MountSpec {
        host_path: host.clone(),
        container_path: container.clone(),
        read_only: false,
      });
    }

    let config = ContainerConfig {
      name: ai_name.clone(),
      image: manifest.container.ai.image().to_string(),
      command: None,
      env: manifest.container.ai.env.clone(),
      mounts,
      ports: Vec::new(),
      labels: labels_map,
      attach_interactive: true,
      working_dir: Some("/workspace".to_string()),
    };

    self.runtime.create(&config).await?;
    self.runtime.start(&ai_name).await
  }

  /// `stop_worktree` (§4.6), reverse order. Errors are collected, not
  /// aborted.
  pub async fn stop_worktree(&self, id: Uuid) -> Result<Worktree, Error> {
    let mailbox = self.mailboxes.get_or_create(id);
    let this = self;
    mailbox
      .run(move || async move { this.stop_worktree_inner(id).await })
      .await
  }

  async fn stop_worktree_inner(&self, id: Uuid) -> Result<Worktree, Error> {
    let worktree = self.store.get_worktree(id)?;
    let repository = self.store.get_repository(worktree.repository_id)?;
    self.store.update_worktree_status(id, WorktreeStatus::Stopping)?;

    self.logs.detach(id).await;

    let ai_name = ai_container_name(&repository.name, &worktree.name);
    // AI sidecar is stopped, not removed: stop_worktree keeps it around
    // for a cheap restart; only remove_worktree tears it down for good.
    let _ = self.runtime.stop(&ai_name, APP_STOP_TIMEOUT_SECS).await;

    let app_name = app_container_name(&repository.name, &worktree.name);
    let app_stop_ok = self.runtime.stop(&app_name, APP_STOP_TIMEOUT_SECS).await.is_ok();
    if !app_stop_ok {
      let _ = self.runtime.stop(&app_name, 0).await;
    }

    let manifest = Self::load_manifest(&worktree.fs_path).ok();
    if let Some(manifest) = manifest {
      let holder = worktree.id.to_string();
      for service_name in manifest.services.keys() {
        let _ = self.registry.release(service_name, &holder).await;
      }
    }

    let final_status = if app_stop_ok { WorktreeStatus::Stopped } else { WorktreeStatus::Error };
    self.store.update_worktree_status(id, final_status)?;
    self.store.get_worktree(id)
  }

  /// `remove_worktree` (§4.6): guards and teardown.
  pub async fn remove_worktree(&self, id: Uuid, force: bool) -> Result<(), Error> {
    let mailbox = self.mailboxes.get_or_create(id);
    let this = self;
    mailbox
      .run(move || async move { this.remove_worktree_inner(id, force).await })
      .await
  }

  async fn remove_worktree_inner(&self, id: Uuid, force: bool) -> Result<(), Error> {
    let worktree = self.store.get_worktree(id)?;
    let repository = self.store.get_repository(worktree.repository_id)?;

    if worktree.status == WorktreeStatus::Running || worktree.status == WorktreeStatus::Starting {
      self.stop_worktree_inner(id).await?;
    }

    if !force {
      let fs_path = Path::new(&worktree.fs_path);
      if git::has_uncommitted_changes(fs_path).await? {
        return Err(Error::git(GitErrorKind::Uncommitted, format!("{} has uncommitted changes", worktree.name), None));
      }
      if git::has_unpushed_commits(fs_path).await? {
        return Err(Error::git(GitErrorKind::Unpushed, format!("{} has unpushed commits", worktree.name), None));
      }
      let default_branch = git::get_default_branch(fs_path).await.unwrap_or_else(|_| "main".to_string());
      if !git::is_branch_merged(fs_path, &worktree.branch, &default_branch).await? {
        return Err(Error::git(GitErrorKind::NotMerged, format!("{} is not merged into {default_branch}", worktree.branch), None));
      }
    }

    let app_name = app_container_name(&repository.name, &worktree.name);
    let ai_name = ai_container_name(&repository.name, &worktree.name);
    let _ = self.runtime.remove(&app_name, true).await;
    let _ = self.runtime.remove(&ai_name, true).await;

    let (main_repo, _) = git::ensure_main_repo(&repository.local_path, &repository.name, &self.repos_dir).await?;
    git::remove_worktree(&main_repo, Path::new(&worktree.fs_path)).await?;

    self.store.delete_worktree(id)
  }

  /// Boot reconciliation pass (§4.6 "Restart recovery"): drives every
  /// non-terminal status to a terminal one by inspecting actual
  /// container state.
  pub async fn reconcile_at_boot(&self) -> Result<(), Error> {
    let all = self.store.list_worktrees(&WorktreeListFilter::default())?;
    for worktree in all {
      let repository = match self.store.get_repository(worktree.repository_id) {
        Ok(r) => r,
        Err(_) => continue,
      };
      let app_name = app_container_name(&repository.name, &worktree.name);
      let container = self.runtime.get_by_name(&app_name).await.unwrap_or(None);

      let reconciled = match worktree.status {
        WorktreeStatus::Starting | WorktreeStatus::Stopping => match &container {
          Some(info) if info.state == ContainerState::Running => WorktreeStatus::Running,
          _ => WorktreeStatus::Stopped,
        },
        WorktreeStatus::Running if container.is_none() => WorktreeStatus::Stopped,
        other => other,
      };

      if reconciled != worktree.status {
        self.store.update_worktree_status(worktree.id, reconciled)?;
      }
    }
    Ok(())
  }

  async fn warn(&self, worktree_id: Uuid, message: String) {
    let entry = vibeman_client::entities::log::LogEntry {
      timestamp: chrono::Utc::now(),
      level: vibeman_client::entities::log::LogLevel::Warn,
      source_container: "orchestrator".to_string(),
      message,
      labels: indexmap::IndexMap::new(),
    };
    tracing::warn!(worktree = %worktree_id, message = %entry.message, "orchestrator warning");
    self.logs.push_synthetic(worktree_id, entry).await;
  }
}

pub fn list_services(catalog: &ServiceCatalog) -> Vec<String> {
  catalog.services.keys().cloned().collect()
}
