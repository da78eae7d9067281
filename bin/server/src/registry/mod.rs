//! The Service Registry (spec §4.5): the single owner of shared-service
//! container lifecycles. Acquire/release is reference-counted per
//! service name; a ref_count 0→1 transition starts the service, a 1→0
//! transition schedules a debounced shutdown that a reacquire cancels.
//!
//! A coarse-locked in-memory table guards the shared state per service,
//! widened here with a per-service debounce timer per §9's design notes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use vibeman_client::entities::container::{ContainerConfig, MountSpec, PortMapping, labels};
use vibeman_client::entities::manifest::ServiceCatalog;
use vibeman_client::entities::service::{ServiceState, ServiceStatus};
use vibeman_client::error::{Error, ServiceErrorKind};

use crate::compose;
use crate::docker::ContainerRuntime;

/// Default quiescence window before an idle service is actually stopped
/// (spec §4.5).
pub const DEFAULT_DEBOUNCE_SECS: u64 = 30;

/// Holder name the HTTP API uses for manual `start`/`stop`/`restart`
/// actions (§6), distinct from a worktree's holder (its own id) so an
/// operator's manual hold and a worktree's `acquire` never collide.
const API_HOLDER: &str = "api";

/// Default health-probe schedule (spec §5): up to 10 probes, 1s initial
/// delay, exponential backoff capped at 10s, 60s total budget.
const HEALTH_PROBE_ATTEMPTS: u32 = 10;
const HEALTH_PROBE_INITIAL_DELAY: Duration = Duration::from_secs(1);
const HEALTH_PROBE_MAX_DELAY: Duration = Duration::from_secs(10);

type StateTable = Arc<Mutex<HashMap<String, ServiceState>>>;
type PendingShutdowns = Arc<Mutex<HashMap<String, CancellationToken>>>;

pub struct ServiceRegistry {
  runtime: Arc<dyn ContainerRuntime>,
  catalog: ServiceCatalog,
  debounce: Duration,
  state: StateTable,
  pending_shutdowns: PendingShutdowns,
}

impl ServiceRegistry {
  pub fn new(runtime: Arc<dyn ContainerRuntime>, catalog: ServiceCatalog, debounce_secs: u64) -> Self {
    Self {
      runtime,
      catalog,
      debounce: Duration::from_secs(debounce_secs),
      state: Arc::new(Mutex::new(HashMap::new())),
      pending_shutdowns: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub async fn get(&self, name: &str) -> Option<ServiceState> {
    self.state.lock().await.get(name).cloned()
  }

  pub async fn list(&self) -> Vec<ServiceState> {
    self.state.lock().await.values().cloned().collect()
  }

  /// `acquire` is idempotent per `(service_name, holder)` (§4.5 step 2).
  pub async fn acquire(&self, service_name: &str, holder: &str) -> Result<(), Error> {
    if !self.catalog.services.contains_key(service_name) {
      return Err(Error::service(
        ServiceErrorKind::NotFound,
        format!("no catalog entry for service {service_name}"),
        None,
      ));
    }

    self.cancel_pending_shutdown(service_name).await;

    let should_start = {
      let mut state = self.state.lock().await;
      let entry = state
        .entry(service_name.to_string())
        .or_insert_with(|| ServiceState::new(service_name));

      if entry.holders.contains(holder) {
        return Ok(());
      }
      entry.holders.insert(holder.to_string());
      entry.ref_count = entry.holders.len();

      let transitioned = entry.ref_count == 1 && entry.status != ServiceStatus::Running;
      if transitioned {
        entry.status = ServiceStatus::Starting;
      }
      transitioned
    };

    if should_start {
      if let Err(e) = self.ensure_started(service_name).await {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.get_mut(service_name) {
          entry.holders.remove(holder);
          entry.ref_count = entry.holders.len();
          entry.status = ServiceStatus::Error;
        }
        return Err(e);
      }
      let mut state = self.state.lock().await;
      if let Some(entry) = state.get_mut(service_name) {
        entry.status = ServiceStatus::Running;
      }
    }

    Ok(())
  }

  /// Release symmetrically; `ref_count` 1→0 schedules a debounced
  /// shutdown (§4.5).
  pub async fn release(&self, service_name: &str, holder: &str) -> Result<(), Error> {
    let should_schedule = {
      let mut state = self.state.lock().await;
      let Some(entry) = state.get_mut(service_name) else {
        return Ok(());
      };
      if !entry.holders.remove(holder) {
        return Ok(());
      }
      entry.ref_count = entry.holders.len();
      if entry.ref_count == 0 {
        entry.shutdown_pending = true;
        true
      } else {
        false
      }
    };

    if should_schedule {
      self.schedule_shutdown(service_name).await;
    }

    Ok(())
  }

  async fn schedule_shutdown(&self, service_name: &str) {
    let token = CancellationToken::new();
    {
      let mut pending = self.pending_shutdowns.lock().await;
      pending.insert(service_name.to_string(), token.clone());
    }

    let name = service_name.to_string();
    let debounce = self.debounce;
    let runtime = self.runtime.clone();
    let state = self.state.clone();
    let pending_shutdowns = self.pending_shutdowns.clone();

    tokio::spawn(async move {
      let fired = tokio::select! {
        _ = tokio::time::sleep(debounce) => true,
        _ = token.cancelled() => false,
      };

      if fired {
        let container_name = vibeman_client::entities::container::service_container_name(&name);
        {
          let mut state = state.lock().await;
          if let Some(entry) = state.get_mut(&name) {
            entry.status = ServiceStatus::Stopping;
          }
        }
        let _ = runtime.stop(&container_name, 30).await;
        let _ = runtime.remove(&container_name, false).await;
        let mut state = state.lock().await;
        if let Some(entry) = state.get_mut(&name) {
          entry.status = ServiceStatus::Stopped;
          entry.shutdown_pending = false;
          entry.container_id = None;
          entry.start_time = None;
        }
      }

      pending_shutdowns.lock().await.remove(&name);
    });
  }

  /// Cancel-on-reacquire (§4.5): a pending shutdown is cancelled and the
  /// service remains `Running` without restarting.
  async fn cancel_pending_shutdown(&self, service_name: &str) {
    let token = self.pending_shutdowns.lock().await.remove(service_name);
    if let Some(token) = token {
      token.cancel();
      let mut state = self.state.lock().await;
      if let Some(entry) = state.get_mut(service_name) {
        entry.shutdown_pending = false;
      }
    }
  }

  /// `ensure_started` (§4.5 step 4): resolve the descriptor, create+start
  /// via the Compose Adapter and Container Runtime, probe health with
  /// exponential backoff.
  async fn ensure_started(&self, service_name: &str) -> Result<(), Error> {
    let entry = self.catalog.services.get(service_name).ok_or_else(|| {
      Error::service(ServiceErrorKind::NotFound, format!("no catalog entry for {service_name}"), None)
    })?;

    let compose_path = PathBuf::from(&entry.compose_file);
    let parsed = compose::parse_compose_file(&compose_path)?;
    let service = parsed.service(&entry.service)?;

    let container_name = vibeman_client::entities::container::service_container_name(service_name);

    if self.runtime.get_by_name(&container_name).await?.is_none() {
      let image = service.image.clone().ok_or_else(|| {
        Error::service(ServiceErrorKind::StartFailed, format!("service {service_name} has no image in compose"), None)
      })?;

      let mut labels_map = HashMap::new();
      labels_map.insert(labels::TYPE.to_string(), "service".to_string());

      let config = ContainerConfig {
        name: container_name.clone(),
        image,
        command: service.command.clone(),
        env: service.env_map.clone(),
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
          .map(|(host, container, protocol)| PortMapping {
            host: *host,
            container: *container,
            protocol: protocol.clone(),
          })
          .collect(),
        labels: labels_map,
        attach_interactive: false,
        working_dir: service.working_dir.clone(),
      };

      self.runtime.create(&config).await.map_err(|e| {
        Error::service(ServiceErrorKind::StartFailed, format!("failed to create {container_name}: {e}"), None)
      })?;
    }

    self.runtime.start(&container_name).await.map_err(|e| {
      Error::service(ServiceErrorKind::StartFailed, format!("failed to start {container_name}: {e}"), None)
    })?;

    self.probe_health(&container_name).await
  }

  /// Manual start (§6 `POST /services/{name}/start`): holds the service
  /// under the fixed `"api"` holder alongside any worktree holders.
  pub async fn manual_start(&self, service_name: &str) -> Result<(), Error> {
    self.acquire(service_name, API_HOLDER).await
  }

  /// Manual stop: releases the `"api"` holder only; a service still
  /// held by a running worktree stays up.
  pub async fn manual_stop(&self, service_name: &str) -> Result<(), Error> {
    self.release(service_name, API_HOLDER).await
  }

  /// Manual restart (§6 `POST /services/{name}/restart`): force-cycles
  /// the container regardless of holders, then re-probes health.
  pub async fn restart(&self, service_name: &str) -> Result<(), Error> {
    if !self.catalog.services.contains_key(service_name) {
      return Err(Error::service(ServiceErrorKind::NotFound, format!("no catalog entry for service {service_name}"), None));
    }
    let container_name = vibeman_client::entities::container::service_container_name(service_name);
    {
      let mut state = self.state.lock().await;
      let entry = state
        .entry(service_name.to_string())
        .or_insert_with(|| ServiceState::new(service_name));
      entry.status = ServiceStatus::Starting;
    }
    let _ = self.runtime.stop(&container_name, 30).await;
    if let Err(e) = self.ensure_started(service_name).await {
      let mut state = self.state.lock().await;
      if let Some(entry) = state.get_mut(service_name) {
        entry.status = ServiceStatus::Error;
      }
      return Err(e);
    }
    let mut state = self.state.lock().await;
    if let Some(entry) = state.get_mut(service_name) {
      entry.status = ServiceStatus::Running;
      entry.start_time = Some(chrono::Utc::now());
    }
    Ok(())
  }

  /// Runs a single health probe on demand (§6 `POST /services/{name}/health`)
  /// and records the result, rather than waiting on the next acquire.
  pub async fn health_check(&self, service_name: &str) -> Result<ServiceState, Error> {
    if !self.catalog.services.contains_key(service_name) {
      return Err(Error::service(ServiceErrorKind::NotFound, format!("no catalog entry for service {service_name}"), None));
    }
    let container_name = vibeman_client::entities::container::service_container_name(service_name);
    let healthy = self
      .runtime
      .get_by_name(&container_name)
      .await?
      .is_some_and(|info| info.state == vibeman_client::entities::container::ContainerState::Running);

    let mut state = self.state.lock().await;
    let entry = state
      .entry(service_name.to_string())
      .or_insert_with(|| ServiceState::new(service_name));
    entry.last_health = Some(healthy);
    if !healthy && entry.status == ServiceStatus::Running {
      entry.status = ServiceStatus::Error;
    }
    Ok(entry.clone())
  }

  async fn probe_health(&self, container_name: &str) -> Result<(), Error> {
    let mut delay = HEALTH_PROBE_INITIAL_DELAY;
    for attempt in 0..HEALTH_PROBE_ATTEMPTS {
      if attempt > 0 {
        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, HEALTH_PROBE_MAX_DELAY);
      }
      if let Some(info) = self.runtime.get_by_name(container_name).await? {
        if info.state == vibeman_client::entities::container::ContainerState::Running {
          return Ok(());
        }
      }
    }
    Err(Error::service(
      ServiceErrorKind::HealthCheckFailed,
      format!("{container_name} did not become healthy after {HEALTH_PROBE_ATTEMPTS} probes"),
      None,
    ))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use vibeman_client::entities::container::{ContainerInfo, ContainerState};
  use vibeman_client::entities::manifest::ServiceCatalogEntry;

  use super::*;

  struct FakeRuntime {
    containers: Mutex<HashMap<String, ContainerInfo>>,
    creates: AtomicUsize,
  }

  impl FakeRuntime {
    fn new() -> Self {
      Self {
        containers: Mutex::new(HashMap::new()),
        creates: AtomicUsize::new(0),
      }
    }
  }

  #[async_trait::async_trait]
  impl ContainerRuntime for FakeRuntime {
    async fn create(&self, config: &ContainerConfig) -> Result<ContainerInfo, Error> {
      self.creates.fetch_add(1, Ordering::SeqCst);
      let info = ContainerInfo {
        id: config.name.clone(),
        name: config.name.clone(),
        image: config.image.clone(),
        state: ContainerState::Created,
        labels: config.labels.clone(),
        ports: config.ports.clone(),
      };
      self.containers.lock().await.insert(config.name.clone(), info.clone());
      Ok(info)
    }
    async fn start(&self, name: &str) -> Result<(), Error> {
      if let Some(info) = self.containers.lock().await.get_mut(name) {
        info.state = ContainerState::Running;
      }
      Ok(())
    }
    async fn stop(&self, name: &str, _timeout_secs: i32) -> Result<(), Error> {
      if let Some(info) = self.containers.lock().await.get_mut(name) {
        info.state = ContainerState::Exited;
      }
      Ok(())
    }
    async fn remove(&self, name: &str, _force: bool) -> Result<(), Error> {
      self.containers.lock().await.remove(name);
      Ok(())
    }
    async fn get_by_name(&self, name: &str) -> Result<Option<ContainerInfo>, Error> {
      Ok(self.containers.lock().await.get(name).cloned())
    }
    async fn list(&self, _filter: &ContainerListFilterStub) -> Result<Vec<ContainerInfo>, Error> {
      unreachable!()
    }
    async fn exec(
      &self,
      _name: &str,
      _argv: &[String],
      _stdin: Option<&[u8]>,
      _timeout: std::time::Duration,
    ) -> Result<crate::docker::ExecOutcome, Error> {
      unreachable!()
    }
    async fn attach_pty(&self, _name: &str, _cols: u16, _rows: u16) -> Result<crate::docker::AttachedPty, Error> {
      unreachable!()
    }
    async fn copy_to(&self, _name: &str, _src: &std::path::Path, _dst: &str) -> Result<(), Error> {
      unreachable!()
    }
    async fn copy_from(&self, _name: &str, _src: &str, _dst: &std::path::Path) -> Result<(), Error> {
      unreachable!()
    }
    fn logs(
      &self,
      _name: &str,
      _follow: bool,
      _tail_lines: Option<usize>,
    ) -> std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<bytes::Bytes, Error>> + Send + '_>> {
      unreachable!()
    }
  }

  type ContainerListFilterStub = vibeman_client::entities::container::ContainerListFilter;

  fn catalog_with(name: &str, compose_file: &str, service: &str) -> ServiceCatalog {
    let mut services = HashMap::new();
    services.insert(
      name.to_string(),
      ServiceCatalogEntry {
        compose_file: compose_file.to_string(),
        service: service.to_string(),
        description: String::new(),
      },
    );
    ServiceCatalog { services }
  }

  #[tokio::test]
  async fn reacquire_by_same_holder_does_not_double_count() {
    let dir = tempfile::tempdir().unwrap();
    let compose_path = dir.path().join("dc.yaml");
    std::fs::write(&compose_path, "services:\n  pg:\n    image: postgres:16\n").unwrap();

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(FakeRuntime::new());
    let catalog = catalog_with("pg", compose_path.to_str().unwrap(), "pg");
    let registry = ServiceRegistry::new(runtime, catalog, 30);

    registry.acquire("pg", "feat").await.unwrap();
    registry.acquire("pg", "feat").await.unwrap();

    let state = registry.get("pg").await.unwrap();
    assert_eq!(state.ref_count, 1);
  }

  #[tokio::test]
  async fn two_holders_share_one_container() {
    let dir = tempfile::tempdir().unwrap();
    let compose_path = dir.path().join("dc.yaml");
    std::fs::write(&compose_path, "services:\n  pg:\n    image: postgres:16\n").unwrap();

    let runtime = Arc::new(FakeRuntime::new());
    let catalog = catalog_with("pg", compose_path.to_str().unwrap(), "pg");
    let registry = ServiceRegistry::new(runtime.clone(), catalog, 30);

    registry.acquire("pg", "feat").await.unwrap();
    registry.acquire("pg", "bug").await.unwrap();

    assert_eq!(registry.get("pg").await.unwrap().ref_count, 2);
    assert_eq!(runtime.creates.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn reacquire_during_pending_shutdown_cancels_it() {
    let dir = tempfile::tempdir().unwrap();
    let compose_path = dir.path().join("dc.yaml");
    std::fs::write(&compose_path, "services:\n  pg:\n    image: postgres:16\n").unwrap();

    let runtime = Arc::new(FakeRuntime::new());
    let catalog = catalog_with("pg", compose_path.to_str().unwrap(), "pg");
    let registry = ServiceRegistry::new(runtime, catalog, 1);

    registry.acquire("pg", "feat").await.unwrap();
    registry.release("pg", "feat").await.unwrap();
    assert!(registry.get("pg").await.unwrap().shutdown_pending);

    registry.acquire("pg", "feat").await.unwrap();
    assert!(!registry.get("pg").await.unwrap().shutdown_pending);
    assert_eq!(registry.get("pg").await.unwrap().status, ServiceStatus::Running);
  }
}
