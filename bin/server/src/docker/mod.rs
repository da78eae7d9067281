//! The Container Runtime Port (spec §4.4): the one place that talks to
//! the Docker daemon (`bollard::Docker` behind a `OnceLock`,
//! label-filtered listing), covering the full create/start/stop/remove/
//! exec/attach/copy surface the orchestrator needs to own the
//! containers it manages end to end, not just observe them.

mod exec;
mod pty;

use std::collections::HashMap;
use std::pin::Pin;

use bollard::Docker;
use bollard::query_parameters::{
  CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
  RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::secret::{ContainerCreateBody, HostConfig, PortBinding as BollardPortBinding};
use futures_util::StreamExt;
use vibeman_client::entities::container::{
  ContainerConfig, ContainerInfo, ContainerKind, ContainerListFilter, ContainerState, PortMapping,
  labels,
};
use vibeman_client::error::{ContainerErrorKind, Error};

pub use exec::ExecOutcome;
pub use pty::AttachedPty;

/// The capability boundary of §4.4: "any engine that implements it is
/// acceptable". The registry and orchestrator depend only on this trait,
/// never on `DockerRuntime` directly, so tests can swap in an in-memory
/// fake instead of a real daemon.
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
  async fn create(&self, config: &ContainerConfig) -> Result<ContainerInfo, Error>;
  async fn start(&self, name: &str) -> Result<(), Error>;
  async fn stop(&self, name: &str, timeout_secs: i32) -> Result<(), Error>;
  async fn remove(&self, name: &str, force: bool) -> Result<(), Error>;
  async fn get_by_name(&self, name: &str) -> Result<Option<ContainerInfo>, Error>;
  async fn list(&self, filter: &ContainerListFilter) -> Result<Vec<ContainerInfo>, Error>;
  async fn exec(
    &self,
    name: &str,
    argv: &[String],
    stdin: Option<&[u8]>,
    timeout: std::time::Duration,
  ) -> Result<ExecOutcome, Error>;
  async fn attach_pty(&self, name: &str, cols: u16, rows: u16) -> Result<AttachedPty, Error>;
  async fn copy_to(&self, name: &str, src: &std::path::Path, dst: &str) -> Result<(), Error>;
  async fn copy_from(&self, name: &str, src: &str, dst: &std::path::Path) -> Result<(), Error>;
  fn logs(
    &self,
    name: &str,
    follow: bool,
    tail_lines: Option<usize>,
  ) -> Pin<Box<dyn futures_util::Stream<Item = Result<bytes::Bytes, Error>> + Send + '_>>;
}

pub struct DockerRuntime {
  docker: Docker,
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerRuntime {
  async fn create(&self, config: &ContainerConfig) -> Result<ContainerInfo, Error> {
    DockerRuntime::create(self, config).await
  }
  async fn start(&self, name: &str) -> Result<(), Error> {
    DockerRuntime::start(self, name).await
  }
  async fn stop(&self, name: &str, timeout_secs: i32) -> Result<(), Error> {
    DockerRuntime::stop(self, name, timeout_secs).await
  }
  async fn remove(&self, name: &str, force: bool) -> Result<(), Error> {
    DockerRuntime::remove(self, name, force).await
  }
  async fn get_by_name(&self, name: &str) -> Result<Option<ContainerInfo>, Error> {
    DockerRuntime::get_by_name(self, name).await
  }
  async fn list(&self, filter: &ContainerListFilter) -> Result<Vec<ContainerInfo>, Error> {
    DockerRuntime::list(self, filter).await
  }
  async fn exec(
    &self,
    name: &str,
    argv: &[String],
    stdin: Option<&[u8]>,
    timeout: std::time::Duration,
  ) -> Result<ExecOutcome, Error> {
    DockerRuntime::exec(self, name, argv, stdin, timeout).await
  }
  async fn attach_pty(&self, name: &str, cols: u16, rows: u16) -> Result<AttachedPty, Error> {
    DockerRuntime::attach_pty(self, name, cols, rows).await
  }
  async fn copy_to(&self, name: &str, src: &std::path::Path, dst: &str) -> Result<(), Error> {
    DockerRuntime::copy_to(self, name, src, dst).await
  }
  async fn copy_from(&self, name: &str, src: &str, dst: &std::path::Path) -> Result<(), Error> {
    DockerRuntime::copy_from(self, name, src, dst).await
  }
  fn logs(
    &self,
    name: &str,
    follow: bool,
    tail_lines: Option<usize>,
  ) -> Pin<Box<dyn futures_util::Stream<Item = Result<bytes::Bytes, Error>> + Send + '_>> {
    Box::pin(DockerRuntime::logs(self, name, follow, tail_lines))
  }
}

impl DockerRuntime {
  /// Connects to the local Docker daemon via the standard
  /// `DOCKER_HOST`/socket resolution.
  pub fn connect() -> anyhow::Result<Self> {
    Ok(Self {
      docker: Docker::connect_with_local_defaults()?,
    })
  }

  /// Creates a container from `config`. Name collisions surface as
  /// `AlreadyExists` rather than bollard's raw 409 text (spec §4.4).
  pub async fn create(&self, config: &ContainerConfig) -> Result<ContainerInfo, Error> {
    let options = CreateContainerOptions {
      name: Some(config.name.clone()),
      platform: None,
    };

    let exposed_ports = config
      .ports
      .iter()
      .map(|p| (format!("{}/{}", p.container, p.protocol), HashMap::new()))
      .collect::<HashMap<_, _>>();

    let port_bindings = config
      .ports
      .iter()
      .map(|p| {
        (
          format!("{}/{}", p.container, p.protocol),
          Some(vec![BollardPortBinding {
            host_ip: None,
            host_port: Some(p.host.to_string()),
          }]),
        )
      })
      .collect::<HashMap<_, _>>();

    let binds = config
      .mounts
      .iter()
      .map(|m| {
        format!(
          "{}:{}{}",
          m.host_path,
          m.container_path,
          if m.read_only { ":ro" } else { "" }
        )
      })
      .collect::<Vec<_>>();

    let env = config
      .env
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect::<Vec<_>>();

    let body = ContainerCreateBody {
      image: Some(config.image.clone()),
      cmd: config.command.clone(),
      env: Some(env),
      labels: Some(config.labels.clone()),
      working_dir: config.working_dir.clone(),
      tty: Some(config.attach_interactive),
      open_stdin: Some(config.attach_interactive),
      attach_stdin: Some(config.attach_interactive),
      attach_stdout: Some(true),
      attach_stderr: Some(true),
      exposed_ports: Some(exposed_ports),
      host_config: Some(HostConfig {
        binds: Some(binds),
        port_bindings: Some(port_bindings),
        ..Default::default()
      }),
      ..Default::default()
    };

    let created = self.docker.create_container(Some(options), body).await.map_err(|e| {
      if is_conflict(&e) {
        Error::container(
          ContainerErrorKind::AlreadyExists,
          format!("container {} already exists", config.name),
          None,
        )
      } else {
        Error::container(ContainerErrorKind::CreateFailed, format!("failed to create {}", config.name), e.into())
      }
    })?;

    self.get_by_id(&created.id).await
  }

  pub async fn start(&self, name: &str) -> Result<(), Error> {
    self
      .docker
      .start_container(name, None::<StartContainerOptions>)
      .await
      .map_err(|e| Error::container(ContainerErrorKind::StartFailed, format!("failed to start {name}"), e.into()))
  }

  /// Idempotent with respect to terminal states: stopping an
  /// already-stopped container is a no-op returning success (§4.4).
  pub async fn stop(&self, name: &str, timeout_secs: i32) -> Result<(), Error> {
    let options = StopContainerOptions {
      t: Some(timeout_secs),
      ..Default::default()
    };
    match self.docker.stop_container(name, Some(options)).await {
      Ok(()) => Ok(()),
      Err(e) if is_not_running(&e) || is_not_found(&e) => Ok(()),
      Err(e) => Err(Error::container(ContainerErrorKind::StopFailed, format!("failed to stop {name}"), e.into())),
    }
  }

  pub async fn remove(&self, name: &str, force: bool) -> Result<(), Error> {
    let options = RemoveContainerOptions {
      force,
      v: true,
      ..Default::default()
    };
    match self.docker.remove_container(name, Some(options)).await {
      Ok(()) => Ok(()),
      Err(e) if is_not_found(&e) => Ok(()),
      Err(e) => Err(Error::container(ContainerErrorKind::StopFailed, format!("failed to remove {name}"), e.into())),
    }
  }

  /// No error for absence (§4.4) — callers branch on `Option`.
  pub async fn get_by_name(&self, name: &str) -> Result<Option<ContainerInfo>, Error> {
    match self.get_by_id(name).await {
      Ok(info) => Ok(Some(info)),
      Err(Error::Container { kind: ContainerErrorKind::NotFound, .. }) => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn get_by_id(&self, id: &str) -> Result<ContainerInfo, Error> {
    let container = self
      .docker
      .inspect_container(id, None::<InspectContainerOptions>)
      .await
      .map_err(|e| {
        if is_not_found(&e) {
          Error::container(ContainerErrorKind::NotFound, format!("container {id} not found"), None)
        } else {
          Error::container(ContainerErrorKind::InvalidId, format!("failed to inspect {id}"), e.into())
        }
      })?;
    Ok(to_container_info(container))
  }

  pub async fn list(&self, filter: &ContainerListFilter) -> Result<Vec<ContainerInfo>, Error> {
    let mut label_filters = Vec::new();
    if let Some(repository) = &filter.repository {
      label_filters.push(format!("{}={repository}", labels::REPOSITORY));
    }
    if let Some(worktree) = &filter.worktree {
      label_filters.push(format!("{}={worktree}", labels::WORKTREE));
    }
    if let Some(kind) = filter.kind {
      label_filters.push(format!("{}={}", labels::TYPE, kind.as_ref()));
    }

    let mut filters = HashMap::new();
    if !label_filters.is_empty() {
      filters.insert("label".to_string(), label_filters);
    }

    let options = ListContainersOptions {
      all: true,
      filters: if filters.is_empty() { None } else { Some(filters) },
      ..Default::default()
    };

    let summaries = self
      .docker
      .list_containers(Some(options))
      .await
      .map_err(|e| Error::container(ContainerErrorKind::NotFound, "failed to list containers", e.into()))?;

    let mut out = Vec::with_capacity(summaries.len());
    for summary in summaries {
      let Some(id) = &summary.id else { continue };
      let info = self.get_by_id(id).await?;
      if let Some(state) = filter.state {
        if info.state != state {
          continue;
        }
      }
      out.push(info);
    }
    Ok(out)
  }

  /// Non-interactive exec with a caller-provided timeout (§4.4).
  pub async fn exec(
    &self,
    name: &str,
    argv: &[String],
    stdin: Option<&[u8]>,
    timeout: std::time::Duration,
  ) -> Result<ExecOutcome, Error> {
    exec::run(&self.docker, name, argv, stdin, timeout).await
  }

  /// Byte stream of container logs (§4.4). `follow=false` drains the
  /// currently buffered output and ends.
  pub fn logs(
    &self,
    name: &str,
    follow: bool,
    tail_lines: Option<usize>,
  ) -> impl futures_util::Stream<Item = Result<bytes::Bytes, Error>> + Send + '_ {
    let options = LogsOptions {
      follow,
      stdout: true,
      stderr: true,
      tail: tail_lines.map(|n| n.to_string()).unwrap_or_else(|| "all".to_string()),
      ..Default::default()
    };
    self.docker.logs(name, Some(options)).map(|chunk| {
      chunk
        .map(|log_output| log_output.into_bytes())
        .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, "log stream error", e.into()))
    })
  }

  /// Opens a PTY-attached exec for the interactive AI shell (§4.4/§4.8).
  pub async fn attach_pty(&self, name: &str, cols: u16, rows: u16) -> Result<AttachedPty, Error> {
    pty::attach(&self.docker, name, cols, rows).await
  }

  pub async fn copy_to(&self, name: &str, src: &std::path::Path, dst: &str) -> Result<(), Error> {
    exec::copy_to(&self.docker, name, src, dst).await
  }

  pub async fn copy_from(&self, name: &str, src: &str, dst: &std::path::Path) -> Result<(), Error> {
    exec::copy_from(&self.docker, name, src, dst).await
  }
}

fn to_container_info(container: bollard::secret::ContainerInspectResponse) -> ContainerInfo {
  let ports = container
    .network_settings
    .as_ref()
    .and_then(|s| s.ports.as_ref())
    .map(|ports| {
      ports
        .iter()
        .filter_map(|(key, bindings)| {
          let mut parts = key.splitn(2, '/');
          let container_port: u16 = parts.next()?.parse().ok()?;
          let protocol = parts.next().unwrap_or("tcp").to_string();
          let host_port: u16 = bindings
            .as_ref()?
            .first()?
            .host_port
            .as_ref()?
            .parse()
            .ok()?;
          Some(PortMapping { host: host_port, container: container_port, protocol })
        })
        .collect()
    })
    .unwrap_or_default();

  ContainerInfo {
    id: container.id.unwrap_or_default(),
    name: container.name.unwrap_or_default().trim_start_matches('/').to_string(),
    image: container.config.as_ref().and_then(|c| c.image.clone()).unwrap_or_default(),
    state: container
      .state
      .as_ref()
      .and_then(|s| s.status.as_ref())
      .map(to_container_state)
      .unwrap_or(ContainerState::Unknown),
    labels: container.config.and_then(|c| c.labels).unwrap_or_default(),
    ports,
  }
}

fn to_container_state(status: &bollard::secret::ContainerStateStatusEnum) -> ContainerState {
  use bollard::secret::ContainerStateStatusEnum as S;
  match status {
    S::CREATED => ContainerState::Created,
    S::RUNNING => ContainerState::Running,
    S::PAUSED => ContainerState::Paused,
    S::RESTARTING => ContainerState::Restarting,
    S::REMOVING => ContainerState::Removing,
    S::EXITED => ContainerState::Exited,
    S::DEAD => ContainerState::Dead,
    S::EMPTY => ContainerState::Unknown,
  }
}

fn is_not_found(e: &bollard::errors::Error) -> bool {
  matches!(e, bollard::errors::Error::DockerResponseServerError { status_code, .. } if *status_code == 404)
}

fn is_conflict(e: &bollard::errors::Error) -> bool {
  matches!(e, bollard::errors::Error::DockerResponseServerError { status_code, .. } if *status_code == 409)
}

fn is_not_running(e: &bollard::errors::Error) -> bool {
  matches!(e, bollard::errors::Error::DockerResponseServerError { status_code, message, .. }
    if *status_code == 304 || message.contains("is not running"))
}

/// The AI sidecar's container kind, used when constructing labels — not
/// a general-purpose builder since the orchestrator already knows
/// precisely which labels each container kind needs (§4.4).
pub fn kind_label(kind: ContainerKind) -> (&'static str, &'static str) {
  (labels::TYPE, kind.as_ref())
}
