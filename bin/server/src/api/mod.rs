//! The HTTP API surface (spec §6): one `axum::Router` per resource
//! group, all state passed through [crate::state::AppState]. Every
//! handler is a thin translation from a `client/rs` DTO to an
//! `Orchestrator`/`ServiceRegistry` call and back; no business logic
//! lives here.

use std::str::FromStr;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use response::{ApiResult, VibemanResponse};
use uuid::Uuid;
use vibeman_client::api::container::{
  ContainerActionKind, ContainerActionRequest, ContainerLogsRequest, CreateContainerRequest, ListContainersRequest,
};
use vibeman_client::api::repository::AddRepositoryRequest;
use vibeman_client::api::service::{ServiceAction, ServiceActionRequest};
use vibeman_client::api::system::{ConfigResponse, HealthResponse, StatusResponse};
use vibeman_client::api::worktree::{
  ClearWorktreeLogsRequest, CreateWorktreeRequest, GetWorktreeLogsRequest, ListWorktreesRequest, RemoveWorktreeRequest,
};
use vibeman_client::entities::container::{ContainerInfo, ContainerKind, ContainerListFilter, service_container_name};
use vibeman_client::entities::log::{LogEntry, LogSearchQuery, LogSnapshot};
use vibeman_client::entities::repository::{Repository, RepositoryListItem};
use vibeman_client::entities::service::ServiceState;
use vibeman_client::entities::worktree::{CreateWorktreeResult, Worktree};
use vibeman_client::error::{ContainerErrorKind, Error, ValidationErrorKind};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
  Router::new()
    .merge(repositories_router())
    .merge(worktrees_router())
    .merge(services_router())
    .merge(containers_router())
    .merge(system_router())
}

fn repositories_router() -> Router<AppState> {
  Router::new()
    .route("/repositories", get(list_repositories).post(add_repository))
    .route("/repositories/{id}", delete(remove_repository))
}

async fn list_repositories(State(state): State<AppState>) -> ApiResult<Vec<RepositoryListItem>> {
  Ok(axum::Json(state.orchestrator.list_repositories()?))
}

async fn add_repository(
  State(state): State<AppState>,
  axum::Json(body): axum::Json<AddRepositoryRequest>,
) -> ApiResult<Repository> {
  let description = (!body.description.is_empty()).then_some(body.description);
  let repository = state
    .orchestrator
    .add_repository(body.name, body.path, body.git_url, description)
    .await?;
  Ok(axum::Json(repository))
}

async fn remove_repository(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), VibemanResponse> {
  state.orchestrator.remove_repository(id).await?;
  Ok(())
}

fn worktrees_router() -> Router<AppState> {
  Router::new()
    .route("/worktrees", get(list_worktrees).post(create_worktree))
    .route("/worktrees/{id}", get(get_worktree).delete(remove_worktree))
    .route("/worktrees/{id}/start", post(start_worktree))
    .route("/worktrees/{id}/stop", post(stop_worktree))
    .route("/worktrees/{id}/logs", get(worktree_logs).delete(clear_worktree_logs))
    .route("/worktrees/{id}/logs/search", post(search_worktree_logs))
}

async fn list_worktrees(
  State(state): State<AppState>,
  Query(req): Query<ListWorktreesRequest>,
) -> ApiResult<Vec<Worktree>> {
  Ok(axum::Json(state.orchestrator.list_worktrees(&req.filter)?))
}

async fn create_worktree(
  State(state): State<AppState>,
  axum::Json(body): axum::Json<CreateWorktreeRequest>,
) -> ApiResult<CreateWorktreeResult> {
  let result = state
    .orchestrator
    .create_worktree(body.repository_id, body.name, body.branch, body.auto_start, body.skip_setup)
    .await?;
  Ok(axum::Json(result))
}

async fn get_worktree(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Worktree> {
  Ok(axum::Json(state.orchestrator.get_worktree(id)?))
}

async fn remove_worktree(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Query(req): Query<RemoveWorktreeRequest>,
) -> Result<(), VibemanResponse> {
  state.orchestrator.remove_worktree(id, req.force).await?;
  Ok(())
}

async fn start_worktree(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Worktree> {
  Ok(axum::Json(state.orchestrator.start_worktree(id).await?))
}

async fn stop_worktree(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Worktree> {
  Ok(axum::Json(state.orchestrator.stop_worktree(id).await?))
}

async fn worktree_logs(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Query(req): Query<GetWorktreeLogsRequest>,
) -> ApiResult<LogSnapshot> {
  let snapshot = state.orchestrator.log_aggregator().tail(id, req.tail, req.container.as_deref()).await;
  Ok(axum::Json(snapshot))
}

async fn clear_worktree_logs(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Query(req): Query<ClearWorktreeLogsRequest>,
) -> Result<(), VibemanResponse> {
  state.orchestrator.log_aggregator().clear(id, req.container.as_deref()).await;
  Ok(())
}

async fn search_worktree_logs(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  axum::Json(query): axum::Json<LogSearchQuery>,
) -> ApiResult<Vec<LogEntry>> {
  Ok(axum::Json(state.orchestrator.log_aggregator().search(id, &query).await))
}

fn services_router() -> Router<AppState> {
  Router::new()
    .route("/services", get(list_services))
    .route("/services/{name}", get(get_service))
    .route("/services/{name}/{action}", post(service_action))
    .route("/services/{name}/logs", get(service_logs))
}

async fn list_services(State(state): State<AppState>) -> ApiResult<Vec<ServiceState>> {
  Ok(axum::Json(state.orchestrator.registry().list().await))
}

async fn get_service(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<ServiceState> {
  state
    .orchestrator
    .registry()
    .get(&name)
    .await
    .map(axum::Json)
    .ok_or_else(|| Error::not_found(format!("service {name} not found")).into())
}

async fn service_action(
  State(state): State<AppState>,
  Path((name, action)): Path<(String, String)>,
) -> ApiResult<ServiceState> {
  let action = ServiceAction::from_str(&action)
    .map_err(|_| Error::validation(ValidationErrorKind::InvalidInput, format!("unknown service action {action}")))?;
  let registry = state.orchestrator.registry();
  let _ = ServiceActionRequest { name: name.clone(), action };

  match action {
    ServiceAction::Start => registry.manual_start(&name).await?,
    ServiceAction::Stop => registry.manual_stop(&name).await?,
    ServiceAction::Restart => registry.restart(&name).await?,
    ServiceAction::Health => {
      let health = registry.health_check(&name).await?;
      return Ok(axum::Json(health));
    }
  }

  registry
    .get(&name)
    .await
    .map(axum::Json)
    .ok_or_else(|| Error::not_found(format!("service {name} not found")).into())
}

async fn service_logs(
  State(state): State<AppState>,
  Path(name): Path<String>,
  Query(req): Query<ContainerLogsRequest>,
) -> Result<Vec<u8>, VibemanResponse> {
  use futures_util::StreamExt;
  if state.orchestrator.registry().get(&name).await.is_none() {
    return Err(Error::not_found(format!("service {name} not found")).into());
  }
  let container = service_container_name(&name);
  let mut stream = state.orchestrator.runtime().logs(&container, req.follow, req.tail);
  let mut out = Vec::new();
  while let Some(chunk) = stream.next().await {
    out.extend_from_slice(&chunk?);
  }
  Ok(out)
}

fn containers_router() -> Router<AppState> {
  Router::new()
    .route("/api/containers", get(list_containers).post(create_container))
    .route("/api/containers/{id}", get(get_container).delete(remove_container))
    .route("/api/containers/{id}/action", post(container_action))
    .route("/api/containers/{id}/logs", get(container_logs))
}

async fn list_containers(
  State(state): State<AppState>,
  Query(req): Query<ListContainersRequest>,
) -> ApiResult<Vec<ContainerInfo>> {
  Ok(axum::Json(state.orchestrator.runtime().list(&req.filter).await?))
}

async fn create_container(
  State(state): State<AppState>,
  axum::Json(body): axum::Json<CreateContainerRequest>,
) -> ApiResult<ContainerInfo> {
  let runtime = state.orchestrator.runtime();
  let info = runtime.create(&body.config).await?;
  runtime.start(&info.name).await?;
  Ok(axum::Json(info))
}

async fn get_container(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ContainerInfo> {
  let runtime = state.orchestrator.runtime();
  let info = runtime
    .list(&ContainerListFilter::default())
    .await?
    .into_iter()
    .find(|c| c.id == id || c.name == id)
    .ok_or_else(|| Error::container(ContainerErrorKind::NotFound, format!("container {id} not found"), None))?;
  Ok(axum::Json(info))
}

async fn remove_container(
  State(state): State<AppState>,
  Path(id): Path<String>,
  Query(req): Query<ContainerActionRequest>,
) -> Result<(), VibemanResponse> {
  state.orchestrator.runtime().remove(&id, req.force).await?;
  Ok(())
}

async fn container_action(
  State(state): State<AppState>,
  Path(id): Path<String>,
  axum::Json(body): axum::Json<ContainerActionRequest>,
) -> Result<(), VibemanResponse> {
  let runtime = state.orchestrator.runtime();
  match body.action {
    ContainerActionKind::Start => runtime.start(&id).await?,
    ContainerActionKind::Stop => runtime.stop(&id, 30).await?,
    ContainerActionKind::Remove => runtime.remove(&id, body.force).await?,
  }
  Ok(())
}

async fn container_logs(
  State(state): State<AppState>,
  Path(id): Path<String>,
  Query(req): Query<ContainerLogsRequest>,
) -> Result<Vec<u8>, VibemanResponse> {
  use futures_util::StreamExt;
  let mut stream = state.orchestrator.runtime().logs(&id, req.follow, req.tail);
  let mut out = Vec::new();
  while let Some(chunk) = stream.next().await {
    out.extend_from_slice(&chunk?);
  }
  Ok(out)
}

fn system_router() -> Router<AppState> {
  Router::new()
    .route("/health", get(health))
    .route("/api/status", get(status))
    .route("/config", get(config))
}

async fn health() -> axum::Json<HealthResponse> {
  axum::Json(HealthResponse::default())
}

async fn status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
  let repository_count = state.orchestrator.list_repositories()?.len() as i64;
  let worktree_count = state.orchestrator.list_worktrees(&Default::default())?.len() as i64;
  let runtime_ready = state
    .orchestrator
    .runtime()
    .list(&ContainerListFilter {
      kind: Some(ContainerKind::App),
      ..Default::default()
    })
    .await
    .is_ok();
  let active_service_count = state
    .orchestrator
    .registry()
    .list()
    .await
    .iter()
    .filter(|s| s.ref_count > 0)
    .count() as i64;

  Ok(axum::Json(StatusResponse {
    store_ready: true,
    runtime_ready,
    repository_count,
    worktree_count,
    active_service_count,
  }))
}

async fn config(State(state): State<AppState>) -> axum::Json<ConfigResponse> {
  axum::Json(ConfigResponse {
    config_dir: config::VibemanDirs::config_dir().to_string_lossy().into_owned(),
    data_dir: config::VibemanDirs::data_dir().to_string_lossy().into_owned(),
    state_dir: config::VibemanDirs::state_dir().to_string_lossy().into_owned(),
    bind_address: state.config.bind_address.clone(),
    runtime: "docker".to_string(),
  })
}
