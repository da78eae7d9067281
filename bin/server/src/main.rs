#[macro_use]
extern crate tracing;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vibeman_client::entities::manifest::ServiceCatalog;

use crate::config::ServerConfig;
use crate::docker::{ContainerRuntime, DockerRuntime};
use crate::logs::LogAggregator;
use crate::orchestrator::Orchestrator;
use crate::registry::ServiceRegistry;
use crate::state::AppState;

mod api;
mod auth;
mod compose;
mod config;
mod docker;
mod logs;
mod orchestrator;
mod registry;
mod state;
mod ws;

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let config = ServerConfig::load().context("failed to load config.toml")?;
  logger::init(&config.logging)?;

  info!("vibeman server version: v{}", env!("CARGO_PKG_VERSION"));

  let token = auth::ensure_token(&ServerConfig::token_path()).context("failed to provision bearer token")?;

  let store = std::sync::Arc::new(store::Store::open(ServerConfig::state_db_path()).context("failed to open state store")?);

  let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect().context("failed to connect to docker daemon")?);

  let catalog_path = ServerConfig::service_catalog_path();
  let catalog: ServiceCatalog = if catalog_path.is_file() {
    config::load_config_file(&catalog_path).context("failed to parse services.toml")?
  } else {
    ServiceCatalog::default()
  };
  let registry = Arc::new(ServiceRegistry::new(runtime.clone(), catalog, config.service_debounce_secs));

  let logs = Arc::new(LogAggregator::new(config.log_ring_capacity));

  let orchestrator = Arc::new(Orchestrator::new(store, runtime, registry, logs, ServerConfig::repos_dir()));

  if let Err(e) = orchestrator.reconcile_at_boot().await {
    warn!("boot reconciliation failed: {e}");
  }

  let app_state = AppState {
    orchestrator,
    config: Arc::new(config.clone()),
    token: Arc::<str>::from(token.as_str()),
  };

  let cors = if config.allowed_origins.is_empty() {
    CorsLayer::new()
  } else {
    let origins = config
      .allowed_origins
      .iter()
      .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
      .collect::<Vec<_>>();
    CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
  };

  let authenticated_api = api::router().route_layer(middleware::from_fn_with_state(app_state.token.clone(), auth::require_bearer_token));

  let router: Router<()> = Router::new()
    .merge(authenticated_api)
    .merge(ws::router())
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(app_state);

  let socket_addr = SocketAddr::from_str(&config.bind_address).context("failed to parse bind_address")?;
  info!("vibeman server listening on http://{socket_addr}");

  let listener = tokio::net::TcpListener::bind(socket_addr).await.context("failed to bind listen address")?;
  axum::serve(listener, router.into_make_service()).await.context("server error")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let mut term_signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
  tokio::select! {
    res = tokio::spawn(app()) => res?,
    _ = term_signal.recv() => Ok(()),
  }
}
