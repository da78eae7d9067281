//! Shared application state threaded through every axum handler, built
//! once at startup in `main` and cloned cheaply (every field is an
//! `Arc`) per request.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<Orchestrator>,
  pub config: Arc<ServerConfig>,
  pub token: Arc<str>,
}
