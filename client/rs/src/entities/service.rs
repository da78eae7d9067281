use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;

/// Global service descriptor (§3), keyed by name across the whole system.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
  pub name: String,
  pub compose_file: String,
  pub service_name_in_compose: String,
  #[serde(default)]
  pub description: String,
}

/// State machine for a shared service (§4.5): `Stopped -> Starting ->
/// Running -> Stopping -> Stopped`, with `Starting -> Error` on probe
/// failure and `Error` recovered on the next `acquire`.
#[typeshare]
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceStatus {
  Stopped,
  Starting,
  Running,
  Stopping,
  Error,
}

/// Runtime state the Service Registry layers on top of a descriptor.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
  pub name: String,
  pub status: ServiceStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container_id: Option<String>,
  pub ref_count: usize,
  pub holders: HashSet<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_time: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_health: Option<bool>,
  /// True while a debounced shutdown is pending for this service.
  #[serde(default)]
  pub shutdown_pending: bool,
}

impl ServiceState {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      status: ServiceStatus::Stopped,
      container_id: None,
      ref_count: 0,
      holders: HashSet::new(),
      start_time: None,
      last_health: None,
      shutdown_pending: false,
    }
  }
}
