use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceAction {
  Start,
  Stop,
  Restart,
  Health,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceActionRequest {
  pub name: String,
  pub action: ServiceAction,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetServiceRequest {
  pub name: String,
}
