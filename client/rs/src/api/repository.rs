use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRepositoryRequest {
  pub name: String,
  pub path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub git_url: Option<String>,
  #[serde(default)]
  pub description: String,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRepositoriesRequest {}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveRepositoryRequest {
  pub id: Uuid,
}
