use vibeman_client::api::system::{ConfigResponse, HealthResponse, StatusResponse};

use crate::args::SystemCommand;
use crate::command::{print_one, vibeman_client};

pub async fn handle(command: &SystemCommand) -> anyhow::Result<()> {
  let client = vibeman_client().await?;
  match command {
    SystemCommand::Health => {
      let health: HealthResponse = client.get("/health").await?;
      print_one(&health)
    }
    SystemCommand::Status => {
      let status: StatusResponse = client.get("/api/status").await?;
      print_one(&status)
    }
    SystemCommand::Config => {
      let config: ConfigResponse = client.get("/config").await?;
      print_one(&config)
    }
  }
}
